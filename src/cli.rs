//! Command-line definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "dotlink",
    about = "Keep live configuration linked to a version-controlled backup root",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Directory holding dotlink.toml (defaults to $DOTLINK_ROOT, then the
    /// current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link every target to its backup, adopting or merging live content
    Restore(RestoreOpts),
    /// Copy every live target into the backup root
    Backup,
    /// Show applications, entries, resolved paths and their state
    List,
    /// Report templates that changed or carry local edits
    Templates(TemplatesOpts),
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
    /// Print version information
    Version,
}

/// Options for the `restore` subcommand.
#[derive(Parser, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RestoreOpts {
    /// Refuse to merge a non-empty target into an existing backup
    #[arg(long)]
    pub no_merge: bool,

    /// Merge even with --no-merge
    #[arg(short, long)]
    pub force: bool,

    /// Discard conflicting targets instead of merging them (destructive)
    #[arg(long)]
    pub force_delete: bool,

    /// Re-render templates even when their source is unchanged
    #[arg(long)]
    pub force_render: bool,
}

/// Which template query to run.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateQuery {
    /// Both queries
    #[default]
    All,
    /// Templates whose source changed since the last render
    Outdated,
    /// Rendered files edited since the last render
    Modified,
}

/// Options for the `templates` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct TemplatesOpts {
    /// Query to run
    #[arg(value_enum, default_value_t = TemplateQuery::All)]
    pub query: TemplateQuery,

    /// Subtree of the backup root to scan (defaults to the whole root)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_restore_flags() {
        let cli = Cli::parse_from(["dotlink", "restore", "--no-merge", "--force-render"]);
        let Command::Restore(opts) = cli.command else {
            panic!("expected restore");
        };
        assert!(opts.no_merge);
        assert!(opts.force_render);
        assert!(!opts.force);
        assert!(!opts.force_delete);
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["dotlink", "-d", "backup"]);
        assert!(cli.global.dry_run);
        assert!(matches!(cli.command, Command::Backup));
    }

    #[test]
    fn parse_root_after_subcommand() {
        let cli = Cli::parse_from(["dotlink", "list", "--root", "/srv/dotfiles"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/srv/dotfiles")));
    }

    #[test]
    fn parse_templates_query() {
        let cli = Cli::parse_from(["dotlink", "templates", "modified", "--path", "nvim"]);
        let Command::Templates(opts) = cli.command else {
            panic!("expected templates");
        };
        assert_eq!(opts.query, TemplateQuery::Modified);
        assert_eq!(opts.path, Some(PathBuf::from("nvim")));

        let cli = Cli::parse_from(["dotlink", "templates"]);
        let Command::Templates(opts) = cli.command else {
            panic!("expected templates");
        };
        assert_eq!(opts.query, TemplateQuery::All);
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["dotlink", "completions", "zsh"]);
        assert!(matches!(
            cli.command,
            Command::Completions {
                shell: clap_complete::Shell::Zsh
            }
        ));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["dotlink", "-v", "version"]);
        assert!(cli.verbose);
    }
}
