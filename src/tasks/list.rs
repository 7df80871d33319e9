//! Read-only listing of applications and entries with their resolved paths
//! and current state on this machine.
use std::fmt::{self, Write as _};
use std::path::Path;

use crate::config::{Application, Config, Entry, EntryKind};
use crate::platform::Platform;
use crate::resources::fs;

use super::EntryPaths;

/// Current state of an entry (or of one of its files).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// The target links to the backup.
    Linked,
    /// The target is a symlink to somewhere else.
    LinkedElsewhere,
    /// Both exist as real content; a restore would merge.
    Unlinked,
    /// Only the backup exists; a restore would link.
    BackupOnly,
    /// Only the target exists; a restore would adopt it.
    TargetOnly,
    /// Neither exists.
    Missing,
    /// No target for this OS.
    NoTarget,
    /// A path could not be resolved.
    Unresolved,
    /// Managed outside this tool.
    External,
    /// The application does not apply to this machine.
    Filtered,
    /// File mode with files in different states.
    Partial,
}

impl EntryState {
    /// Short label used in the listing.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::LinkedElsewhere => "linked elsewhere",
            Self::Unlinked => "unlinked",
            Self::BackupOnly => "backup only",
            Self::TargetOnly => "target only",
            Self::Missing => "missing",
            Self::NoTarget => "no target",
            Self::Unresolved => "unresolved",
            Self::External => "external",
            Self::Filtered => "filtered",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry as seen on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Entry name.
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Whether the whole backup directory is linked.
    pub folder_mode: bool,
    /// Resolved paths, when the entry has a target here and they resolve.
    pub paths: Option<EntryPaths>,
    /// Individually managed files (file mode).
    pub files: Vec<String>,
    /// Current state.
    pub state: EntryState,
}

/// One application with its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedApplication {
    /// Application name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Package name, if one is declared.
    pub package: Option<String>,
    /// Whether the application applies to this machine.
    pub in_scope: bool,
    /// Entries in file order.
    pub entries: Vec<ListedEntry>,
}

/// State of one `(backup, target)` pair.
fn pair_state(backup: &Path, target: &Path) -> EntryState {
    if fs::is_symlink(target) {
        return match std::fs::read_link(target) {
            Ok(link) if fs::paths_equal(&link, backup) => EntryState::Linked,
            _ => EntryState::LinkedElsewhere,
        };
    }
    match (fs::exists(backup), fs::exists(target)) {
        (true, true) => EntryState::Unlinked,
        (true, false) => EntryState::BackupOnly,
        (false, true) => EntryState::TargetOnly,
        (false, false) => EntryState::Missing,
    }
}

fn entry_state(entry: &Entry, paths: &EntryPaths) -> EntryState {
    if entry.is_folder_mode() {
        return pair_state(&paths.backup, &paths.target);
    }
    let mut states = paths
        .file_pairs(entry)
        .into_iter()
        .map(|(b, t)| pair_state(&b, &t));
    let Some(first) = states.next() else {
        return EntryState::Missing;
    };
    if states.all(|s| s == first) {
        first
    } else {
        EntryState::Partial
    }
}

fn list_entry(root: &Path, app_in_scope: bool, entry: &Entry, platform: &Platform) -> ListedEntry {
    let resolved = EntryPaths::resolve(root, entry, platform);
    let paths = match (&resolved, entry.kind) {
        (Ok(Some(p)), EntryKind::Config) => Some(p.clone()),
        _ => None,
    };
    let state = if entry.kind == EntryKind::Git {
        EntryState::External
    } else if !app_in_scope {
        EntryState::Filtered
    } else {
        match &resolved {
            Err(_) => EntryState::Unresolved,
            Ok(None) => EntryState::NoTarget,
            Ok(Some(p)) => entry_state(entry, p),
        }
    };
    ListedEntry {
        name: entry.name.clone(),
        kind: entry.kind,
        folder_mode: entry.is_folder_mode(),
        paths,
        files: entry.files.clone(),
        state,
    }
}

fn list_application(root: &Path, app: &Application, platform: &Platform) -> ListedApplication {
    let in_scope = app.in_scope(platform);
    ListedApplication {
        name: app.name.clone(),
        description: app.description.clone(),
        package: app.package.as_ref().map(|p| p.name.clone()),
        in_scope,
        entries: app
            .entries
            .iter()
            .map(|e| list_entry(root, in_scope, e, platform))
            .collect(),
    }
}

/// Enumerate every application and entry. Touches nothing on disk.
#[must_use]
pub fn list(config: &Config, platform: &Platform) -> Vec<ListedApplication> {
    config
        .applications
        .iter()
        .map(|app| list_application(&config.root, app, platform))
        .collect()
}

/// Show `path` relative to `root` when inside it, or with `~` for `home`.
fn display_path(path: &Path, root: &Path, home: Option<&Path>) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        return rel.display().to_string().replace('\\', "/");
    }
    if let Some(home) = home
        && let Ok(rel) = path.strip_prefix(home)
    {
        let rel = rel.display().to_string().replace('\\', "/");
        return if rel.is_empty() {
            "~".to_string()
        } else {
            format!("~/{rel}")
        };
    }
    path.display().to_string()
}

/// Plain-text rendering of a listing.
#[must_use]
pub fn render_listing(apps: &[ListedApplication], root: &Path, home: Option<&Path>) -> String {
    let mut out = String::new();
    for app in apps {
        let mut header = app.name.clone();
        if let Some(desc) = &app.description {
            write!(header, " - {desc}").unwrap_or(());
        }
        if let Some(pkg) = &app.package {
            write!(header, " (package: {pkg})").unwrap_or(());
        }
        if !app.in_scope {
            header.push_str(" [filtered]");
        }
        writeln!(out, "{header}").unwrap_or(());

        for entry in &app.entries {
            let location = entry.paths.as_ref().map_or_else(
                || "-".to_string(),
                |p| {
                    format!(
                        "{} -> {}",
                        display_path(&p.backup, root, home),
                        display_path(&p.target, root, home)
                    )
                },
            );
            writeln!(out, "  {:<12} {location} [{}]", entry.name, entry.state).unwrap_or(());
            for file in &entry.files {
                writeln!(out, "    {file}").unwrap_or(());
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::platform::Os;
    use std::fs as stdfs;

    const CONFIG: &str = r#"
version = 1

[[applications]]
name = "neovim"
description = "Editor"
package = { name = "neovim" }

[[applications.entries]]
name = "config"
backup = "nvim"
targets = { linux = "~/.config/nvim" }

[[applications]]
name = "git"

[[applications.entries]]
name = "dotfiles"
backup = "git"
files = [".gitconfig", ".gitignore"]
targets = { linux = "~" }

[[applications.entries]]
name = "hooks"
kind = "git"
url = "https://example.invalid/hooks.git"
targets = { linux = "~/.githooks" }

[[applications]]
name = "terminal"
include = [{ os = ["windows"] }]

[[applications.entries]]
name = "settings"
backup = "terminal"
targets = { windows = "%LOCALAPPDATA%/terminal" }

[[applications]]
name = "tmux"

[[applications.entries]]
name = "conf"
backup = "tmux"
targets = { macos = "~/.tmux" }
"#;

    #[cfg(unix)]
    #[test]
    fn listing_reports_state_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("backup");
        let home = dir.path().join("home");
        stdfs::create_dir_all(root.join("nvim")).unwrap();
        stdfs::create_dir_all(root.join("git")).unwrap();
        stdfs::create_dir_all(home.join(".config")).unwrap();
        stdfs::write(root.join("git/.gitconfig"), "").unwrap();
        std::os::unix::fs::symlink(root.join("nvim"), home.join(".config/nvim")).unwrap();
        std::os::unix::fs::symlink(root.join("git/.gitconfig"), home.join(".gitconfig")).unwrap();

        let platform = Platform::new(Os::Linux, "arch", "desk", "alice")
            .with_env([("HOME", home.display().to_string())]);
        let config = Config::parse(CONFIG, &root, &platform).unwrap();

        let apps = list(&config, &platform);
        let states: Vec<EntryState> = apps
            .iter()
            .flat_map(|a| a.entries.iter().map(|e| e.state))
            .collect();
        assert_eq!(
            states,
            [
                EntryState::Linked,
                EntryState::Partial,
                EntryState::External,
                EntryState::Filtered,
                EntryState::NoTarget,
            ]
        );

        insta::assert_snapshot!(render_listing(&apps, &root, platform.home().as_deref()));
        assert!(!home.join(".gitignore").exists());
    }

    #[test]
    fn display_path_prefers_root_then_home() {
        let root = Path::new("/home/a/dotfiles");
        let home = Path::new("/home/a");
        assert_eq!(display_path(&root.join("nvim"), root, Some(home)), "nvim");
        assert_eq!(
            display_path(&home.join(".config/nvim"), root, Some(home)),
            "~/.config/nvim"
        );
        assert_eq!(display_path(home, root, Some(home)), "~");
        assert_eq!(display_path(Path::new("/etc/x"), root, Some(home)), "/etc/x");
    }
}
