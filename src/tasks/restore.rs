//! Restore direction: make each target a symlink into the backup root.
//!
//! The action for a `(backup, target)` pair is chosen once by
//! [`decide_restore`] and then carried out through the entry's
//! [`FileSystemOps`] back-end. Folder-mode entries decide once for the whole
//! subtree; file-mode entries decide per named file.
use std::path::Path;

use anyhow::{Result, bail};

use super::{Context, EntryPaths, RunOptions, Task, TaskResult, entry_label, unsupported_kind};
use crate::config::{Application, Entry};
use crate::error::MergeBlocked;
use crate::merge::{self, MergeSummary};
use crate::operations::FileSystemOps;
use crate::resources::fs;
use crate::templates::TemplateEngine;

/// What restoring one `(backup, target)` pair requires. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreAction {
    /// The target is already a symlink; nothing to do.
    AlreadyLinked,
    /// Only the target exists: move it into the backup, then link.
    Adopt,
    /// Strict mode refuses to merge a non-empty target.
    Blocked {
        /// Files found under the target.
        files: usize,
    },
    /// Both exist: fold the target into the backup, then link.
    Merge,
    /// Both exist and `--force-delete` was given: discard the target, then link.
    Replace,
    /// Only the backup exists: link.
    Link,
    /// Neither exists.
    Inapplicable,
}

impl RestoreAction {
    /// Whether the action brings new content into the backup.
    #[must_use]
    pub const fn imports_content(self) -> bool {
        matches!(self, Self::Adopt | Self::Merge)
    }
}

/// Choose the restore action for one `(backup, target)` pair.
#[must_use]
pub fn decide_restore(backup: &Path, target: &Path, options: &RunOptions) -> RestoreAction {
    let has_backup = fs::exists(backup);
    let has_target = fs::exists(target);

    if fs::is_symlink(target) {
        return RestoreAction::AlreadyLinked;
    }
    match (has_backup, has_target) {
        (false, true) => RestoreAction::Adopt,
        (true, true) => {
            let forced = options.force || options.force_delete;
            let files = fs::count_files(target);
            if options.no_merge && !forced && files > 0 {
                RestoreAction::Blocked { files }
            } else if options.force_delete {
                RestoreAction::Replace
            } else {
                RestoreAction::Merge
            }
        }
        (true, false) => RestoreAction::Link,
        (false, false) => RestoreAction::Inapplicable,
    }
}

/// Restore task for one entry.
#[derive(Debug)]
pub struct RestoreEntry<'a> {
    label: String,
    entry: &'a Entry,
}

impl<'a> RestoreEntry<'a> {
    /// Create the task for `entry` of `app`.
    #[must_use]
    pub fn new(app: &Application, entry: &'a Entry) -> Self {
        Self {
            label: entry_label(app, entry),
            entry,
        }
    }

    /// Render the templates under `dir` if it is a real directory.
    fn render_templates(&self, ctx: &Context, dir: &Path, ops: &dyn FileSystemOps) -> Result<()> {
        if !fs::is_real_dir(dir) {
            return Ok(());
        }
        let summary = TemplateEngine::new(ctx.root(), &ctx.platform, &ctx.history, ops, ctx.log.as_ref())
            .force_render(ctx.options.force_render)
            .process_dir(dir)?;
        if summary.total() > 0 {
            ctx.log.debug(&format!(
                "{}: {} template(s): {} rendered, {} merged, {} conflicted, {} unchanged",
                self.label,
                summary.total(),
                summary.rendered.len(),
                summary.merged.len(),
                summary.conflicts.len(),
                summary.unchanged.len(),
            ));
        }
        if !summary.failed.is_empty() {
            bail!(
                "{} template(s) failed under {}",
                summary.failed.len(),
                dir.display()
            );
        }
        Ok(())
    }

    /// Carry out `action`. Returns whether anything was (or would be) changed.
    fn apply(
        &self,
        ctx: &Context,
        action: RestoreAction,
        backup: &Path,
        target: &Path,
        ops: &dyn FileSystemOps,
    ) -> Result<bool> {
        match action {
            RestoreAction::AlreadyLinked => {
                if let Ok(current) = std::fs::read_link(target)
                    && !fs::paths_equal(&current, backup)
                {
                    ctx.log.warn(&format!(
                        "{}: {} links to {}, not {}; leaving it alone",
                        self.label,
                        target.display(),
                        current.display(),
                        backup.display()
                    ));
                } else {
                    ctx.log
                        .debug(&format!("ok: {} (already linked)", target.display()));
                }
                Ok(false)
            }
            RestoreAction::Adopt => {
                ctx.log.info(&format!(
                    "adopting {} into {}",
                    target.display(),
                    backup.display()
                ));
                ops.move_path(target, backup)?;
                ops.symlink(backup, target)?;
                Ok(true)
            }
            RestoreAction::Blocked { files } => Err(MergeBlocked {
                entry: self.label.clone(),
                path: target.to_path_buf(),
                files,
            }
            .into()),
            RestoreAction::Merge => {
                let summary = if fs::is_real_dir(target) {
                    merge::merge_tree(target, backup, ops, merge::today())?
                } else {
                    merge::merge_file(target, backup, ops, merge::today())
                };
                self.report_merge(ctx, target, &summary)?;
                ops.remove_all(target)?;
                ops.symlink(backup, target)?;
                Ok(true)
            }
            RestoreAction::Replace => {
                ctx.log.warn(&format!(
                    "discarding {} (--force-delete)",
                    target.display()
                ));
                ops.remove_all(target)?;
                ops.symlink(backup, target)?;
                Ok(true)
            }
            RestoreAction::Link => {
                ctx.log.debug(&format!(
                    "linking {} -> {}",
                    target.display(),
                    backup.display()
                ));
                ops.symlink(backup, target)?;
                Ok(true)
            }
            RestoreAction::Inapplicable => {
                ctx.log.debug(&format!(
                    "neither {} nor {} exists",
                    backup.display(),
                    target.display()
                ));
                Ok(false)
            }
        }
    }

    /// Log what a merge did and refuse to continue if anything was left
    /// behind in the target.
    fn report_merge(&self, ctx: &Context, target: &Path, summary: &MergeSummary) -> Result<()> {
        ctx.log.info(&format!(
            "merged {} file(s) from {}, {} conflict(s)",
            summary.merged.len(),
            target.display(),
            summary.conflicts.len()
        ));
        for (original, renamed) in &summary.conflicts {
            ctx.log.warn(&format!(
                "{}: {} differs from the live copy; live copy kept as {}",
                self.label,
                original.display(),
                renamed.display()
            ));
        }
        if !summary.is_complete() {
            for (path, reason) in &summary.failed {
                ctx.log.error(&format!("{}: {reason}", path.display()));
            }
            bail!(
                "{} file(s) could not be merged out of {}; target left in place",
                summary.failed.len(),
                target.display()
            );
        }
        Ok(())
    }

    fn run_folder(&self, ctx: &Context, paths: &EntryPaths, ops: &dyn FileSystemOps) -> Result<TaskResult> {
        self.render_templates(ctx, &paths.backup, ops)?;
        let action = decide_restore(&paths.backup, &paths.target, &ctx.options);
        let changed = self.apply(ctx, action, &paths.backup, &paths.target, ops)?;
        if action.imports_content() {
            self.render_templates(ctx, &paths.backup, ops)?;
        }
        Ok(finish(action == RestoreAction::Inapplicable, changed, ops))
    }

    fn run_files(&self, ctx: &Context, paths: &EntryPaths, ops: &dyn FileSystemOps) -> Result<TaskResult> {
        self.render_templates(ctx, &paths.backup, ops)?;

        let mut errors = Vec::new();
        let mut changed = false;
        let mut all_inapplicable = true;
        for (backup, target) in paths.file_pairs(self.entry) {
            if let (Ok(b), Ok(t)) = (dunce::canonicalize(&backup), dunce::canonicalize(&target))
                && b == t
                && !fs::is_symlink(&target)
            {
                ctx.log.debug(&format!(
                    "{} is the backup file itself; skipping",
                    target.display()
                ));
                all_inapplicable = false;
                continue;
            }
            let action = decide_restore(&backup, &target, &ctx.options);
            all_inapplicable &= action == RestoreAction::Inapplicable;
            match self.apply(ctx, action, &backup, &target, ops) {
                Ok(c) => changed |= c,
                Err(e) => errors.push(format!("{}: {e:#}", target.display())),
            }
        }

        if !errors.is_empty() {
            bail!(
                "{} of {} file(s) failed: {}",
                errors.len(),
                self.entry.files.len(),
                errors.join("; ")
            );
        }
        Ok(finish(all_inapplicable, changed, ops))
    }
}

fn finish(inapplicable: bool, changed: bool, ops: &dyn FileSystemOps) -> TaskResult {
    if inapplicable {
        TaskResult::NotApplicable("neither backup nor target exists".to_string())
    } else if changed && ops.is_dry_run() {
        TaskResult::DryRun
    } else {
        TaskResult::Ok
    }
}

impl Task for RestoreEntry<'_> {
    fn name(&self) -> &str {
        &self.label
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        unsupported_kind(self.entry).is_none()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let Some(paths) = EntryPaths::resolve(ctx.root(), self.entry, &ctx.platform)? else {
            return Ok(TaskResult::NotApplicable(format!(
                "no target for {}",
                ctx.platform.os
            )));
        };
        let ops = ctx.backend_for(self.entry);
        if self.entry.is_folder_mode() {
            self.run_folder(ctx, &paths, ops.as_ref())
        } else {
            self.run_files(ctx, &paths, ops.as_ref())
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::EntryStatus;
    use crate::tasks::test_helpers::make_context;
    use crate::tasks::{execute, run_pass, Direction};
    use std::fs as stdfs;
    use std::path::PathBuf;

    const NVIM: &str = r#"
version = 1
[[applications]]
name = "neovim"
[[applications.entries]]
name = "config"
backup = "nvim"
targets = { linux = "~/.config/nvim" }
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("backup");
        let home = dir.path().join("home");
        stdfs::create_dir_all(&root).unwrap();
        stdfs::create_dir_all(&home).unwrap();
        Fixture {
            _dir: dir,
            root,
            home,
        }
    }

    #[test]
    fn decision_table() {
        let f = fixture();
        let backup = f.root.join("b");
        let target = f.home.join("t");
        let opts = RunOptions::default();

        assert_eq!(decide_restore(&backup, &target, &opts), RestoreAction::Inapplicable);

        stdfs::create_dir_all(&backup).unwrap();
        assert_eq!(decide_restore(&backup, &target, &opts), RestoreAction::Link);

        stdfs::create_dir_all(&target).unwrap();
        stdfs::write(target.join("f"), "x").unwrap();
        assert_eq!(decide_restore(&backup, &target, &opts), RestoreAction::Merge);

        let strict = RunOptions {
            no_merge: true,
            ..RunOptions::default()
        };
        assert_eq!(
            decide_restore(&backup, &target, &strict),
            RestoreAction::Blocked { files: 1 }
        );
        let forced = RunOptions {
            force: true,
            ..strict
        };
        assert_eq!(decide_restore(&backup, &target, &forced), RestoreAction::Merge);
        let delete = RunOptions {
            force_delete: true,
            ..strict
        };
        assert_eq!(decide_restore(&backup, &target, &delete), RestoreAction::Replace);

        stdfs::remove_dir_all(&backup).unwrap();
        assert_eq!(decide_restore(&backup, &target, &opts), RestoreAction::Adopt);
    }

    #[test]
    fn strict_mode_allows_an_empty_target() {
        let f = fixture();
        let backup = f.root.join("b");
        let target = f.home.join("t");
        stdfs::create_dir_all(&backup).unwrap();
        stdfs::create_dir_all(&target).unwrap();
        let strict = RunOptions {
            no_merge: true,
            ..RunOptions::default()
        };
        assert_eq!(decide_restore(&backup, &target, &strict), RestoreAction::Merge);
    }

    #[cfg(unix)]
    #[test]
    fn existing_symlink_is_left_alone() {
        let f = fixture();
        let backup = f.root.join("b");
        let target = f.home.join("t");
        stdfs::create_dir_all(&backup).unwrap();
        std::os::unix::fs::symlink("/somewhere/else", &target).unwrap();
        assert_eq!(
            decide_restore(&backup, &target, &RunOptions::default()),
            RestoreAction::AlreadyLinked
        );
    }

    #[cfg(unix)]
    #[test]
    fn adopts_a_live_directory() {
        let f = fixture();
        let live = f.home.join(".config/nvim");
        stdfs::create_dir_all(&live).unwrap();
        stdfs::write(live.join("init.lua"), "vim.o.number = true\n").unwrap();
        let (ctx, log) = make_context(&f.root, &f.home, NVIM, RunOptions::default());

        run_pass(&ctx, Direction::Restore).unwrap();

        assert_eq!(
            stdfs::read_to_string(f.root.join("nvim/init.lua")).unwrap(),
            "vim.o.number = true\n"
        );
        assert_eq!(stdfs::read_link(&live).unwrap(), f.root.join("nvim"));
        assert_eq!(log.entries()[0].status, EntryStatus::Ok);
    }

    #[cfg(unix)]
    #[test]
    fn merge_keeps_both_sides() {
        let f = fixture();
        let live = f.home.join(".config/nvim");
        stdfs::create_dir_all(&live).unwrap();
        stdfs::create_dir_all(f.root.join("nvim")).unwrap();
        stdfs::write(live.join("config.json"), "{\"live\":1}").unwrap();
        stdfs::write(live.join("only-live.lua"), "live").unwrap();
        stdfs::write(f.root.join("nvim/config.json"), "{\"backup\":1}").unwrap();
        let (ctx, log) = make_context(&f.root, &f.home, NVIM, RunOptions::default());

        run_pass(&ctx, Direction::Restore).unwrap();

        let backup = f.root.join("nvim");
        assert_eq!(
            stdfs::read_to_string(backup.join("config.json")).unwrap(),
            "{\"backup\":1}"
        );
        let renamed = merge::conflict_name(&backup.join("config.json"), merge::today());
        assert_eq!(stdfs::read_to_string(renamed).unwrap(), "{\"live\":1}");
        assert_eq!(stdfs::read_to_string(backup.join("only-live.lua")).unwrap(), "live");
        assert!(fs::is_symlink(&live));
        assert_eq!(log.warns().len(), 1);
        assert!(
            log.infos().iter().any(|m| m.contains("1 conflict(s)")),
            "{:?}",
            log.infos()
        );
    }

    #[test]
    fn strict_mode_blocks_and_leaves_target_untouched() {
        let f = fixture();
        let live = f.home.join(".config/nvim");
        stdfs::create_dir_all(&live).unwrap();
        stdfs::create_dir_all(f.root.join("nvim")).unwrap();
        stdfs::write(live.join("a"), "a").unwrap();
        stdfs::write(live.join("b"), "b").unwrap();
        let options = RunOptions {
            no_merge: true,
            ..RunOptions::default()
        };
        let (ctx, log) = make_context(&f.root, &f.home, NVIM, options);

        let app = &ctx.config.applications[0];
        let status = execute(&RestoreEntry::new(app, &app.entries[0]), &ctx);

        assert_eq!(status, EntryStatus::Failed);
        let message = log.entries()[0].message.clone().unwrap();
        assert!(message.contains("2 file(s)"), "{message}");
        assert!(!fs::is_symlink(&live));
        assert!(live.join("a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn second_pass_changes_nothing() {
        let f = fixture();
        stdfs::create_dir_all(f.root.join("nvim")).unwrap();
        stdfs::write(f.root.join("nvim/init.lua"), "x").unwrap();
        let (ctx, _log) = make_context(&f.root, &f.home, NVIM, RunOptions::default());
        run_pass(&ctx, Direction::Restore).unwrap();
        let link = f.home.join(".config/nvim");
        let before = stdfs::symlink_metadata(&link).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        let report = run_pass(&ctx, Direction::Restore).unwrap();

        let after = stdfs::symlink_metadata(&link).unwrap().modified().unwrap();
        assert_eq!(before, after);
        assert_eq!(report.ok, 1);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let f = fixture();
        let live = f.home.join(".config/nvim");
        stdfs::create_dir_all(&live).unwrap();
        stdfs::write(live.join("init.lua"), "x").unwrap();
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let (ctx, log) = make_context(&f.root, &f.home, NVIM, options);

        run_pass(&ctx, Direction::Restore).unwrap();

        assert!(!f.root.join("nvim").exists());
        assert!(!fs::is_symlink(&live));
        assert_eq!(log.dry_runs().len(), 2);
        assert_eq!(log.entries()[0].status, EntryStatus::DryRun);
    }

    #[cfg(unix)]
    #[test]
    fn file_mode_links_each_file() {
        let f = fixture();
        stdfs::create_dir_all(f.root.join("git")).unwrap();
        stdfs::write(f.root.join("git/.gitconfig"), "[user]\n").unwrap();
        stdfs::write(f.home.join(".gitignore_global"), "*.swp\n").unwrap();
        let (ctx, _log) = make_context(
            &f.root,
            &f.home,
            r#"
version = 1
[[applications]]
name = "git"
[[applications.entries]]
name = "dotfiles"
backup = "git"
files = [".gitconfig", ".gitignore_global", ".missing"]
targets = { linux = "~" }
"#,
            RunOptions::default(),
        );

        run_pass(&ctx, Direction::Restore).unwrap();

        assert_eq!(
            stdfs::read_link(f.home.join(".gitconfig")).unwrap(),
            f.root.join("git/.gitconfig")
        );
        assert_eq!(
            stdfs::read_to_string(f.root.join("git/.gitignore_global")).unwrap(),
            "*.swp\n"
        );
        assert!(fs::is_symlink(&f.home.join(".gitignore_global")));
        assert!(!fs::exists(&f.home.join(".missing")));
        assert!(!fs::is_symlink(&f.home));
    }

    #[test]
    fn entry_without_target_for_this_os_is_not_applicable() {
        let f = fixture();
        let (ctx, log) = make_context(
            &f.root,
            &f.home,
            r#"
version = 1
[[applications]]
name = "terminal"
[[applications.entries]]
name = "settings"
backup = "terminal"
targets = { windows = "%LOCALAPPDATA%/terminal" }
"#,
            RunOptions::default(),
        );
        let report = run_pass(&ctx, Direction::Restore).unwrap();
        assert_eq!(report.not_applicable, 1);
        assert_eq!(log.entries()[0].message.as_deref(), Some("no target for linux"));
    }

    #[cfg(unix)]
    #[test]
    fn templates_are_rendered_before_linking() {
        let f = fixture();
        stdfs::create_dir_all(f.root.join("nvim")).unwrap();
        stdfs::write(f.root.join("nvim/host.lua.tmpl"), "-- {{ hostname }}\n").unwrap();
        let (ctx, _log) = make_context(&f.root, &f.home, NVIM, RunOptions::default());

        run_pass(&ctx, Direction::Restore).unwrap();

        let live = f.home.join(".config/nvim/host.lua");
        assert_eq!(stdfs::read_to_string(live).unwrap(), "-- desk\n");
        assert!(ctx.history.latest("nvim/host.lua.tmpl").is_some());
    }
}
