//! Backup direction: copy live targets into the backup root.
//!
//! The live copy is authoritative at invocation time, so it overwrites what
//! the backup holds. A target that is already a symlink points into the
//! backup and has nothing to copy.
use std::path::Path;

use anyhow::{Result, bail};

use super::{Context, EntryPaths, Task, TaskResult, entry_label, unsupported_kind};
use crate::config::{Application, Entry};
use crate::operations::FileSystemOps;
use crate::resources::fs;

/// Backup task for one entry.
#[derive(Debug)]
pub struct BackupEntry<'a> {
    label: String,
    entry: &'a Entry,
}

impl<'a> BackupEntry<'a> {
    /// Create the task for `entry` of `app`.
    #[must_use]
    pub fn new(app: &Application, entry: &'a Entry) -> Self {
        Self {
            label: entry_label(app, entry),
            entry,
        }
    }
}

/// Copy `target` over `backup` if it is real content. Returns whether a copy
/// was made.
fn copy_out(ctx: &Context, target: &Path, backup: &Path, ops: &dyn FileSystemOps) -> Result<bool> {
    if !fs::exists(target) {
        ctx.log.debug(&format!("{} does not exist", target.display()));
        return Ok(false);
    }
    if fs::is_symlink(target) {
        ctx.log
            .debug(&format!("{} is a link; nothing to copy", target.display()));
        return Ok(false);
    }
    ctx.log.debug(&format!(
        "copying {} -> {}",
        target.display(),
        backup.display()
    ));
    ops.copy_path(target, backup)?;
    Ok(true)
}

impl Task for BackupEntry<'_> {
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

        let copied = if self.entry.is_folder_mode() {
            usize::from(copy_out(ctx, &paths.target, &paths.backup, ops.as_ref())?)
        } else {
            let mut copied = 0;
            let mut errors = Vec::new();
            for (backup, target) in paths.file_pairs(self.entry) {
                match copy_out(ctx, &target, &backup, ops.as_ref()) {
                    Ok(c) => copied += usize::from(c),
                    Err(e) => errors.push(format!("{e:#}")),
                }
            }
            if !errors.is_empty() {
                bail!("{} file(s) failed: {}", errors.len(), errors.join("; "));
            }
            copied
        };

        if copied == 0 {
            return Ok(TaskResult::NotApplicable(
                "no live content to copy".to_string(),
            ));
        }
        if ops.is_dry_run() {
            return Ok(TaskResult::DryRun);
        }
        ctx.log.info(&format!("{}: copied {copied} path(s)", self.label));
        Ok(TaskResult::Ok)
    }
}
