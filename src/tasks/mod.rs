//! Reconciliation engine: one task per configured entry, run sequentially.
//!
//! A pass walks the applications in file order. Applications that do not
//! apply to this machine have their entries recorded as not applicable.
//! Every other entry becomes a [`Task`] for the pass direction and is run
//! through [`execute`], which records its outcome. One entry failing never
//! stops the pass; cancellation is honoured between applications and
//! between entries.
pub mod backup;
mod context;
pub mod list;
pub mod restore;

pub use context::{Context, RunOptions};

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};

use crate::config::{Application, Entry, EntryKind};
use crate::error::Cancelled;
use crate::logging::{EntryStatus, StatusCounts};
use crate::paths;
use crate::platform::Platform;

/// Result of running a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task was skipped with a reason worth surfacing.
    Skipped(String),
    /// Dry-run: actions were reported but not applied.
    DryRun,
    /// Nothing to do here; the reason is logged at debug level.
    NotApplicable(String),
}

/// A named, executable unit of work for one entry.
pub trait Task {
    /// Human-readable task name (`application/entry`).
    fn name(&self) -> &str;

    /// Whether this task should run on the current platform.
    fn should_run(&self, ctx: &Context) -> bool;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be brought to its desired
    /// state. The error chain names the path and the cause.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// Execute a task, recording the result in the logger.
pub fn execute(task: &dyn Task, ctx: &Context) -> EntryStatus {
    if !task.should_run(ctx) {
        ctx.log
            .debug(&format!("skipping {}: not applicable", task.name()));
        ctx.log
            .record_entry(task.name(), EntryStatus::NotApplicable, None);
        return EntryStatus::NotApplicable;
    }

    let (status, message) = match task.run(ctx) {
        Ok(TaskResult::Ok) => (EntryStatus::Ok, None),
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("{}: skipped: {reason}", task.name()));
            (EntryStatus::Skipped, Some(reason))
        }
        Ok(TaskResult::DryRun) => (EntryStatus::DryRun, None),
        Ok(TaskResult::NotApplicable(reason)) => {
            ctx.log.debug(&format!("{}: {reason}", task.name()));
            (EntryStatus::NotApplicable, Some(reason))
        }
        Err(e) => {
            ctx.log.error(&format!("{}: {e:#}", task.name()));
            (EntryStatus::Failed, Some(format!("{e:#}")))
        }
    };
    ctx.log.record_entry(task.name(), status, message.as_deref());
    status
}

/// Direction of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Make every target a link into the backup root.
    Restore,
    /// Copy every live target into the backup root.
    Backup,
}

/// Per-status entry counts for one pass.
pub type PassReport = StatusCounts;

/// `application/entry` label used in logs and the summary.
#[must_use]
pub fn entry_label(app: &Application, entry: &Entry) -> String {
    format!("{}/{}", app.name, entry.name)
}

/// Resolved locations of one entry on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    /// Backup path inside the backup root.
    pub backup: PathBuf,
    /// Live target for the current OS.
    pub target: PathBuf,
}

impl EntryPaths {
    /// Resolve `entry` for `platform`. `None` when the entry names no target
    /// for this OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or target path fails to expand.
    pub fn resolve(root: &Path, entry: &Entry, platform: &Platform) -> Result<Option<Self>> {
        let Some(raw_target) = entry.target_for(platform.os) else {
            return Ok(None);
        };
        let backup = paths::resolve_backup(root, &entry.backup, platform)
            .with_context(|| format!("resolving backup path '{}'", entry.backup))?;
        let target = paths::expand(raw_target, platform)
            .with_context(|| format!("resolving target '{raw_target}'"))?;
        Ok(Some(Self { backup, target }))
    }

    /// `(backup, target)` pairs for each named file (file mode).
    #[must_use]
    pub fn file_pairs(&self, entry: &Entry) -> Vec<(PathBuf, PathBuf)> {
        entry
            .files
            .iter()
            .map(|f| (self.backup.join(f), self.target.join(f)))
            .collect()
    }
}

/// Reason an entry of this kind is never reconciled here, if any.
#[must_use]
pub fn unsupported_kind(entry: &Entry) -> Option<String> {
    match entry.kind {
        EntryKind::Config => None,
        EntryKind::Git => Some("git entries are managed outside dotlink".to_string()),
    }
}

/// Run one full pass in `direction` over every configured entry.
///
/// # Errors
///
/// Returns [`Cancelled`] if cancellation was requested before every entry
/// was processed. Entry failures are recorded, not returned.
pub fn run_pass(ctx: &Context, direction: Direction) -> Result<PassReport> {
    let mut report = PassReport::default();

    for app in &ctx.config.applications {
        if ctx.is_cancelled() {
            return Err(Cancelled.into());
        }

        if !app.in_scope(&ctx.platform) {
            ctx.log
                .debug(&format!("{}: filtered out on this machine", app.name));
            for entry in &app.entries {
                ctx.log.record_entry(
                    &entry_label(app, entry),
                    EntryStatus::NotApplicable,
                    Some("filtered out"),
                );
                report.add(EntryStatus::NotApplicable);
            }
            continue;
        }

        ctx.log.stage(&app.name);
        for entry in &app.entries {
            if ctx.is_cancelled() {
                return Err(Cancelled.into());
            }
            let status = match direction {
                Direction::Restore => execute(&restore::RestoreEntry::new(app, entry), ctx),
                Direction::Backup => execute(&backup::BackupEntry::new(app, entry), ctx),
            };
            report.add(status);
        }
    }

    Ok(report)
}

fn finish(report: PassReport, verb: &str) -> Result<PassReport> {
    if report.failed > 0 {
        let noun = if report.failed == 1 { "entry" } else { "entries" };
        bail!("{verb} finished with {} failed {noun}", report.failed);
    }
    Ok(report)
}

/// Restore pass: link every target to its backup.
///
/// # Errors
///
/// Returns an error if any entry failed or the pass was cancelled.
pub fn restore(ctx: &Context) -> Result<PassReport> {
    finish(run_pass(ctx, Direction::Restore)?, "restore")
}

/// Backup pass: copy every live target into the backup root.
///
/// # Errors
///
/// Returns an error if any entry failed or the pass was cancelled.
pub fn backup(ctx: &Context) -> Result<PassReport> {
    finish(run_pass(ctx, Direction::Backup)?, "backup")
}
