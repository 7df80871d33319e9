//! Command: restore every entry from the backup root.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish_pass};
use crate::cli::{GlobalOpts, RestoreOpts};
use crate::logging::Logger;
use crate::tasks::{self, RunOptions};

/// Run options for a restore invocation.
#[must_use]
pub const fn run_options(global: &GlobalOpts, opts: &RestoreOpts) -> RunOptions {
    RunOptions {
        dry_run: global.dry_run,
        no_merge: opts.no_merge,
        force: opts.force,
        force_delete: opts.force_delete,
        force_render: opts.force_render,
    }
}

/// Run the restore command.
///
/// # Errors
///
/// Returns an error if setup fails, any entry fails, or the pass is cancelled.
pub fn run(
    global: &GlobalOpts,
    opts: &RestoreOpts,
    log: &Arc<Logger>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    if global.dry_run {
        log.info("dry run: no changes will be made");
    }
    if opts.force_delete {
        log.warn("--force-delete: conflicting targets will be discarded");
    }
    let ctx = setup.into_context(run_options(global, opts), log, cancel);
    let result = tasks::restore(&ctx);
    finish_pass(&ctx, result, log)
}
