//! Command: copy live targets into the backup root.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use super::{CommandSetup, finish_pass};
use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::tasks::{self, RunOptions};

/// Run the backup command.
///
/// # Errors
///
/// Returns an error if setup fails, any entry fails, or the pass is cancelled.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>, cancel: Arc<AtomicBool>) -> Result<()> {
    let setup = CommandSetup::init(global, log.as_ref())?;
    let options = RunOptions {
        dry_run: global.dry_run,
        ..RunOptions::default()
    };
    let ctx = setup.into_context(options, log, cancel);
    let result = tasks::backup(&ctx);
    finish_pass(&ctx, result, log)
}
