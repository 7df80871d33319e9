//! Command: list applications and entries.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::GlobalOpts;
use crate::logging::Log;
use crate::tasks::list;

/// Run the list command. Read-only.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(global: &GlobalOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let apps = list::list(&setup.config, &setup.platform);
    let home = setup.platform.home();
    print!(
        "{}",
        list::render_listing(&apps, &setup.config.root, home.as_deref())
    );
    Ok(())
}
