//! Subcommand orchestration.
pub mod backup;
pub mod list;
pub mod restore;
pub mod templates;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::{CONFIG_FILE, Config, validation};
use crate::exec::SystemExecutor;
use crate::history::RenderHistory;
use crate::logging::{Log, Logger};
use crate::platform::Platform;
use crate::tasks::{Context, PassReport, RunOptions};

/// Environment variable naming the backup root.
pub const ROOT_ENV: &str = "DOTLINK_ROOT";

/// Resolve the directory holding `dotlink.toml`: `--root`, then
/// `$DOTLINK_ROOT`, then the current directory if it has a config file.
///
/// # Errors
///
/// Returns an error if none of these yields a directory.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref root) = global.root {
        return Ok(root.clone());
    }

    if let Ok(root) = std::env::var(ROOT_ENV)
        && !root.is_empty()
    {
        return Ok(PathBuf::from(root));
    }

    let cwd = std::env::current_dir()?;
    if cwd.join(CONFIG_FILE).exists() {
        return Ok(cwd);
    }

    anyhow::bail!("cannot determine backup root. Use --root or set {ROOT_ENV}");
}

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected platform.
    pub platform: Platform,
    /// Loaded configuration.
    pub config: Config,
}

impl CommandSetup {
    /// Detect the platform and load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined or the
    /// configuration fails to load.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let platform = Platform::detect();
        let dir = resolve_root(global)?;

        log.stage("Loading configuration");
        let config = Config::load(&dir, &platform)?;
        let in_scope = config.in_scope(&platform).count();
        log.info(&format!(
            "{} application(s), {in_scope} for this machine ({} {})",
            config.applications.len(),
            platform.os,
            platform.hostname
        ));
        log.debug(&format!("backup root: {}", config.root.display()));

        let warnings = validation::validate_all(&config.root, &platform, &config.applications);
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }

        Ok(Self { platform, config })
    }

    /// Build the pass context, opening the render history of the root.
    ///
    /// A dry run opens the history read-only.
    #[must_use]
    pub fn into_context(self, options: RunOptions, log: &Arc<Logger>, cancel: Arc<AtomicBool>) -> Context {
        let log: Arc<dyn Log> = Arc::clone(log) as Arc<dyn Log>;
        let history =
            RenderHistory::open_for_pass(&self.config.root, options.dry_run, log.as_ref());
        Context::new(
            Arc::new(self.config),
            Arc::new(self.platform),
            log,
            options,
            Arc::new(SystemExecutor),
            Arc::new(history),
        )
        .with_cancel(cancel)
    }
}

/// Close the history, print the summary, and return the pass result.
///
/// # Errors
///
/// Returns the pass error, if any.
pub fn finish_pass(ctx: &Context, result: Result<PassReport>, log: &Logger) -> Result<()> {
    if let Err(e) = ctx.history.close() {
        log.warn(&format!("{e}"));
    }
    log.print_summary();
    result.map(|_| ())
}
