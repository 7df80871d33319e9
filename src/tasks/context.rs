use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, Entry};
use crate::exec::Executor;
use crate::history::RenderHistory;
use crate::logging::Log;
use crate::operations::{Backend, FileSystemOps};
use crate::platform::Platform;

/// Run-wide flags, fixed before the pass starts and passed down explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunOptions {
    /// Report every mutation instead of performing it.
    pub dry_run: bool,
    /// Strict mode: refuse to merge a non-empty target into an existing backup.
    pub no_merge: bool,
    /// Override strict mode.
    pub force: bool,
    /// Discard a conflicting target instead of merging it (destructive).
    pub force_delete: bool,
    /// Re-render templates even when their source is unchanged.
    pub force_render: bool,
}

/// Shared context for one reconciliation pass.
pub struct Context {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Logger for output and entry recording.
    pub log: Arc<dyn Log>,
    /// Run-wide flags.
    pub options: RunOptions,
    /// Command executor used by elevated operations.
    pub executor: Arc<dyn Executor>,
    /// Render history of the backup root, opened once per invocation.
    pub history: Arc<RenderHistory>,
    /// Set from outside (Ctrl-C) to stop the pass between entries.
    pub cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.config.root)
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("options", &self.options)
            .field("executor", &"<dyn Executor>")
            .field("history", &self.history.path())
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl Context {
    /// Creates a new context with a fresh cancellation flag.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        platform: Arc<Platform>,
        log: Arc<dyn Log>,
        options: RunOptions,
        executor: Arc<dyn Executor>,
        history: Arc<RenderHistory>,
    ) -> Self {
        Self {
            config,
            platform,
            log,
            options,
            executor,
            history,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `cancel` as the cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backup root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// The mutation back-end for `entry`, chosen once for the whole entry.
    #[must_use]
    pub fn backend_for(&self, entry: &Entry) -> Box<dyn FileSystemOps> {
        Backend::select(self.options.dry_run, entry.sudo, self.platform.elevated)
            .build(&self.executor, &self.log)
    }
}
