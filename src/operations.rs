//! Mutating filesystem back-ends.
//!
//! Every change the reconciliation and merge engines make goes through the
//! [`FileSystemOps`] trait. The back-end is picked once per entry: direct
//! in-process calls, elevated calls through an external `sudo` process, or a
//! dry-run back-end that only logs what it would do. Callers never re-branch
//! on dry-run or sudo at individual steps.

use std::fmt;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};

use crate::exec::Executor;
use crate::logging::Log;
use crate::resources::fs;

/// Abstraction over mutating filesystem operations.
pub trait FileSystemOps: Send + Sync + fmt::Debug {
    /// Create `path` and all missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Move `src` to `dst`, creating parents of `dst` as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the move fails.
    fn move_path(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Copy `src` over `dst` (files overwrite, directories merge).
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy_path(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove whatever occupies `path` without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Create a symlink at `link` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Write `contents` to `path`, replacing any file or link there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Whether this back-end actually mutates anything.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Which back-end an entry uses. Selected once per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process calls.
    Direct,
    /// External `sudo` process per operation.
    Elevated,
    /// Log only.
    DryRun,
}

impl Backend {
    /// Pick the back-end for an entry.
    ///
    /// Dry-run always wins; `sudo` entries use the elevated back-end unless
    /// the process is already privileged.
    #[must_use]
    pub const fn select(dry_run: bool, sudo: bool, already_elevated: bool) -> Self {
        if dry_run {
            Self::DryRun
        } else if sudo && !already_elevated {
            Self::Elevated
        } else {
            Self::Direct
        }
    }

    /// Build the back-end.
    #[must_use]
    pub fn build(self, executor: &Arc<dyn Executor>, log: &Arc<dyn Log>) -> Box<dyn FileSystemOps> {
        match self {
            Self::Direct => Box::new(SystemFileSystemOps),
            Self::Elevated => Box::new(ElevatedFileSystemOps::new(Arc::clone(executor))),
            Self::DryRun => Box::new(DryRunFileSystemOps::new(Arc::clone(log))),
        }
    }
}

/// Production back-end that delegates to [`crate::resources::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("create dir {}", path.display()))
    }

    fn move_path(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::move_path(src, dst)
            .with_context(|| format!("move {} -> {}", src.display(), dst.display()))
    }

    fn copy_path(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::copy_path(src, dst)
            .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        fs::remove_all_safe(path).with_context(|| format!("remove {}", path.display()))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        fs::ensure_parent_dir(link)?;
        fs::create_symlink(target, link)
            .with_context(|| format!("link {} -> {}", link.display(), target.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write_file(path, contents.as_bytes())
            .with_context(|| format!("write {}", path.display()))
    }
}

/// Back-end for `sudo` entries: each operation is a blocking child process
/// with inherited stdio so the operator can answer the password prompt.
#[derive(Debug)]
pub struct ElevatedFileSystemOps {
    executor: Arc<dyn Executor>,
}

impl ElevatedFileSystemOps {
    /// Create an elevated back-end on top of `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn sudo(&self, args: &[&str], paths: &[&Path]) -> Result<()> {
        if cfg!(windows) {
            bail!("elevated operations are not supported on Windows; run from an elevated shell");
        }
        if !self.executor.which("sudo") {
            bail!("sudo is required for this entry but was not found on PATH");
        }
        let mut argv: Vec<String> = args.iter().map(ToString::to_string).collect();
        argv.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        self.executor
            .run_interactive("sudo", &argv)
            .map(|_| ())
            .with_context(|| format!("sudo {}", argv.join(" ")))
    }

    fn mkdir_parent(&self, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.sudo(&["mkdir", "-p", "--"], &[parent])
            }
            _ => Ok(()),
        }
    }
}

impl FileSystemOps for ElevatedFileSystemOps {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.sudo(&["mkdir", "-p", "--"], &[path])
    }

    fn move_path(&self, src: &Path, dst: &Path) -> Result<()> {
        self.mkdir_parent(dst)?;
        // mv falls back to copy+unlink across filesystems on its own
        self.sudo(&["mv", "-T", "--"], &[src, dst])
    }

    fn copy_path(&self, src: &Path, dst: &Path) -> Result<()> {
        if fs::is_real_dir(src) {
            self.sudo(&["mkdir", "-p", "--"], &[dst])?;
            let contents = src.join(".");
            self.sudo(&["cp", "-a", "--"], &[&contents, dst])
        } else {
            self.mkdir_parent(dst)?;
            self.sudo(&["cp", "-a", "--remove-destination", "--"], &[src, dst])
        }
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        // rm -r unlinks symlinks rather than descending into them
        self.sudo(&["rm", "-rf", "--"], &[path])
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.mkdir_parent(link)?;
        self.sudo(&["ln", "-s", "--"], &[target, link])
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        // Must outlive the copy below.
        let mut staged = tempfile::Builder::new()
            .prefix("dotlink-")
            .tempfile()
            .context("create staging file")?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|()| staged.flush())
            .with_context(|| format!("stage {}", staged.path().display()))?;
        self.mkdir_parent(path)?;
        self.sudo(
            &["cp", "--remove-destination", "--"],
            &[staged.path(), path],
        )
    }
}

/// Back-end that logs every mutation as "would …" and performs none.
pub struct DryRunFileSystemOps {
    log: Arc<dyn Log>,
}

impl fmt::Debug for DryRunFileSystemOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunFileSystemOps")
            .field("log", &"<dyn Log>")
            .finish()
    }
}

impl DryRunFileSystemOps {
    /// Create a dry-run back-end that reports through `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }
}

impl FileSystemOps for DryRunFileSystemOps {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            self.log
                .dry_run(&format!("would create directory {}", path.display()));
        }
        Ok(())
    }

    fn move_path(&self, src: &Path, dst: &Path) -> Result<()> {
        self.log.dry_run(&format!(
            "would move {} -> {}",
            src.display(),
            dst.display()
        ));
        Ok(())
    }

    fn copy_path(&self, src: &Path, dst: &Path) -> Result<()> {
        self.log.dry_run(&format!(
            "would copy {} -> {}",
            src.display(),
            dst.display()
        ));
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        self.log.dry_run(&format!("would remove {}", path.display()));
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.log.dry_run(&format!(
            "would link {} -> {}",
            link.display(),
            target.display()
        ));
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.log.dry_run(&format!(
            "would write {} ({} bytes)",
            path.display(),
            contents.len()
        ));
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
