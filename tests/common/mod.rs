// Shared helpers for integration tests.
//
// Provides a temporary backup root plus a fake home directory, and a fluent
// builder so each test can lay out both sides without repeating filesystem
// boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotlink_cli::config::Config;
use dotlink_cli::exec::SystemExecutor;
use dotlink_cli::history::RenderHistory;
use dotlink_cli::logging::Logger;
use dotlink_cli::platform::{Os, Platform};
use dotlink_cli::tasks::{Context, RunOptions};

/// An isolated backup root and home directory backed by a
/// [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    dir: tempfile::TempDir,
    /// Backup root (holds `dotlink.toml`).
    pub root: PathBuf,
    /// Fake home directory targets expand against.
    pub home: PathBuf,
}

impl IntegrationTestContext {
    /// Create empty `backup/` and `home/` directories.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().join("backup");
        let home = dir.path().join("home");
        std::fs::create_dir_all(&root).expect("create backup root");
        std::fs::create_dir_all(&home).expect("create home");
        Self { dir, root, home }
    }

    /// Linux platform whose `$HOME` is the fake home.
    pub fn platform(&self) -> Platform {
        Platform::new(Os::Linux, "arch", "desk", "alice")
            .with_env([("HOME", self.home.display().to_string())])
    }

    /// Load `dotlink.toml` from the backup root.
    pub fn load_config(&self) -> Config {
        Config::load(&self.root, &self.platform()).expect("load config")
    }

    /// A pass context with a fresh history handle and logger, opened the way
    /// the commands open it.
    pub fn context(&self, options: RunOptions) -> (Context, Arc<Logger>) {
        let log = Arc::new(Logger::new("test"));
        let history = RenderHistory::open_for_pass(&self.root, options.dry_run, log.as_ref());
        let ctx = Context::new(
            Arc::new(self.load_config()),
            Arc::new(self.platform()),
            Arc::clone(&log) as Arc<dyn dotlink_cli::logging::Log>,
            options,
            Arc::new(SystemExecutor),
            Arc::new(history),
        );
        (ctx, log)
    }

    /// Read a file under the backup root.
    pub fn read_backup(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.join(rel)).expect("read backup file")
    }

    /// Read a file under the fake home, following links.
    pub fn read_home(&self, rel: &str) -> String {
        std::fs::read_to_string(self.home.join(rel)).expect("read home file")
    }

    /// Every path under the temp dir, with file contents or link values, so
    /// tests can assert that nothing changed.
    pub fn tree_snapshot(&self) -> BTreeMap<PathBuf, String> {
        let mut out = BTreeMap::new();
        collect(self.dir.path(), self.dir.path(), &mut out);
        out
    }
}

fn collect(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    entries.sort();
    for path in entries {
        let rel = path.strip_prefix(base).expect("under base").to_path_buf();
        let meta = std::fs::symlink_metadata(&path).expect("stat");
        if meta.file_type().is_symlink() {
            let link = std::fs::read_link(&path).expect("read link");
            out.insert(rel, format!("-> {}", link.display()));
        } else if meta.is_dir() {
            out.insert(rel, "<dir>".to_string());
            collect(base, &path, out);
        } else {
            let bytes = std::fs::read(&path).expect("read file");
            out.insert(rel, String::from_utf8_lossy(&bytes).into_owned());
        }
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `dotlink.toml`.
    pub fn with_config(self, content: &str) -> Self {
        std::fs::write(self.ctx.root.join("dotlink.toml"), content).expect("write config");
        self
    }

    /// Write a file under the backup root.
    pub fn with_backup_file(self, rel: &str, content: &str) -> Self {
        write_with_parents(&self.ctx.root.join(rel), content);
        self
    }

    /// Write a file under the fake home.
    pub fn with_home_file(self, rel: &str, content: &str) -> Self {
        write_with_parents(&self.ctx.home.join(rel), content);
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

fn write_with_parents(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, content).expect("write file");
}

/// Config with one folder-mode entry `backup` linked at `~/<target>`.
pub fn folder_entry_config(backup: &str, target: &str) -> String {
    format!(
        r#"version = 1

[[applications]]
name = "app"

[[applications.entries]]
name = "config"
backup = "{backup}"
targets = {{ linux = "~/{target}" }}
"#
    )
}
