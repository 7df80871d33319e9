//! Domain-specific error types for the reconciliation engine.
//!
//! Internal modules return typed errors built with [`thiserror`]; task and
//! command boundaries wrap them in [`anyhow::Error`] with `.context()` so the
//! final report names the entry, the path, and the root cause.
//!
//! # Error taxonomy
//!
//! ```text
//! PathError      : an operation failed against one path (carries path and cause)
//! MergeBlocked   : strict mode refused to fold live content into the backup
//! HistoryError   : render-history store problems (logged, never fatal)
//! ConfigError    : configuration loading and schema problems
//! Cancelled      : the pass observed a cancellation request
//! ```
//!
//! Merge conflicts are not errors. They succeed with a conflict artifact and
//! a warning.

use std::path::PathBuf;

use thiserror::Error;

/// A filesystem operation failed against a specific path.
#[derive(Error, Debug)]
#[error("{op} {}: {source}", path.display())]
pub struct PathError {
    /// Short verb describing the operation (`"move"`, `"read"`, …).
    pub op: &'static str,
    /// Path the operation was applied to.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl PathError {
    /// Wrap `source` with the operation name and the path it failed on.
    #[must_use]
    pub fn new(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Strict ("no-merge") mode refused to fold a non-empty target into an
/// existing backup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "entry '{entry}': target {} already contains {files} file(s) and the backup exists; \
     re-run with --force to merge anyway, or drop --no-merge",
    path.display()
)]
pub struct MergeBlocked {
    /// Entry name.
    pub entry: String,
    /// The live target that would have been merged.
    pub path: PathBuf,
    /// Number of files found under the target.
    pub files: usize,
}

/// Errors from the render-history store.
///
/// Callers log these as warnings and degrade to "never rendered".
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The store file could not be read or written.
    #[error("render history I/O on {}: {source}", path.display())]
    Io {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The store file exists but is not valid JSON in the expected shape.
    #[error("render history at {} is corrupt: {source}", path.display())]
    Corrupt {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The store was written by a newer schema than this build understands.
    #[error("render history schema {found} is newer than supported {supported}")]
    UnsupportedSchema {
        /// Schema version found on disk.
        found: u32,
        /// Highest schema version this build reads.
        supported: u32,
    },

    /// A write was attempted after [`close`](crate::history::RenderHistory::close).
    #[error("render history is closed")]
    Closed,

    /// A write was attempted on a store opened without write access.
    #[error("render history at {} is read-only for this run", path.display())]
    ReadOnly {
        /// Path of the store file.
        path: PathBuf,
    },
}

/// Errors that arise from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file declares a schema version this build does not read.
    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version declared in the file.
        found: u32,
        /// Highest supported version.
        supported: u32,
    },

    /// An I/O error occurred while reading the config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML could not be parsed into the configuration model.
    #[error("invalid config {path}: {message}")]
    Invalid {
        /// Path to the offending file.
        path: String,
        /// Parser message.
        message: String,
    },
}

/// The pass stopped because cancellation was requested.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cancelled before all entries were processed")]
pub struct Cancelled;
