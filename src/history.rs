//! Durable render history for templates.
//!
//! One JSON file at the top of the backup root holds, per template, the last
//! few renders: the source hash and the *pure* rendered text (before any
//! merge with local edits). The file travels with the backup, so a fresh
//! clone on another machine keeps the merge base for every template.
//!
//! Writes go through on every [`RenderHistory::record`]: the whole store is
//! serialized to a temporary sibling and renamed over the real file, so a
//! crash never leaves a half-written store behind. A store nobody recorded
//! into is never rewritten, and a read-only store is never written at all.
//!
//! The store is used from a single thread. Lookup followed by record is a
//! check-then-act sequence with no version guard.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::logging::Log;
use crate::platform::{Os, Platform};

/// File name of the store inside the backup root.
pub const HISTORY_FILE: &str = ".dotlink-history.json";

/// Schema version written by this build.
const SCHEMA_VERSION: u32 = 1;

/// Records kept per template; only the newest is consulted.
const KEEP_PER_KEY: usize = 5;

/// One render of one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRecord {
    /// Lowercase hex SHA-256 of the template source.
    pub template_hash: String,
    /// Rendered output exactly as produced, never merged or edited.
    pub pure_render: String,
    /// OS the render happened on.
    pub os: Os,
    /// Host the render happened on.
    pub hostname: String,
    /// When the render happened.
    pub rendered_at: DateTime<Utc>,
}

impl RenderRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn new(template_hash: &str, pure_render: &str, platform: &Platform) -> Self {
        Self {
            template_hash: template_hash.to_string(),
            pure_render: pure_render.to_string(),
            os: platform.os,
            hostname: platform.hostname.clone(),
            rendered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    records: BTreeMap<String, Vec<RenderRecord>>,
}

#[derive(Debug)]
struct State {
    records: BTreeMap<String, Vec<RenderRecord>>,
    closed: bool,
    /// Records added since the last successful write.
    dirty: bool,
}

/// The render history for one backup root.
#[derive(Debug)]
pub struct RenderHistory {
    path: PathBuf,
    read_only: bool,
    state: Mutex<State>,
}

impl RenderHistory {
    /// Open the store under `backup_root`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Io`] if the file exists but cannot be read,
    /// [`HistoryError::Corrupt`] if it does not parse, and
    /// [`HistoryError::UnsupportedSchema`] if a newer build wrote it.
    pub fn open(backup_root: &Path) -> Result<Self, HistoryError> {
        let path = backup_root.join(HISTORY_FILE);
        let records = match fs::read_to_string(&path) {
            Ok(text) => {
                let file: StoreFile =
                    serde_json::from_str(&text).map_err(|source| HistoryError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                if file.version > SCHEMA_VERSION {
                    return Err(HistoryError::UnsupportedSchema {
                        found: file.version,
                        supported: SCHEMA_VERSION,
                    });
                }
                file.records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(HistoryError::Io { path, source }),
        };
        Ok(Self::with_records(path, records, false))
    }

    /// Open the store, falling back to an empty one on any error.
    ///
    /// A corrupt file is moved aside to `<file>.corrupt` so the next write
    /// does not destroy it. A file from a newer schema is left untouched and
    /// the store is read-only for the run. Every failure is logged as a
    /// warning; losing the history only costs a redundant re-render.
    #[must_use]
    pub fn open_or_recover(backup_root: &Path, log: &dyn Log) -> Self {
        match Self::open(backup_root) {
            Ok(history) => history,
            Err(e @ HistoryError::UnsupportedSchema { .. }) => {
                log.warn(&format!(
                    "{e}; leaving it untouched and not recording renders this run"
                ));
                Self::with_records(backup_root.join(HISTORY_FILE), BTreeMap::new(), true)
            }
            Err(HistoryError::Corrupt { path, source }) => {
                let aside = path.with_extension("json.corrupt");
                match fs::rename(&path, &aside) {
                    Ok(()) => log.warn(&format!(
                        "render history is corrupt ({source}); moved to {} and starting fresh",
                        aside.display()
                    )),
                    Err(e) => log.warn(&format!(
                        "render history is corrupt ({source}) and could not be moved aside: {e}"
                    )),
                }
                Self::with_records(path, BTreeMap::new(), false)
            }
            Err(e) => {
                log.warn(&format!("{e}; treating every template as never rendered"));
                Self::with_records(backup_root.join(HISTORY_FILE), BTreeMap::new(), false)
            }
        }
    }

    /// Open the store for lookups only, for dry runs and queries.
    ///
    /// Nothing on disk is touched: a corrupt or newer file stays where it is
    /// and the store behaves as empty. [`record`](Self::record) fails with
    /// [`HistoryError::ReadOnly`] and [`close`](Self::close) never writes.
    #[must_use]
    pub fn open_read_only(backup_root: &Path, log: &dyn Log) -> Self {
        match Self::open(backup_root) {
            Ok(history) => Self {
                read_only: true,
                ..history
            },
            Err(e) => {
                log.warn(&format!("{e}; treating every template as never rendered"));
                Self::with_records(backup_root.join(HISTORY_FILE), BTreeMap::new(), true)
            }
        }
    }

    /// Open the store for a reconciliation pass: read-only for a dry run,
    /// recovering otherwise.
    #[must_use]
    pub fn open_for_pass(backup_root: &Path, dry_run: bool, log: &dyn Log) -> Self {
        if dry_run {
            Self::open_read_only(backup_root, log)
        } else {
            Self::open_or_recover(backup_root, log)
        }
    }

    /// An empty store that lives only in memory until the first record.
    #[must_use]
    pub fn empty(backup_root: &Path) -> Self {
        Self::with_records(backup_root.join(HISTORY_FILE), BTreeMap::new(), false)
    }

    fn with_records(
        path: PathBuf,
        records: BTreeMap<String, Vec<RenderRecord>>,
        read_only: bool,
    ) -> Self {
        Self {
            path,
            read_only,
            state: Mutex::new(State {
                records,
                closed: false,
                dirty: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The newest record for `key`, if any.
    #[must_use]
    pub fn latest(&self, key: &str) -> Option<RenderRecord> {
        self.lock()
            .records
            .get(key)
            .and_then(|list| list.last())
            .cloned()
    }

    /// Number of records kept for `key`.
    #[must_use]
    pub fn depth(&self, key: &str) -> usize {
        self.lock().records.get(key).map_or(0, Vec::len)
    }

    /// Append `record` under `key` and persist the store.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Closed`] after [`close`](Self::close),
    /// [`HistoryError::ReadOnly`] on a read-only store, or
    /// [`HistoryError::Io`] if the store cannot be written. The in-memory
    /// record is kept when persisting fails, and [`close`](Self::close)
    /// retries the write.
    pub fn record(&self, key: &str, record: RenderRecord) -> Result<(), HistoryError> {
        let mut state = self.lock();
        if state.closed {
            return Err(HistoryError::Closed);
        }
        if self.read_only {
            return Err(HistoryError::ReadOnly {
                path: self.path.clone(),
            });
        }
        let list = state.records.entry(key.to_string()).or_default();
        list.push(record);
        let excess = list.len().saturating_sub(KEEP_PER_KEY);
        list.drain(..excess);
        state.dirty = true;
        self.persist(&state.records)?;
        state.dirty = false;
        Ok(())
    }

    /// Flush and close the store. Later [`record`](Self::record) calls fail.
    ///
    /// Only records whose write failed are flushed; a clean store leaves the
    /// file alone. Closing an already closed store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Io`] if the final flush fails.
    pub fn close(&self) -> Result<(), HistoryError> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        if !state.dirty {
            return Ok(());
        }
        self.persist(&state.records)?;
        state.dirty = false;
        Ok(())
    }

    fn persist(&self, records: &BTreeMap<String, Vec<RenderRecord>>) -> Result<(), HistoryError> {
        #[derive(Serialize)]
        struct StoreRef<'a> {
            version: u32,
            records: &'a BTreeMap<String, Vec<RenderRecord>>,
        }

        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&StoreRef {
            version: SCHEMA_VERSION,
            records,
        })
        .map_err(|e| io_err(std::io::Error::other(e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n").map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}
