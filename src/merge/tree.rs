//! Folding a live subtree into its backup without discarding either side.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::PathError;
use crate::operations::FileSystemOps;
use crate::resources::fs;

/// What a merge did, file by file. Kept in memory for the current pass only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Backup-side paths that received a file from the target.
    pub merged: Vec<PathBuf>,
    /// `(original, renamed)`: the backup already had `original`, so the
    /// target's copy was stored as `renamed` next to it.
    pub conflicts: Vec<(PathBuf, PathBuf)>,
    /// Target-side paths that could not be moved, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl MergeSummary {
    /// Whether every file was moved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Append another summary.
    pub fn extend(&mut self, other: Self) {
        self.merged.extend(other.merged);
        self.conflicts.extend(other.conflicts);
        self.failed.extend(other.failed);
    }
}

/// Today's date in local time, used for conflict names.
#[must_use]
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Name under which a conflicting target file is stored:
/// `<base>_target_<YYYYMMDD><ext>` in the same directory as `path`.
///
/// Two conflicts for the same file on the same day map to the same name.
#[must_use]
pub fn conflict_name(path: &Path, today: NaiveDate) -> PathBuf {
    let stamp = today.format("%Y%m%d");
    let stem = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let name = path.extension().map_or_else(
        || format!("{stem}_target_{stamp}"),
        |ext| format!("{stem}_target_{stamp}.{}", ext.to_string_lossy()),
    );
    path.with_file_name(name)
}

/// Move one target file into the backup, renaming on conflict.
fn fold_one(
    src: &Path,
    dst: &Path,
    ops: &dyn FileSystemOps,
    today: NaiveDate,
    summary: &mut MergeSummary,
) {
    if fs::exists(dst) {
        let renamed = conflict_name(dst, today);
        match ops.move_path(src, &renamed) {
            Ok(()) => summary.conflicts.push((dst.to_path_buf(), renamed)),
            Err(e) => summary.failed.push((src.to_path_buf(), format!("{e:#}"))),
        }
    } else {
        match ops.move_path(src, dst) {
            Ok(()) => summary.merged.push(dst.to_path_buf()),
            Err(e) => summary.failed.push((src.to_path_buf(), format!("{e:#}"))),
        }
    }
}

/// Move every file under `target` into the same relative path under
/// `backup`.
///
/// Files the backup lacks are moved in place. Files the backup already has
/// are stored under [`conflict_name`] and the backup's copy is left as is.
/// Symlinks are moved as links. Per-file failures are collected in the
/// summary and the walk continues.
///
/// # Errors
///
/// Returns an error only if `target` itself cannot be listed.
pub fn merge_tree(
    target: &Path,
    backup: &Path,
    ops: &dyn FileSystemOps,
    today: NaiveDate,
) -> Result<MergeSummary, PathError> {
    let (files, unreadable) = fs::walk_files(target)?;
    let mut summary = MergeSummary::default();
    for (rel, err) in unreadable {
        summary.failed.push((target.join(rel), err.to_string()));
    }
    for rel in files {
        fold_one(
            &target.join(&rel),
            &backup.join(&rel),
            ops,
            today,
            &mut summary,
        );
    }
    Ok(summary)
}

/// Fold a single target file into its backup counterpart.
#[must_use]
pub fn merge_file(
    target_file: &Path,
    backup_file: &Path,
    ops: &dyn FileSystemOps,
    today: NaiveDate,
) -> MergeSummary {
    let mut summary = MergeSummary::default();
    fold_one(target_file, backup_file, ops, today, &mut summary);
    summary
}
