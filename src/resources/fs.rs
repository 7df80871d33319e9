//! Filesystem primitives shared by the merge, template, and reconciliation
//! engines.
//!
//! Every helper is symlink-aware: links are inspected with `lstat`, copied as
//! links, and never descended into when removing.
use std::path::{Path, PathBuf};

use crate::error::PathError;

/// Result alias for filesystem primitives.
pub type FsResult<T> = Result<T, PathError>;

/// Returns `true` if `path` itself is a symbolic link (broken or not).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink())
}

/// Returns `true` if anything occupies `path`, including a broken symlink.
#[must_use]
pub fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Returns `true` if `path` is a real directory (not a link to one).
#[must_use]
pub fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

/// Ensure the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> FsResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| PathError::new("create dir", parent, e))?;
    }
    Ok(())
}

/// Copy one file, preserving its permission bits. Parent directories of
/// `dst` are created. A symlink at `src` is recreated as a link.
///
/// # Errors
///
/// Returns an error if `src` cannot be read or `dst` cannot be written.
pub fn copy_file(src: &Path, dst: &Path) -> FsResult<()> {
    ensure_parent_dir(dst)?;
    if is_symlink(src) {
        let link = std::fs::read_link(src).map_err(|e| PathError::new("read link", src, e))?;
        if exists(dst) {
            remove_all_safe(dst)?;
        }
        return create_symlink(&link, dst);
    }
    if is_symlink(dst) {
        // Never write through a link that happens to sit at the destination
        remove_symlink(dst)?;
    }
    // std::fs::copy carries the permission bits over on every platform.
    std::fs::copy(src, dst).map_err(|e| PathError::new("copy", src, e))?;
    Ok(())
}

/// Write `contents` to `path`, creating parent directories. A symlink at
/// `path` is replaced rather than written through.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_file(path: &Path, contents: &[u8]) -> FsResult<()> {
    ensure_parent_dir(path)?;
    if is_symlink(path) {
        remove_symlink(path)?;
    }
    std::fs::write(path, contents).map_err(|e| PathError::new("write", path, e))
}

/// Recursively copy a directory tree, overwriting files that already exist at
/// the destination. Symlinks inside the tree are copied as links.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> FsResult<()> {
    std::fs::create_dir_all(dst).map_err(|e| PathError::new("create dir", dst, e))?;
    let entries = std::fs::read_dir(src).map_err(|e| PathError::new("read dir", src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PathError::new("read dir", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if is_real_dir(&src_path) {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            copy_file(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Copy `src` (file, link, or directory) to `dst`.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_path(src: &Path, dst: &Path) -> FsResult<()> {
    if is_real_dir(src) {
        copy_dir_recursive(src, dst)
    } else {
        copy_file(src, dst)
    }
}

/// Remove whatever occupies `path`.
///
/// Symlinks are unlinked (their targets are left alone) and real directories
/// are removed bottom-up without following any link found inside them.
/// Missing paths are not an error.
///
/// # Errors
///
/// Returns an error if an entry cannot be removed.
pub fn remove_all_safe(path: &Path) -> FsResult<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    if meta.file_type().is_symlink() {
        return remove_symlink(path);
    }
    if meta.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| PathError::new("read dir", path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PathError::new("read dir", path, e))?;
            remove_all_safe(&entry.path())?;
        }
        std::fs::remove_dir(path).map_err(|e| PathError::new("remove dir", path, e))
    } else {
        std::fs::remove_file(path).map_err(|e| PathError::new("remove", path, e))
    }
}

/// Move `src` to `dst`.
///
/// Tries a rename first; when that fails (typically because the two paths
/// live on different filesystems) the content is copied and the source
/// removed. The source is only removed after the copy succeeded.
///
/// # Errors
///
/// Returns an error if both the rename and the copy fallback fail.
pub fn move_path(src: &Path, dst: &Path) -> FsResult<()> {
    ensure_parent_dir(dst)?;
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_path(src, dst)?;
    remove_all_safe(src)
}

/// Count the non-directory entries under `path` (a file counts as one).
///
/// Symlinked directories are counted as a single entry, not descended into.
#[must_use]
pub fn count_files(path: &Path) -> usize {
    if !is_real_dir(path) {
        return usize::from(exists(path));
    }
    std::fs::read_dir(path).map_or(0, |entries| {
        entries
            .filter_map(Result::ok)
            .map(|e| count_files(&e.path()))
            .sum()
    })
}

/// Collect every non-directory path under `root`, relative to `root`, in a
/// stable (sorted) order. Symlinked directories are reported as leaves.
///
/// # Errors
///
/// Returns an error only if `root` itself cannot be read; unreadable
/// subdirectories are returned in the second element instead.
pub fn walk_files(root: &Path) -> FsResult<(Vec<PathBuf>, Vec<(PathBuf, PathError)>)> {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let top = std::fs::read_dir(root).map_err(|e| PathError::new("read dir", root, e))?;
    let mut stack: Vec<(PathBuf, std::fs::ReadDir)> = vec![(PathBuf::new(), top)];
    while let Some((rel_dir, mut iter)) = stack.pop() {
        let Some(entry) = iter.next() else {
            continue;
        };
        let dir_for_err = root.join(&rel_dir);
        stack.push((rel_dir.clone(), iter));
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                errors.push((rel_dir.clone(), PathError::new("read dir", dir_for_err, e)));
                continue;
            }
        };
        let rel = rel_dir.join(entry.file_name());
        let abs = entry.path();
        if is_real_dir(&abs) {
            match std::fs::read_dir(&abs) {
                Ok(sub) => stack.push((rel, sub)),
                Err(e) => errors.push((rel, PathError::new("read dir", abs, e))),
            }
        } else {
            files.push(rel);
        }
    }
    files.sort();
    Ok((files, errors))
}

/// Create a symlink at `link` pointing to `target`.
///
/// On Windows, if symlink creation fails with "Access is denied" (OS error 5),
/// falls back to a junction for directories and a hard link for files.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> FsResult<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).map_err(|e| PathError::new("symlink", link, e))
    }

    #[cfg(windows)]
    {
        let resolved = link.parent().map_or_else(|| target.to_path_buf(), |p| p.join(target));
        let result = if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(5) => create_symlink_fallback(&resolved, link),
            Err(e) => Err(PathError::new("symlink", link, e)),
        }
    }
}

/// Fallback for Windows when symlinks are not permitted: junctions for
/// directories (via `mklink /J`), hard links for files.
#[cfg(windows)]
fn create_symlink_fallback(target: &Path, link: &Path) -> FsResult<()> {
    if target.is_dir() {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        let output = std::process::Command::new("cmd")
            .arg("/c")
            .arg(format!(
                "mklink /J \"{}\" \"{}\"",
                link.display(),
                target.display()
            ))
            .creation_flags(CREATE_NO_WINDOW)
            .output()
            .map_err(|e| PathError::new("mklink /J", link, e))?;
        if !output.status.success() {
            return Err(PathError::new(
                "mklink /J",
                link,
                std::io::Error::other(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            ));
        }
        Ok(())
    } else {
        std::fs::hard_link(target, link).map_err(|e| PathError::new("hard link", link, e))
    }
}

/// Remove a symlink (or junction) without touching what it points to.
///
/// On Windows, directory symlinks must be removed with `remove_dir`.
///
/// # Errors
///
/// Returns an error if the link cannot be removed.
pub fn remove_symlink(path: &Path) -> FsResult<()> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| PathError::new("stat", path, e))?;
    let result = if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| PathError::new("remove link", path, e))
}

/// On Windows, `symlink_metadata().is_dir()` is `false` for directory
/// symlinks, so the raw `FILE_ATTRIBUTE_DIRECTORY` bit is checked instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}

/// Compare two paths, normalising the `\\?\` prefix that Windows `read_link`
/// prepends to extended-length paths.
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    strip_win_prefix(a) == strip_win_prefix(b)
}

fn strip_win_prefix(p: &Path) -> PathBuf {
    let s = p.to_string_lossy();
    s.strip_prefix(r"\\?\")
        .map_or_else(|| p.to_path_buf(), PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("a.txt"), b"aaa").unwrap();
        std::fs::create_dir(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/b.txt"), b"bbb").unwrap();

        let target = dst.path().join("out");
        copy_dir_recursive(src.path(), &target).unwrap();

        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(target.join("sub/b.txt")).unwrap(), b"bbb");
    }

    #[test]
    fn copy_dir_overwrites_existing_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"new").unwrap();
        std::fs::write(dst.path().join("a.txt"), b"old").unwrap();
        std::fs::write(dst.path().join("keep.txt"), b"keep").unwrap();

        copy_dir_recursive(src.path(), dst.path()).unwrap();

        assert_eq!(std::fs::read(dst.path().join("a.txt")).unwrap(), b"new");
        assert_eq!(std::fs::read(dst.path().join("keep.txt")).unwrap(), b"keep");
    }

    #[cfg(unix)]
    #[test]
    fn copy_file_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("script.sh");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o750)).unwrap();

        let dst = dir.path().join("nested/out.sh");
        copy_file(&src, &dst).unwrap();

        let mode = std::fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn copy_dir_keeps_symlinks_as_links() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/nonexistent/plugin", src.path().join("plugin")).unwrap();

        copy_dir_recursive(src.path(), &dst.path().join("out")).unwrap();

        let link = dst.path().join("out/plugin");
        assert!(is_symlink(&link));
        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("/nonexistent/plugin")
        );
    }

    #[cfg(unix)]
    #[test]
    fn remove_all_safe_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("precious.txt"), "keep me").unwrap();

        let tree = dir.path().join("tree");
        std::fs::create_dir_all(tree.join("sub")).unwrap();
        std::fs::write(tree.join("sub/file"), "x").unwrap();
        std::os::unix::fs::symlink(&outside, tree.join("sub/link")).unwrap();

        remove_all_safe(&tree).unwrap();

        assert!(!exists(&tree));
        assert_eq!(
            std::fs::read_to_string(outside.join("precious.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn remove_all_safe_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_all_safe(&dir.path().join("nope")).unwrap();
    }

    #[test]
    fn move_path_moves_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("inner")).unwrap();
        std::fs::write(src.join("inner/f"), "data").unwrap();

        let dst = dir.path().join("a/b/dst");
        move_path(&src, &dst).unwrap();

        assert!(!exists(&src));
        assert_eq!(std::fs::read_to_string(dst.join("inner/f")).unwrap(), "data");
    }

    #[test]
    fn count_files_counts_leaves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("one"), "").unwrap();
        std::fs::write(dir.path().join("a/two"), "").unwrap();
        std::fs::write(dir.path().join("a/b/three"), "").unwrap();

        assert_eq!(count_files(dir.path()), 3);
        assert_eq!(count_files(&dir.path().join("one")), 1);
        assert_eq!(count_files(&dir.path().join("missing")), 0);
    }

    #[test]
    fn walk_files_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("z/y")).unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        std::fs::write(dir.path().join("z/y/a"), "").unwrap();
        std::fs::write(dir.path().join("a"), "").unwrap();

        let (files, errors) = walk_files(dir.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(
            files,
            vec![
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("z").join("y").join("a"),
            ]
        );
    }

    #[test]
    fn walk_files_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(walk_files(&dir.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_helpers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::write(&target, "t").unwrap();
        let link = dir.path().join("link");

        create_symlink(&target, &link).unwrap();
        assert!(is_symlink(&link));
        assert!(exists(&link));

        remove_symlink(&link).unwrap();
        assert!(!exists(&link));
        assert!(target.exists());
    }

    #[test]
    fn paths_equal_with_unc_prefix() {
        let a = PathBuf::from(r"\\?\C:\Code\dotfiles\nvim");
        let b = PathBuf::from(r"C:\Code\dotfiles\nvim");
        assert!(paths_equal(&a, &b));
        assert!(!paths_equal(&a, &PathBuf::from(r"C:\Code\dotfiles\zsh")));
    }
}
