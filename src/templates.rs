//! Template rendering and linking inside a backup subtree.
//!
//! A template `app.conf.tmpl` produces three siblings:
//!
//! ```text
//! app.conf.tmpl        source (version-controlled)
//! app.conf.rendered    rendered output; the user may edit it in place
//! app.conf             relative symlink to app.conf.rendered
//! app.conf.conflict    only when a three-way merge could not reconcile
//! ```
//!
//! Each render is recorded in the [`RenderHistory`] with the *pure* output so
//! the next render can three-way merge: base = previous pure render,
//! theirs = rendered file as the user left it, ours = fresh render.
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use sha2::{Digest, Sha256};

use crate::error::PathError;
use crate::history::{RenderHistory, RenderRecord};
use crate::logging::Log;
use crate::merge::merge3;
use crate::operations::FileSystemOps;
use crate::paths;
use crate::platform::Platform;
use crate::resources::fs;

/// Suffix marking a template source.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";
/// Suffix of the rendered artifact.
pub const RENDERED_SUFFIX: &str = ".rendered";
/// Suffix of the conflict artifact.
pub const CONFLICT_SUFFIX: &str = ".conflict";
/// Suffix of backups taken before overwriting.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn hash_source(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

/// Whether `path` is a file this engine generated.
fn is_generated(path: &Path) -> bool {
    let name = path.to_string_lossy();
    [RENDERED_SUFFIX, CONFLICT_SUFFIX, BACKUP_SUFFIX]
        .iter()
        .any(|s| name.ends_with(s))
}

/// Every template source under `dir`, in a stable order.
///
/// Symlinked directories are not followed and generated files are skipped.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, PathError> {
    let (files, _unreadable) = fs::walk_files(dir)?;
    Ok(files
        .into_iter()
        .filter(|rel| !is_generated(rel) && rel.to_string_lossy().ends_with(TEMPLATE_SUFFIX))
        .map(|rel| dir.join(rel))
        .collect())
}

/// The sibling paths that belong to one template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    /// The `.tmpl` source.
    pub source: PathBuf,
    /// Logical name: the source without its suffix; a symlink to `rendered`.
    pub logical: PathBuf,
    /// Rendered artifact.
    pub rendered: PathBuf,
    /// Conflict artifact.
    pub conflict: PathBuf,
    /// Backup of an orphaned rendered artifact.
    pub orphan_backup: PathBuf,
}

impl TemplatePaths {
    /// Derive the siblings of `source`. `None` if it lacks the template suffix.
    #[must_use]
    pub fn of(source: &Path) -> Option<Self> {
        let name = source.file_name()?.to_str()?;
        let logical_name = name.strip_suffix(TEMPLATE_SUFFIX)?;
        if logical_name.is_empty() {
            return None;
        }
        let rendered_name = format!("{logical_name}{RENDERED_SUFFIX}");
        Some(Self {
            source: source.to_path_buf(),
            logical: source.with_file_name(logical_name),
            rendered: source.with_file_name(&rendered_name),
            conflict: source.with_file_name(format!("{logical_name}{CONFLICT_SUFFIX}")),
            orphan_backup: source.with_file_name(format!("{rendered_name}{BACKUP_SUFFIX}")),
        })
    }

    /// File name of the rendered artifact; the logical link's target.
    fn rendered_name(&self) -> PathBuf {
        self.rendered
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}

/// What happened to one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Source and rendered artifact unchanged since the last render.
    Unchanged,
    /// Rendered for the first time.
    FirstRender,
    /// Rendered over an artifact with no history; the old one was kept as
    /// `.rendered.bak`.
    Orphan,
    /// Re-rendered and merged with the previous render and local edits.
    Merged,
    /// Re-rendered with conflicting regions; a conflict artifact was written.
    Conflict {
        /// Number of conflicting regions.
        regions: usize,
    },
}

/// Per-directory result of [`TemplateEngine::process_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSummary {
    /// First renders and orphan re-renders.
    pub rendered: Vec<PathBuf>,
    /// Templates skipped by the fast path.
    pub unchanged: Vec<PathBuf>,
    /// Clean three-way merges.
    pub merged: Vec<PathBuf>,
    /// Templates that left a conflict artifact.
    pub conflicts: Vec<PathBuf>,
    /// Templates that failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl TemplateSummary {
    /// Total number of templates seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rendered.len()
            + self.unchanged.len()
            + self.merged.len()
            + self.conflicts.len()
            + self.failed.len()
    }
}

/// Renders and links the templates of one backup root.
pub struct TemplateEngine<'a> {
    root: &'a Path,
    platform: &'a Platform,
    history: &'a RenderHistory,
    ops: &'a dyn FileSystemOps,
    log: &'a dyn Log,
    force_render: bool,
}

impl fmt::Debug for TemplateEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("root", &self.root)
            .field("ops", &self.ops)
            .field("force_render", &self.force_render)
            .finish_non_exhaustive()
    }
}

impl<'a> TemplateEngine<'a> {
    /// Create an engine. Mutations go through `ops`, so a dry-run back-end
    /// yields a full report with no writes.
    #[must_use]
    pub fn new(
        root: &'a Path,
        platform: &'a Platform,
        history: &'a RenderHistory,
        ops: &'a dyn FileSystemOps,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            root,
            platform,
            history,
            ops,
            log,
            force_render: false,
        }
    }

    /// Re-render even when the source hash is unchanged.
    #[must_use]
    pub const fn force_render(mut self, force: bool) -> Self {
        self.force_render = force;
        self
    }

    fn key(&self, source: &Path) -> String {
        paths::relative_key(self.root, source)
            .unwrap_or_else(|| source.to_string_lossy().replace('\\', "/"))
    }

    /// Render every template under `dir`.
    ///
    /// Per-template failures land in the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be listed.
    pub fn process_dir(&self, dir: &Path) -> Result<TemplateSummary, PathError> {
        let mut summary = TemplateSummary::default();
        for source in discover(dir)? {
            match self.process(&source) {
                Ok(RenderOutcome::Unchanged) => summary.unchanged.push(source),
                Ok(RenderOutcome::FirstRender | RenderOutcome::Orphan) => {
                    summary.rendered.push(source);
                }
                Ok(RenderOutcome::Merged) => summary.merged.push(source),
                Ok(RenderOutcome::Conflict { .. }) => summary.conflicts.push(source),
                Err(e) => {
                    self.log
                        .error(&format!("template {}: {e:#}", source.display()));
                    summary.failed.push((source, format!("{e:#}")));
                }
            }
        }
        Ok(summary)
    }

    /// Render one template source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or rendered, or if an
    /// artifact cannot be written. Render-history failures are only logged.
    pub fn process(&self, source: &Path) -> Result<RenderOutcome> {
        let tp = TemplatePaths::of(source)
            .with_context(|| format!("{} is not a template", source.display()))?;
        let bytes =
            std::fs::read(source).with_context(|| format!("read {}", source.display()))?;
        let hash = hash_source(&bytes);
        let key = self.key(source);
        let latest = self.history.latest(&key);
        let rendered_exists = fs::exists(&tp.rendered);

        if !self.force_render
            && rendered_exists
            && latest.as_ref().is_some_and(|r| r.template_hash == hash)
        {
            self.log.debug(&format!("{key}: unchanged"));
            self.ensure_link(&tp)?;
            return Ok(RenderOutcome::Unchanged);
        }

        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", source.display()))?;
        let ours = paths::render(&text, self.platform)
            .with_context(|| format!("render {}", source.display()))?;

        let outcome = match &latest {
            None if !rendered_exists => {
                self.log.info(&format!("{key}: first render"));
                self.ops.write_file(&tp.rendered, &ours)?;
                RenderOutcome::FirstRender
            }
            None => {
                self.log.warn(&format!(
                    "{key}: rendered file has no render history; keeping a copy at {}",
                    tp.orphan_backup.display()
                ));
                self.ops.copy_path(&tp.rendered, &tp.orphan_backup)?;
                self.ops.write_file(&tp.rendered, &ours)?;
                RenderOutcome::Orphan
            }
            Some(record) => self.merge_into_rendered(&tp, &key, &record.pure_render, &ours)?,
        };

        if !self.ops.is_dry_run()
            && let Err(e) = self
                .history
                .record(&key, RenderRecord::new(&hash, &ours, self.platform))
        {
            self.log.warn(&format!("{key}: {e}"));
        }

        self.ensure_link(&tp)?;
        Ok(outcome)
    }

    fn merge_into_rendered(
        &self,
        tp: &TemplatePaths,
        key: &str,
        base: &str,
        ours: &str,
    ) -> Result<RenderOutcome> {
        let current = std::fs::read_to_string(&tp.rendered).ok();
        let theirs = current.as_deref().unwrap_or(base);
        let merge = merge3(base, theirs, ours);

        let outcome = if merge.has_conflicts() {
            self.log.warn(&format!(
                "{key}: {} conflicting region(s) between local edits and the template; see {}",
                merge.conflicts,
                tp.conflict.display()
            ));
            self.ops.write_file(&tp.conflict, &merge.annotated)?;
            RenderOutcome::Conflict {
                regions: merge.conflicts,
            }
        } else {
            if fs::exists(&tp.conflict) {
                self.log.info(&format!("{key}: conflict resolved"));
                self.ops.remove_all(&tp.conflict)?;
            }
            self.log.info(&format!("{key}: re-rendered"));
            RenderOutcome::Merged
        };

        if current.as_deref() != Some(merge.merged.as_str()) {
            self.ops.write_file(&tp.rendered, &merge.merged)?;
        }
        Ok(outcome)
    }

    /// Point the logical name at the rendered artifact with a relative link.
    ///
    /// A correct link is left alone. A real file in the way is kept as
    /// `<logical>.bak`; anything else there is replaced.
    fn ensure_link(&self, tp: &TemplatePaths) -> Result<()> {
        let want = tp.rendered_name();
        if fs::is_symlink(&tp.logical)
            && std::fs::read_link(&tp.logical).is_ok_and(|cur| fs::paths_equal(&cur, &want))
        {
            return Ok(());
        }
        if fs::exists(&tp.logical) {
            if fs::is_symlink(&tp.logical) {
                self.ops.remove_all(&tp.logical)?;
            } else {
                let mut aside = tp.logical.clone().into_os_string();
                aside.push(BACKUP_SUFFIX);
                self.log.warn(&format!(
                    "{} is in the way of the template link; moving it to {}",
                    tp.logical.display(),
                    PathBuf::from(&aside).display()
                ));
                self.ops.move_path(&tp.logical, Path::new(&aside))?;
            }
        }
        self.ops.symlink(&want, &tp.logical)
    }
}

/// Templates under `dir` whose source changed since their last render, or
/// that were never rendered. Read-only.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn outdated_templates(
    dir: &Path,
    root: &Path,
    history: &RenderHistory,
) -> Result<Vec<PathBuf>, PathError> {
    let mut out = Vec::new();
    for source in discover(dir)? {
        let key = paths::relative_key(root, &source).unwrap_or_default();
        let current = std::fs::read(&source).map(|b| hash_source(&b)).ok();
        let recorded = history.latest(&key).map(|r| r.template_hash);
        if current.is_none() || current != recorded {
            out.push(source);
        }
    }
    Ok(out)
}

/// Templates under `dir` whose rendered artifact differs from the last pure
/// render, i.e. that carry local edits. Read-only.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn modified_templates(
    dir: &Path,
    root: &Path,
    history: &RenderHistory,
) -> Result<Vec<PathBuf>, PathError> {
    let mut out = Vec::new();
    for source in discover(dir)? {
        let Some(tp) = TemplatePaths::of(&source) else {
            continue;
        };
        let key = paths::relative_key(root, &source).unwrap_or_default();
        let Some(record) = history.latest(&key) else {
            continue;
        };
        if let Ok(current) = std::fs::read_to_string(&tp.rendered)
            && current != record.pure_render
        {
            out.push(source);
        }
    }
    Ok(out)
}
