//! Command: report outdated and locally modified templates.
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, TemplateQuery, TemplatesOpts};
use crate::history::RenderHistory;
use crate::logging::Log;
use crate::templates;

/// Result of the template queries over one subtree.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TemplateReport {
    /// Sources changed since their last render, or never rendered.
    pub outdated: Vec<PathBuf>,
    /// Rendered files that differ from their last pure render.
    pub modified: Vec<PathBuf>,
}

/// Run `query` over `dir`. Read-only.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn query(
    query: TemplateQuery,
    dir: &Path,
    root: &Path,
    history: &RenderHistory,
) -> Result<TemplateReport> {
    let mut report = TemplateReport::default();
    if matches!(query, TemplateQuery::All | TemplateQuery::Outdated) {
        report.outdated = templates::outdated_templates(dir, root, history)?;
    }
    if matches!(query, TemplateQuery::All | TemplateQuery::Modified) {
        report.modified = templates::modified_templates(dir, root, history)?;
    }
    Ok(report)
}

fn print_group(title: &str, paths: &[PathBuf], root: &Path) {
    if paths.is_empty() {
        return;
    }
    println!("{title}:");
    for path in paths {
        let shown = path.strip_prefix(root).unwrap_or(path);
        println!("  {}", shown.display());
    }
}

/// Run the templates command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the subtree
/// cannot be listed.
pub fn run(global: &GlobalOpts, opts: &TemplatesOpts, log: &dyn Log) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let root = setup.config.root;
    let dir = opts
        .path
        .as_ref()
        .map_or_else(|| root.clone(), |p| root.join(p));
    let history = RenderHistory::open_read_only(&root, log);

    let report = query(opts.query, &dir, &root, &history)?;
    if report.outdated.is_empty() && report.modified.is_empty() {
        log.info("all templates are up to date");
        return Ok(());
    }
    print_group("outdated", &report.outdated, &root);
    print_group("modified", &report.modified, &root);
    Ok(())
}
