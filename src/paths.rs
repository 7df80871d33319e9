//! Expansion of configured paths.
//!
//! A configured path goes through three passes, in order: embedded
//! `{{ … }}` expressions are rendered against the platform context,
//! environment variables are substituted, and a leading `~` becomes the home
//! directory. Everything here is pure: the environment comes from the
//! [`Platform`] snapshot, never from the live process.
use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};
use minijinja::{Environment, Value, context};

use crate::platform::Platform;

/// Build the value templates and path expressions are rendered against.
#[must_use]
pub fn template_context(platform: &Platform) -> Value {
    context! {
        os => platform.os,
        distro => &platform.distro,
        hostname => &platform.hostname,
        user => &platform.user,
        elevated => platform.elevated,
        env => &platform.env,
    }
}

/// Template environment shared by path expansion and template rendering.
///
/// Trailing newlines are kept so rendered files match their sources
/// byte-for-byte outside of the substituted expressions.
#[must_use]
pub fn template_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env
}

/// Render `source` against the platform context.
///
/// # Errors
///
/// Returns an error if the template has a syntax error or fails to evaluate.
pub fn render(source: &str, platform: &Platform) -> Result<String, minijinja::Error> {
    template_environment().render_str(source, template_context(platform))
}

/// Expand a configured path.
///
/// # Errors
///
/// Returns an error if an embedded `{{ … }}` expression fails to render.
pub fn expand(raw: &str, platform: &Platform) -> Result<PathBuf> {
    let rendered = if raw.contains("{{") || raw.contains("{%") {
        render(raw, platform).with_context(|| format!("render path expression '{raw}'"))?
    } else {
        raw.to_string()
    };
    let substituted = expand_env(&rendered, platform);
    Ok(expand_tilde(&substituted, platform))
}

/// Substitute `$VAR` and `${VAR}` (and `%VAR%` on Windows hosts) from the
/// platform's environment snapshot. Unknown variables are left verbatim.
#[must_use]
pub fn expand_env(input: &str, platform: &Platform) -> String {
    let unix = expand_dollar(input, platform);
    if platform.is_windows() {
        expand_percent(&unix, platform)
    } else {
        unix
    }
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn expand_dollar(input: &str, platform: &Platform) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some((before, tail)) = rest.split_once('$') {
        out.push_str(before);
        if let Some(braced) = tail.strip_prefix('{')
            && let Some((name, after)) = braced.split_once('}')
        {
            match platform.env.get(name) {
                Some(value) if !name.is_empty() => out.push_str(value),
                _ => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = after;
            continue;
        }
        let len = tail.find(|c: char| !is_var_char(c)).unwrap_or(tail.len());
        let (name, after) = tail.split_at(len);
        match platform.env.get(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn expand_percent(input: &str, platform: &Platform) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some((before, tail)) = rest.split_once('%') {
        out.push_str(before);
        let Some(end) = tail.find('%') else {
            out.push('%');
            out.push_str(tail);
            return out;
        };
        let (name, closing) = tail.split_at(end);
        let value = platform
            .env
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v);
        match value {
            Some(v) if !name.is_empty() => {
                out.push_str(v);
                rest = closing.strip_prefix('%').unwrap_or(closing);
            }
            _ => {
                // keep the first '%' and retry from the second one
                out.push('%');
                out.push_str(name);
                rest = closing;
            }
        }
    }
    out.push_str(rest);
    out
}

fn expand_tilde(input: &str, platform: &Platform) -> PathBuf {
    let Some(home) = platform.home() else {
        return PathBuf::from(input);
    };
    if input == "~" {
        return home;
    }
    input
        .strip_prefix("~/")
        .or_else(|| input.strip_prefix("~\\"))
        .map_or_else(|| PathBuf::from(input), |rest| home.join(rest))
}

/// Resolve an entry's backup path: relative paths live under `root`,
/// absolute ones are taken as-is.
///
/// # Errors
///
/// Returns an error if the configured path fails to expand.
pub fn resolve_backup(root: &Path, backup: &str, platform: &Platform) -> Result<PathBuf> {
    let expanded = expand(backup, platform)?;
    Ok(if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    })
}

/// Key of `path` relative to `root`, `/`-separated on every OS.
///
/// `None` when `path` is not under `root`.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
