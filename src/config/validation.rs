//! Non-fatal configuration checks.
//!
//! Loading only fails on malformed files. Suspicious but usable settings are
//! reported as [`ValidationWarning`]s and logged before a pass starts.
use std::collections::HashSet;
use std::path::{Component, Path};

use super::applications::{Application, EntryKind};
use crate::platform::{Os, Platform};

/// A validation warning detected during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The application the warning belongs to.
    pub source: String,
    /// The specific entry or field that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for configuration validators.
pub trait ConfigValidator {
    /// Validate the configuration and return any warnings found.
    fn validate(&self, root: &Path, platform: &Platform) -> Vec<ValidationWarning>;
}

/// Validator for applications and their entries.
#[derive(Debug)]
pub struct ApplicationValidator<'a> {
    applications: &'a [Application],
}

impl<'a> ApplicationValidator<'a> {
    /// Validate `applications`.
    #[must_use]
    pub const fn new(applications: &'a [Application]) -> Self {
        Self { applications }
    }
}

fn escapes_root(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

impl ConfigValidator for ApplicationValidator<'_> {
    fn validate(&self, _root: &Path, _platform: &Platform) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut app_names = HashSet::new();

        for app in self.applications {
            if !app_names.insert(app.name.as_str()) {
                warnings.push(ValidationWarning::new(
                    &app.name,
                    &app.name,
                    "duplicate application name",
                ));
            }

            let mut entry_names = HashSet::new();
            for entry in &app.entries {
                if !entry_names.insert(entry.name.as_str()) {
                    warnings.push(ValidationWarning::new(
                        &app.name,
                        &entry.name,
                        "duplicate entry name",
                    ));
                }

                for key in entry.targets.keys() {
                    if Os::from_key(key).is_none() {
                        warnings.push(ValidationWarning::new(
                            &app.name,
                            &entry.name,
                            format!("unknown target OS '{key}' (expected linux, macos or windows)"),
                        ));
                    }
                }

                match entry.kind {
                    EntryKind::Config => {
                        if entry.backup.trim().is_empty() {
                            warnings.push(ValidationWarning::new(
                                &app.name,
                                &entry.name,
                                "config entry has no backup path",
                            ));
                        } else if escapes_root(&entry.backup) {
                            warnings.push(ValidationWarning::new(
                                &app.name,
                                &entry.name,
                                "backup path should not contain '..'",
                            ));
                        }
                    }
                    EntryKind::Git => {
                        if entry.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
                            warnings.push(ValidationWarning::new(
                                &app.name,
                                &entry.name,
                                "git entry has no url",
                            ));
                        }
                    }
                }

                for file in &entry.files {
                    if file.trim().is_empty() || Path::new(file).is_absolute() || escapes_root(file)
                    {
                        warnings.push(ValidationWarning::new(
                            &app.name,
                            &entry.name,
                            format!("file '{file}' must be a plain relative name"),
                        ));
                    }
                }
            }
        }

        warnings
    }
}

/// Run every validator over `applications`.
#[must_use]
pub fn validate_all(
    root: &Path,
    platform: &Platform,
    applications: &[Application],
) -> Vec<ValidationWarning> {
    ApplicationValidator::new(applications).validate(root, platform)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Doc {
        applications: Vec<Application>,
    }

    fn warnings_for(toml_text: &str) -> Vec<ValidationWarning> {
        let doc: Doc = toml::from_str(toml_text).unwrap();
        let p = Platform::new(Os::Linux, "arch", "desk", "alice");
        validate_all(Path::new("/b"), &p, &doc.applications)
    }

    #[test]
    fn clean_config_has_no_warnings() {
        let w = warnings_for(
            r#"
[[applications]]
name = "nvim"
[[applications.entries]]
name = "config"
backup = "nvim"
targets = { linux = "~/.config/nvim" }
"#,
        );
        assert!(w.is_empty(), "{w:?}");
    }

    #[test]
    fn reports_duplicates_and_bad_fields() {
        let w = warnings_for(
            r#"
[[applications]]
name = "a"
[[applications.entries]]
name = "e"
backup = "../outside"
targets = { plan9 = "/x" }
files = ["/etc/passwd"]
[[applications.entries]]
name = "e"
[[applications.entries]]
name = "repo"
kind = "git"

[[applications]]
name = "a"
"#,
        );
        let messages: Vec<&str> = w.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.contains(&"backup path should not contain '..'"));
        assert!(messages.iter().any(|m| m.starts_with("unknown target OS 'plan9'")));
        assert!(messages.iter().any(|m| m.contains("/etc/passwd")));
        assert!(messages.contains(&"duplicate entry name"));
        assert!(messages.contains(&"config entry has no backup path"));
        assert!(messages.contains(&"git entry has no url"));
        assert!(messages.contains(&"duplicate application name"));
    }
}
