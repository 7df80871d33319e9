//! Applications and their managed entries.
use std::collections::BTreeMap;

use serde::Deserialize;

use super::filters::{self, Filter};
use crate::platform::{Os, Platform};

/// A named group of entries, optionally scoped to certain machines.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Application {
    /// Display name.
    pub name: String,
    /// Free-form description shown by `list`.
    #[serde(default)]
    pub description: Option<String>,
    /// The application applies when any of these match (or none are given).
    #[serde(default)]
    pub include: Vec<Filter>,
    /// The application is skipped when any of these match.
    #[serde(default)]
    pub exclude: Vec<Filter>,
    /// Package that provides the application. Listed, never installed.
    #[serde(default)]
    pub package: Option<Package>,
    /// Managed entries, processed in order.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Application {
    /// Whether this application applies to `platform`.
    #[must_use]
    pub fn in_scope(&self, platform: &Platform) -> bool {
        filters::in_scope(&self.include, &self.exclude, platform)
    }
}

/// Package descriptor: a default name plus per-manager overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
    /// Package name used when no manager-specific name is given.
    pub name: String,
    /// Manager → package name (`pacman = "neovim"`, `brew = "nvim"`).
    #[serde(default)]
    pub managers: BTreeMap<String, String>,
}

/// What kind of unit an entry manages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Files kept in the backup root and linked into place.
    #[default]
    Config,
    /// A repository cloned into place. Handled outside this tool.
    Git,
}

/// One managed unit.
///
/// With no `files` the whole backup directory is the unit (folder mode);
/// otherwise only the named files are managed, each on its own (file mode).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    /// Display name, unique within its application.
    pub name: String,
    /// Entry kind.
    #[serde(default)]
    pub kind: EntryKind,
    /// Backup path, relative to the backup root unless absolute.
    #[serde(default)]
    pub backup: String,
    /// OS key → live location. Keys are `linux`, `macos`, `windows`
    /// (`darwin`/`osx` accepted).
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
    /// Individually managed file names (file mode) or empty (folder mode).
    #[serde(default)]
    pub files: Vec<String>,
    /// Whether mutations need elevated privileges.
    #[serde(default)]
    pub sudo: bool,
    /// Repository URL for `git` entries.
    #[serde(default)]
    pub url: Option<String>,
}

impl Entry {
    /// Folder mode: the backup directory as a whole is linked.
    #[must_use]
    pub fn is_folder_mode(&self) -> bool {
        self.files.is_empty()
    }

    /// The raw (unexpanded) target configured for `os`.
    #[must_use]
    pub fn target_for(&self, os: Os) -> Option<&str> {
        self.targets
            .iter()
            .find(|(key, _)| Os::from_key(key) == Some(os))
            .map(|(_, path)| path.as_str())
    }
}
