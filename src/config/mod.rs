//! Configuration: the `dotlink.toml` file at the top of the backup root.
//!
//! ```toml
//! version = 1
//!
//! [[applications]]
//! name = "neovim"
//! include = [{ os = ["linux", "macos"] }]
//!
//! [[applications.entries]]
//! name = "config"
//! backup = "nvim"
//! targets = { linux = "~/.config/nvim", macos = "~/.config/nvim" }
//! ```
pub mod applications;
pub mod filters;
pub mod toml_loader;
pub mod validation;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::paths;
use crate::platform::Platform;

pub use applications::{Application, Entry, EntryKind, Package};

/// File name of the configuration inside the backup root.
pub const CONFIG_FILE: &str = "dotlink.toml";

/// Highest config schema version this build reads.
pub const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    version: u32,
    #[serde(default)]
    backup_root: Option<String>,
    #[serde(default)]
    applications: Vec<Application>,
}

/// Loaded configuration. Immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backup root: the config file's directory, or `backup_root` from the
    /// file resolved against it.
    pub root: PathBuf,
    /// Schema version declared by the file.
    pub version: u32,
    /// Applications in file order.
    pub applications: Vec<Application>,
}

impl Config {
    /// Load `dotlink.toml` from `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, declares an
    /// unsupported version, or names a `backup_root` that fails to expand.
    pub fn load(dir: &Path, platform: &Platform) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let raw: RawConfig = toml_loader::load_config(&path)?;
        Self::from_raw(raw, dir, platform)
            .with_context(|| format!("loading {}", path.display()))
    }

    /// Parse configuration text as if it were read from `dir`.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus the I/O.
    pub fn parse(text: &str, dir: &Path, platform: &Platform) -> Result<Self> {
        let raw: RawConfig = toml_loader::parse_config(text, &dir.join(CONFIG_FILE))?;
        Self::from_raw(raw, dir, platform)
    }

    fn from_raw(raw: RawConfig, dir: &Path, platform: &Platform) -> Result<Self> {
        if raw.version == 0 || raw.version > SUPPORTED_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: raw.version,
                supported: SUPPORTED_VERSION,
            }
            .into());
        }
        let root = match raw.backup_root.as_deref() {
            Some(custom) => paths::resolve_backup(dir, custom, platform)
                .context("resolving backup_root")?,
            None => dir.to_path_buf(),
        };
        Ok(Self {
            root,
            version: raw.version,
            applications: raw.applications,
        })
    }

    /// Applications that apply to `platform`, in file order.
    pub fn in_scope<'a>(&'a self, platform: &'a Platform) -> impl Iterator<Item = &'a Application> {
        self.applications
            .iter()
            .filter(move |app| app.in_scope(platform))
    }
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::platform::Os;
    use test_helpers::write_temp_config;

    fn platform() -> Platform {
        Platform::new(Os::Linux, "arch", "desk", "alice").with_env([("HOME", "/home/alice")])
    }

    #[test]
    fn loads_from_directory() {
        let (dir, _) = write_temp_config(
            r#"
version = 1

[[applications]]
name = "nvim"

[[applications.entries]]
name = "config"
backup = "nvim"
targets = { linux = "~/.config/nvim" }
"#,
        );
        let config = Config::load(dir.path(), &platform()).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.applications.len(), 1);
        assert_eq!(config.applications[0].entries[0].backup, "nvim");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path(), &platform()).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE), "{err:#}");
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = Config::parse("version = 2", Path::new("/b"), &platform()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn backup_root_override_is_expanded() {
        let config = Config::parse(
            "version = 1\nbackup_root = \"~/dotfiles\"\n",
            Path::new("/b"),
            &platform(),
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/home/alice/dotfiles"));

        let relative =
            Config::parse("version = 1\nbackup_root = \"home\"\n", Path::new("/b"), &platform())
                .unwrap();
        assert_eq!(relative.root, PathBuf::from("/b/home"));
    }

    #[test]
    fn in_scope_filters_applications() {
        let config = Config::parse(
            r#"
version = 1
[[applications]]
name = "everywhere"
[[applications]]
name = "mac-only"
include = [{ os = ["macos"] }]
"#,
            Path::new("/b"),
            &platform(),
        )
        .unwrap();
        let p = platform();
        let names: Vec<&str> = config.in_scope(&p).map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["everywhere"]);
    }
}
