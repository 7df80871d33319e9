//! Platform filters that scope applications to particular machines.
use serde::Deserialize;

use crate::platform::{Os, Platform};

/// Match mode for combining several filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every filter must match (AND logic).
    All,
    /// At least one filter must match (OR logic).
    Any,
}

/// One include/exclude filter.
///
/// Each field lists accepted values; an empty list accepts anything. A
/// filter matches when every non-empty field contains the platform's value,
/// compared case-insensitively.
///
/// ```toml
/// include = [{ os = ["linux"], distro = ["arch", "manjaro"] }]
/// exclude = [{ hostname = ["build-box"] }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    /// Accepted OS keys (`linux`, `macos`, `windows`).
    #[serde(default)]
    pub os: Vec<String>,
    /// Accepted distro ids.
    #[serde(default)]
    pub distro: Vec<String>,
    /// Accepted host names.
    #[serde(default)]
    pub hostname: Vec<String>,
    /// Accepted user names.
    #[serde(default)]
    pub user: Vec<String>,
}

fn field_matches(accepted: &[String], actual: &str) -> bool {
    accepted.is_empty() || accepted.iter().any(|v| v.eq_ignore_ascii_case(actual))
}

impl Filter {
    /// Whether this filter accepts `platform`.
    #[must_use]
    pub fn matches(&self, platform: &Platform) -> bool {
        let os_ok = self.os.is_empty()
            || self
                .os
                .iter()
                .any(|v| Os::from_key(v).is_some_and(|os| os == platform.os));
        os_ok
            && field_matches(&self.distro, &platform.distro)
            && field_matches(&self.hostname, &platform.hostname)
            && field_matches(&self.user, &platform.user)
    }

    /// Whether every field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.os.is_empty()
            && self.distro.is_empty()
            && self.hostname.is_empty()
            && self.user.is_empty()
    }
}

/// Combine `filters` against `platform` with `mode`.
///
/// # Examples
///
/// ```
/// use dotlink_cli::config::filters::{Filter, MatchMode, matches};
/// use dotlink_cli::platform::{Os, Platform};
///
/// let p = Platform::new(Os::Linux, "arch", "desk", "alice");
/// let arch = Filter { distro: vec!["arch".into()], ..Filter::default() };
/// let mac = Filter { os: vec!["macos".into()], ..Filter::default() };
///
/// assert!(matches(&[arch.clone(), mac.clone()], &p, MatchMode::Any));
/// assert!(!matches(&[arch, mac], &p, MatchMode::All));
/// ```
#[must_use]
pub fn matches(filters: &[Filter], platform: &Platform, mode: MatchMode) -> bool {
    match mode {
        MatchMode::All => filters.iter().all(|f| f.matches(platform)),
        MatchMode::Any => filters.iter().any(|f| f.matches(platform)),
    }
}

/// Whether an application with these filters applies to `platform`: no
/// include filters or at least one matching, and no exclude filter matching.
#[must_use]
pub fn in_scope(include: &[Filter], exclude: &[Filter], platform: &Platform) -> bool {
    (include.is_empty() || matches(include, platform, MatchMode::Any))
        && !matches(exclude, platform, MatchMode::Any)
}
