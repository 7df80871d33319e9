//! Platform context: the facts about the current machine that select targets,
//! filter applications, and feed template rendering.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux and other Unix-likes.
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl Os {
    /// Parse an OS key as written in the config's `targets` table.
    ///
    /// `darwin` and `osx` are accepted as aliases for macOS.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "macos" | "darwin" | "osx" => Some(Self::Macos),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Canonical lowercase key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Platform information for the current system.
///
/// Built once per run and read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Distro identifier (`ID=` from os-release); empty when unknown.
    pub distro: String,
    /// Short host name.
    pub hostname: String,
    /// Login name of the invoking user.
    pub user: String,
    /// Whether the process already runs with elevated privileges.
    pub elevated: bool,
    /// Snapshot of the environment used for path expansion and templates.
    pub env: BTreeMap<String, String>,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let env: BTreeMap<String, String> = std::env::vars().collect();
        let os = detect_os();
        Self {
            os,
            distro: detect_distro(os),
            hostname: detect_hostname(&env),
            user: detect_user(&env),
            elevated: detect_elevated(os, &env),
            env,
        }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, distro: &str, hostname: &str, user: &str) -> Self {
        Self {
            os,
            distro: distro.to_string(),
            hostname: hostname.to_string(),
            user: user.to_string(),
            elevated: false,
            env: BTreeMap::new(),
        }
    }

    /// Replace the environment snapshot.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Whether this is a Windows host.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Home directory taken from the environment snapshot.
    #[must_use]
    pub fn home(&self) -> Option<PathBuf> {
        let key = if self.is_windows() { "USERPROFILE" } else { "HOME" };
        self.env
            .get(key)
            .or_else(|| self.env.get("HOME"))
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }
}

fn detect_os() -> Os {
    if cfg!(target_os = "windows") {
        Os::Windows
    } else if cfg!(target_os = "macos") {
        Os::Macos
    } else {
        // Other Unix-likes behave like Linux for our purposes
        Os::Linux
    }
}

fn detect_distro(os: Os) -> String {
    if os != Os::Linux {
        return String::new();
    }
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|content| parse_os_release_id(&content))
        .unwrap_or_default()
}

/// Extract the `ID=` value from os-release content.
fn parse_os_release_id(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.strip_prefix("ID=")
            .map(|v| v.trim().trim_matches('"').to_string())
    })
}

fn detect_hostname(env: &BTreeMap<String, String>) -> String {
    if let Some(name) = env
        .get("HOSTNAME")
        .or_else(|| env.get("COMPUTERNAME"))
        .filter(|n| !n.is_empty())
    {
        return name.clone();
    }
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            crate::exec::run("hostname", &[])
                .ok()
                .map(|r| r.stdout.trim().to_string())
        })
        .unwrap_or_default()
}

fn detect_user(env: &BTreeMap<String, String>) -> String {
    env.get("USER")
        .or_else(|| env.get("USERNAME"))
        .or_else(|| env.get("LOGNAME"))
        .cloned()
        .unwrap_or_default()
}

fn detect_elevated(os: Os, env: &BTreeMap<String, String>) -> bool {
    if os == Os::Windows {
        return false;
    }
    if env.get("USER").is_some_and(|u| u == "root") {
        return true;
    }
    crate::exec::run("id", &["-u"]).is_ok_and(|r| r.stdout.trim() == "0")
}
