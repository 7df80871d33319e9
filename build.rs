//! Build script stamping the `dotlink` version.
use std::process::Command;

const VERSION_ENV: &str = "DOTLINK_VERSION";

/// `git describe` of the checkout, if this is one.
fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !described.is_empty()).then_some(described)
}

fn main() {
    println!("cargo:rerun-if-env-changed={VERSION_ENV}");
    println!("cargo:rerun-if-changed=.git/HEAD");

    // Release builds pass the version in; local builds use git.
    let stamped = std::env::var(VERSION_ENV).ok().or_else(describe);
    if let Some(version) = stamped {
        println!("cargo:rustc-env={VERSION_ENV}={version}");
    }
}
