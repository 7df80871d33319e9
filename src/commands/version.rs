//! Command: print version information.

/// Version string, preferring the one stamped in by the build script.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTLINK_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotlink version to stdout.
pub fn run() {
    println!("dotlink {}", version());
}
