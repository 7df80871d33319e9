//! Symlink-aware filesystem primitives.
pub mod fs;
