//! Backup-root reconciliation engine for dotfiles.
//!
//! A version-controlled *backup root* holds the authoritative copy of every
//! managed configuration. Each configured entry maps a path inside the root
//! to a live, OS-specific *target*. A restore pass makes every target a
//! symlink into the root, adopting or merging whatever live content is in
//! the way; a backup pass copies live content back into the root. Templates
//! inside the root are rendered per machine and re-merged with local edits.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse and validate `dotlink.toml`
//! - **[`paths`]**, **[`resources::fs`]**, **[`operations`]**: path expansion,
//!   symlink-aware primitives, and the direct/elevated/dry-run back-ends
//! - **[`merge`]**, **[`templates`]**, **[`history`]**: tree merge, template
//!   rendering with three-way merge, and the render history behind it
//! - **[`tasks`]**: the per-entry reconciliation engine
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod history;
pub mod logging;
pub mod merge;
pub mod operations;
pub mod paths;
pub mod platform;
pub mod resources;
pub mod tasks;
pub mod templates;
