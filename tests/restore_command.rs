#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the restore pass.

mod common;

use std::time::Duration;

use common::{TestContextBuilder, folder_entry_config};
use dotlink_cli::error::MergeBlocked;
use dotlink_cli::logging::EntryStatus;
use dotlink_cli::merge;
use dotlink_cli::resources::fs;
use dotlink_cli::tasks::{self, RunOptions};

// ---------------------------------------------------------------------------
// Adopt, merge, block
// ---------------------------------------------------------------------------

#[test]
fn live_directory_is_adopted_into_missing_backup() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("nvim", ".config/nvim"))
        .with_home_file(".config/nvim/init.lua", "vim.o.number = true\n")
        .build();
    let (ctx, log) = t.context(RunOptions::default());

    tasks::restore(&ctx).unwrap();

    assert_eq!(t.read_backup("nvim/init.lua"), "vim.o.number = true\n");
    let live = t.home.join(".config/nvim");
    assert!(fs::is_symlink(&live));
    assert_eq!(std::fs::read_link(&live).unwrap(), t.root.join("nvim"));
    assert_eq!(log.failure_count(), 0);
}

#[test]
fn conflicting_file_is_kept_under_a_dated_name() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/config.json", "{\"from\":\"backup\"}")
        .with_home_file(".config/app/config.json", "{\"from\":\"live\"}")
        .with_home_file(".config/app/extra/notes.txt", "only live")
        .build();
    let (ctx, _log) = t.context(RunOptions::default());

    tasks::restore(&ctx).unwrap();

    assert_eq!(t.read_backup("app/config.json"), "{\"from\":\"backup\"}");
    let stamp = merge::today().format("%Y%m%d");
    assert_eq!(
        t.read_backup(&format!("app/config_target_{stamp}.json")),
        "{\"from\":\"live\"}"
    );
    assert_eq!(t.read_backup("app/extra/notes.txt"), "only live");
    assert!(fs::is_symlink(&t.home.join(".config/app")));
    assert_eq!(t.read_home(".config/app/extra/notes.txt"), "only live");
}

#[test]
fn strict_mode_refuses_and_names_the_file_count() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/a", "backup")
        .with_home_file(".config/app/a", "live a")
        .with_home_file(".config/app/b", "live b")
        .with_home_file(".config/app/c/d", "live d")
        .build();
    let before = t.tree_snapshot();
    let (ctx, log) = t.context(RunOptions {
        no_merge: true,
        ..RunOptions::default()
    });

    let err = tasks::restore(&ctx).unwrap_err();

    assert!(err.to_string().contains("failed"), "{err}");
    let outcome = &log.entries()[0];
    assert_eq!(outcome.status, EntryStatus::Failed);
    let message = outcome.message.as_deref().unwrap();
    assert!(message.contains("3 file(s)"), "{message}");
    assert!(message.contains("--force"), "{message}");
    assert!(!fs::is_symlink(&t.home.join(".config/app")));
    assert_eq!(t.tree_snapshot(), before);
}

#[test]
fn force_overrides_strict_mode() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/a", "backup")
        .with_home_file(".config/app/b", "live b")
        .build();
    let (ctx, _log) = t.context(RunOptions {
        no_merge: true,
        force: true,
        ..RunOptions::default()
    });

    tasks::restore(&ctx).unwrap();

    assert_eq!(t.read_backup("app/b"), "live b");
    assert!(fs::is_symlink(&t.home.join(".config/app")));
}

#[test]
fn force_delete_discards_the_target() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/a", "backup")
        .with_home_file(".config/app/a", "live")
        .build();
    let (ctx, _log) = t.context(RunOptions {
        force_delete: true,
        ..RunOptions::default()
    });

    tasks::restore(&ctx).unwrap();

    assert_eq!(t.read_home(".config/app/a"), "backup");
    let names: Vec<_> = std::fs::read_dir(t.root.join("app"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn merge_blocked_is_a_typed_error() {
    let blocked = MergeBlocked {
        entry: "app/config".to_string(),
        path: "/home/a/.config/app".into(),
        files: 4,
    };
    let text = blocked.to_string();
    assert!(text.contains("4 file(s)") && text.contains("/home/a/.config/app"));
}

// ---------------------------------------------------------------------------
// Idempotence and dry-run purity
// ---------------------------------------------------------------------------

#[test]
fn second_pass_mutates_nothing() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("nvim", ".config/nvim"))
        .with_backup_file("nvim/init.lua", "x")
        .with_home_file(".config/nvim/local.lua", "y")
        .build();
    let (ctx, _log) = t.context(RunOptions::default());
    tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    let link = t.home.join(".config/nvim");
    let link_mtime = std::fs::symlink_metadata(&link).unwrap().modified().unwrap();
    let before = t.tree_snapshot();
    std::thread::sleep(Duration::from_millis(20));

    let (ctx, log) = t.context(RunOptions::default());
    tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    assert_eq!(
        std::fs::symlink_metadata(&link).unwrap().modified().unwrap(),
        link_mtime
    );
    assert_eq!(t.tree_snapshot(), before);
    assert_eq!(log.entries()[0].status, EntryStatus::Ok);
}

#[test]
fn dry_run_changes_nothing_in_any_scenario() {
    let t = TestContextBuilder::new()
        .with_config(
            r#"version = 1

[[applications]]
name = "adopt"
[[applications.entries]]
name = "e"
backup = "adopt"
targets = { linux = "~/adopt" }

[[applications]]
name = "merge"
[[applications.entries]]
name = "e"
backup = "merge"
targets = { linux = "~/merge" }

[[applications]]
name = "link"
[[applications.entries]]
name = "e"
backup = "link"
targets = { linux = "~/.config/link" }

[[applications]]
name = "files"
[[applications.entries]]
name = "e"
backup = "files"
files = [".a", ".b"]
targets = { linux = "~" }
"#,
        )
        .with_home_file("adopt/f", "adopt me")
        .with_backup_file("merge/same", "backup")
        .with_home_file("merge/same", "live")
        .with_home_file("merge/new", "new")
        .with_backup_file("link/app.conf.tmpl", "host={{ hostname }}\n")
        .with_backup_file("files/.a", "a")
        .with_home_file(".b", "b")
        .build();
    let before = t.tree_snapshot();
    let (ctx, log) = t.context(RunOptions {
        dry_run: true,
        ..RunOptions::default()
    });

    let report = tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    assert_eq!(t.tree_snapshot(), before);
    assert_eq!(report.dry_run, 4);
    assert_eq!(log.failure_count(), 0);
}

#[test]
fn dry_run_leaves_the_render_history_file_alone() {
    use std::os::unix::fs::MetadataExt as _;

    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/app.conf.tmpl", "host={{ hostname }}\n")
        .build();
    let (ctx, _log) = t.context(RunOptions::default());
    tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    let history = ctx.history.path().to_path_buf();
    let before = std::fs::metadata(&history).unwrap();
    std::thread::sleep(Duration::from_millis(20));

    // Template changed since the last render, so the pass has work to preview.
    std::fs::write(t.root.join("app/app.conf.tmpl"), "host={{ hostname }}\nx=1\n").unwrap();
    let (ctx, log) = t.context(RunOptions {
        dry_run: true,
        ..RunOptions::default()
    });
    tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    let after = std::fs::metadata(&history).unwrap();
    assert_eq!(after.ino(), before.ino());
    assert_eq!(after.modified().unwrap(), before.modified().unwrap());
    assert_eq!(log.failure_count(), 0);
}

#[test]
fn dry_run_keeps_a_corrupt_history_in_place() {
    let t = TestContextBuilder::new()
        .with_config(&folder_entry_config("app", ".config/app"))
        .with_backup_file("app/app.conf.tmpl", "host={{ hostname }}\n")
        .with_backup_file(".dotlink-history.json", "{not json")
        .build();
    let before = t.tree_snapshot();
    let (ctx, _log) = t.context(RunOptions {
        dry_run: true,
        ..RunOptions::default()
    });

    tasks::restore(&ctx).unwrap();
    ctx.history.close().unwrap();

    assert_eq!(t.tree_snapshot(), before);
    assert_eq!(t.read_backup(".dotlink-history.json"), "{not json");
}

// ---------------------------------------------------------------------------
// File mode
// ---------------------------------------------------------------------------

#[test]
fn file_mode_links_each_named_file() {
    let t = TestContextBuilder::new()
        .with_config(
            r#"version = 1

[[applications]]
name = "git"

[[applications.entries]]
name = "dotfiles"
backup = "git"
files = [".gitconfig", ".gitignore_global"]
targets = { linux = "~" }
"#,
        )
        .with_backup_file("git/.gitconfig", "[user]\n")
        .with_home_file(".gitignore_global", "*.swp\n")
        .with_home_file("unrelated", "keep")
        .build();
    let (ctx, _log) = t.context(RunOptions::default());

    tasks::restore(&ctx).unwrap();

    assert_eq!(
        std::fs::read_link(t.home.join(".gitconfig")).unwrap(),
        t.root.join("git/.gitconfig")
    );
    assert_eq!(
        std::fs::read_link(t.home.join(".gitignore_global")).unwrap(),
        t.root.join("git/.gitignore_global")
    );
    assert_eq!(t.read_backup("git/.gitignore_global"), "*.swp\n");
    assert!(!fs::is_symlink(&t.home));
    assert_eq!(t.read_home("unrelated"), "keep");
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[test]
fn one_failing_entry_does_not_stop_the_others() {
    let t = TestContextBuilder::new()
        .with_config(
            r#"version = 1

[[applications]]
name = "blocked"
[[applications.entries]]
name = "e"
backup = "blocked"
targets = { linux = "~/blocked" }

[[applications]]
name = "fine"
[[applications.entries]]
name = "e"
backup = "fine"
targets = { linux = "~/fine" }
"#,
        )
        .with_backup_file("blocked/x", "b")
        .with_home_file("blocked/x", "l")
        .with_backup_file("fine/y", "y")
        .build();
    let (ctx, log) = t.context(RunOptions {
        no_merge: true,
        ..RunOptions::default()
    });

    assert!(tasks::restore(&ctx).is_err());

    assert_eq!(log.failure_count(), 1);
    assert!(fs::is_symlink(&t.home.join("fine")));
    let statuses: Vec<EntryStatus> = log.entries().iter().map(|e| e.status).collect();
    assert_eq!(statuses, [EntryStatus::Failed, EntryStatus::Ok]);
}
