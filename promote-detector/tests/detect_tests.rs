//! Change detection against throwaway git repositories.
//!
//! Every test builds its own repository in a `TempDir`. Tests return early
//! when no `git` binary is available.

use std::fs;
use std::path::Path;
use std::process::Command;

use promote_core::ChangeKind;
use promote_detector::{
    base_revision, commit_info, config_changes, detect_changes, ensure_not_mixed,
    package_changes, ConfigKind, DetectError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Doe, John (ACME)", "-c", "user.email=j.doe@x.com"])
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?}: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write fixture");
}

fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// A repository with one commit on `main`.
fn repo() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["checkout", "-q", "-B", "main"]);
    write(dir.path(), "README.md", "templates\n");
    commit_all(dir.path(), "initial");
    dir
}

// ---------------------------------------------------------------------------
// Base revision
// ---------------------------------------------------------------------------

#[test]
fn feature_branch_compares_against_merge_base() {
    if !git_available() {
        return;
    }
    let dir = repo();
    let main_head = git(dir.path(), &["rev-parse", "HEAD"]);
    git(dir.path(), &["checkout", "-q", "-b", "feature"]);
    write(dir.path(), "Foo-Bar/Foo-Bar.deployment.zip", "zip");
    commit_all(dir.path(), "package");
    write(dir.path(), "Foo-Bar/release.foo-bar.yaml", "release: true\n");
    commit_all(dir.path(), "config");

    assert_eq!(base_revision(dir.path(), "main").expect("base"), main_head);

    let changes = detect_changes(dir.path(), "main").expect("changes");
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
    assert_eq!(package_changes(&changes).len(), 1);
    let configs = config_changes(&changes);
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].kind, ConfigKind::Release);
}

#[test]
fn main_branch_compares_against_parent() {
    if !git_available() {
        return;
    }
    let dir = repo();
    let parent = git(dir.path(), &["rev-parse", "HEAD"]);
    write(dir.path(), "README.md", "templates, updated\n");
    commit_all(dir.path(), "edit");

    assert_eq!(base_revision(dir.path(), "main").expect("base"), parent);
    let changes = detect_changes(dir.path(), "main").expect("changes");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Modified);
}

#[test]
fn non_ascii_package_paths_come_back_verbatim() {
    if !git_available() {
        return;
    }
    let dir = repo();
    write(dir.path(), "\u{c4}rger-Proj/\u{c4}rger-Proj.deployment.zip", "zip");
    commit_all(dir.path(), "umlaut");

    let changes = detect_changes(dir.path(), "main").expect("changes");
    let packages = package_changes(&changes);
    assert_eq!(packages.len(), 1);
    assert_eq!(
        packages[0].path,
        Path::new("\u{c4}rger-Proj/\u{c4}rger-Proj.deployment.zip")
    );
    assert!(dir.path().join(&packages[0].path).is_file());
}

#[test]
fn unknown_main_branch_falls_back_to_parent() {
    if !git_available() {
        return;
    }
    let dir = repo();
    let parent = git(dir.path(), &["rev-parse", "HEAD"]);
    write(dir.path(), "other.txt", "x");
    commit_all(dir.path(), "second");
    assert_eq!(base_revision(dir.path(), "trunk").expect("base"), parent);
}

#[test]
fn single_commit_repository_has_no_base() {
    if !git_available() {
        return;
    }
    let dir = repo();
    let err = base_revision(dir.path(), "main").unwrap_err();
    assert!(matches!(err, DetectError::Git { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// Commit metadata and mixed commits
// ---------------------------------------------------------------------------

#[test]
fn commit_info_reads_head() {
    if !git_available() {
        return;
    }
    let dir = repo();
    let info = commit_info(dir.path()).expect("commit info");
    assert_eq!(info.author.name, "Doe, John (ACME)");
    assert_eq!(info.author.email, "j.doe@x.com");
    assert_eq!(info.message, "initial");
    assert!(info.sha.starts_with(&info.short_sha));
}

#[test]
fn mixed_commit_is_rejected() {
    if !git_available() {
        return;
    }
    let dir = repo();
    write(dir.path(), "A/content.a.yaml", "a: 1\n");
    write(dir.path(), "B/release.b.yaml", "b: 1\n");
    commit_all(dir.path(), "both");

    let changes = detect_changes(dir.path(), "main").expect("changes");
    assert!(matches!(
        ensure_not_mixed(&changes),
        Err(DetectError::MixedCommit)
    ));
}
