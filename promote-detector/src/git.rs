//! Thin wrapper around the `git` binary.
//!
//! Only plumbing commands are used and their output is parsed by
//! [`crate::changes`]; nothing here reads `.git` directly.

use std::path::Path;
use std::process::Command;

use promote_core::types::{ChangedFile, CommitAuthor, CommitInfo};

use crate::changes::parse_name_status;
use crate::error::DetectError;

const FIELD_SEP: char = '\u{1f}';

/// Run `git <args>` in `repo_root` and return trimmed stdout.
pub fn run_git(repo_root: &Path, args: &[&str]) -> Result<String, DetectError> {
    tracing::debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()?;
    if !output.status.success() {
        return Err(DetectError::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn ref_exists(repo_root: &Path, reference: &str) -> bool {
    run_git(repo_root, &["rev-parse", "--verify", "--quiet", reference]).is_ok()
}

/// The main branch ref to compare against: local first, then `origin/`.
pub fn main_ref(repo_root: &Path, main_branch: &str) -> Option<String> {
    let remote = format!("origin/{main_branch}");
    [main_branch.to_string(), remote]
        .into_iter()
        .find(|candidate| ref_exists(repo_root, candidate))
}

/// Revision the current commit is compared against.
///
/// This is the merge base of the main branch and `HEAD`. On the main branch
/// itself the merge base is `HEAD`, so the parent commit is used instead.
pub fn base_revision(repo_root: &Path, main_branch: &str) -> Result<String, DetectError> {
    let head = run_git(repo_root, &["rev-parse", "HEAD"])?;
    let merge_base = match main_ref(repo_root, main_branch) {
        Some(main) => run_git(repo_root, &["merge-base", &main, "HEAD"]).ok(),
        None => {
            tracing::warn!("main branch '{main_branch}' not found; comparing against HEAD~1");
            None
        }
    };
    match merge_base {
        Some(base) if base != head => Ok(base),
        _ => run_git(repo_root, &["rev-parse", "HEAD~1"]),
    }
}

/// Files changed between `base` and `HEAD`.
pub fn changed_files(repo_root: &Path, base: &str) -> Result<Vec<ChangedFile>, DetectError> {
    let out = run_git(repo_root, &["diff", "--name-status", "-z", base, "HEAD"])?;
    let changes = parse_name_status(&out);
    tracing::info!("{} changed file(s) since {}", changes.len(), short(base));
    Ok(changes)
}

/// Files changed by the current commit relative to the main branch.
pub fn detect_changes(repo_root: &Path, main_branch: &str) -> Result<Vec<ChangedFile>, DetectError> {
    let base = base_revision(repo_root, main_branch)?;
    changed_files(repo_root, &base)
}

/// Author, hashes and message of `HEAD`.
pub fn commit_info(repo_root: &Path) -> Result<CommitInfo, DetectError> {
    let out = run_git(
        repo_root,
        &["log", "-1", "--format=%an%x1f%ae%x1f%H%x1f%h%x1f%B", "HEAD"],
    )?;
    parse_commit_info(&out)
}

/// Parse the unit-separated `git log` format used by [`commit_info`].
pub fn parse_commit_info(raw: &str) -> Result<CommitInfo, DetectError> {
    let fields: Vec<&str> = raw.splitn(5, FIELD_SEP).collect();
    let [name, email, sha, short_sha, message] = fields[..] else {
        return Err(DetectError::MalformedCommit(raw.to_string()));
    };
    if sha.trim().is_empty() {
        return Err(DetectError::MalformedCommit(raw.to_string()));
    }
    Ok(CommitInfo {
        author: CommitAuthor {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        },
        sha: sha.trim().to_string(),
        short_sha: short_sha.trim().to_string(),
        message: message.trim().to_string(),
    })
}

fn short(rev: &str) -> &str {
    rev.get(..8).unwrap_or(rev)
}
