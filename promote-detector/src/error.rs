//! Error types for promote-detector.

use thiserror::Error;

/// Errors from change detection and commit inspection.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The `git` binary could not be started.
    #[error("cannot run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// `git` ran but exited unsuccessfully.
    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },

    /// `git log` output did not have the expected shape.
    #[error("unexpected commit metadata from git: {0}")]
    MalformedCommit(String),

    /// One commit carries both content and release configuration changes.
    #[error("mixed pipeline detected: content creation and release; please recommit on different branches")]
    MixedCommit,
}
