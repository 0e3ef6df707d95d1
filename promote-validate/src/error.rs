//! Error types for promote-validate.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to talk to the target server at all.
///
/// Never overridable: it means the checks themselves could not run.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response (DNS, TLS, refused connection, timeout).
    #[error("{method} {url} failed: {message}")]
    Connection {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A local file to be uploaded could not be read.
    #[error("cannot read {path} for upload: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to map the commit author to exactly one server account.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Commit author {query} not unique on the target server ({count} found)")]
    AmbiguousAuthor { query: String, count: u64 },

    #[error("Commit author {author} not available on the target server")]
    AuthorNotFound { author: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that abort a validation or deployment run.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// An overridable rule failed while the override flag was unset.
    #[error("Test {rule} ({title}) failed: {message}")]
    Violation {
        rule: u32,
        title: &'static str,
        message: String,
    },

    /// A package without the manifest marker reached validation.
    #[error("Test {rule} failed: {message}")]
    MalformedPackage { rule: u32, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ValidateError {
    /// Number of the rule that aborted the batch, if a rule did.
    pub fn rule(&self) -> Option<u32> {
        match self {
            ValidateError::Violation { rule, .. } | ValidateError::MalformedPackage { rule, .. } => {
                Some(*rule)
            }
            ValidateError::Transport(_) => None,
        }
    }
}
