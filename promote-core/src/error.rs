//! Error types for promote-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while building a deployment batch or loading config.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable zip archive.
    #[error("cannot read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Archive entry is not a valid project descriptor document.
    #[error("invalid project descriptor '{file}' in {package}: {source}")]
    Descriptor {
        package: PathBuf,
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// The archive lacks the manifest marker, so it is no deployment package.
    #[error("Invalid ZIP contents for a deployment ZIP (missing '{marker}'): {path}")]
    MalformedPackage { path: PathBuf, marker: &'static str },

    /// YAML parse error on config load, with file path.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A server alias or route does not resolve to a URL.
    #[error("unknown server '{0}'; expected a configured alias or an http(s) URL")]
    UnknownServer(String),
}

/// Convenience constructor for [`RegistryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
