//! promote core library: domain types, artifact registry, package store, config.
//!
//! - [`types`]: newtypes, packages and project descriptors
//! - [`error`]: [`RegistryError`]
//! - [`package`]: [`PackageStore`] and the zip-backed store
//! - [`registry`]: [`BatchContext`], the run-scoped artifact registry
//! - [`config`]: YAML configuration and CI routing

pub mod config;
pub mod error;
pub mod package;
pub mod registry;
pub mod types;

pub use config::{CiEnvironment, Config};
pub use error::RegistryError;
pub use package::{PackageContents, PackageStore, RawDescriptor, ZipPackageStore};
pub use registry::BatchContext;
pub use types::{
    ChangeKind, ChangedFile, CommitAuthor, CommitInfo, CrossReference, DeploymentOutcome,
    Package, ProjectDescriptor, ProjectKey, ProjectName, RemoteId, RemoteProject,
};
