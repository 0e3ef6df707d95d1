//! Artifact registry: the run-scoped [`BatchContext`].
//!
//! A context is filled once per run from the changed package files, enriched
//! with remote ids, validated, and finally annotated with deployment outcomes.
//! Packages are keyed by path and projects by name; both maps are ordered so
//! every walk over the batch is deterministic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::package::{parse_descriptor, PackageStore};
use crate::types::{
    ChangedFile, DeploymentOutcome, Package, ProjectDescriptor, ProjectName, RemoteProject,
    MANIFEST_MARKER, PACKAGE_SUFFIX,
};

/// Everything one deployment run knows about its packages.
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    packages: BTreeMap<PathBuf, Package>,
    projects: BTreeMap<ProjectName, ProjectDescriptor>,
    shadowed: Vec<ProjectDescriptor>,
    force: bool,
    sequence: u32,
}

impl BatchContext {
    /// Empty batch. `force` downgrades overridable violations to warnings.
    pub fn new(force: bool) -> Self {
        Self {
            force,
            ..Self::default()
        }
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Packages sorted by path.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package(&self, path: &Path) -> Option<&Package> {
        self.packages.get(path)
    }

    /// Descriptors sorted by project name.
    pub fn projects(&self) -> impl Iterator<Item = &ProjectDescriptor> {
        self.projects.values()
    }

    pub fn project(&self, name: &ProjectName) -> Option<&ProjectDescriptor> {
        self.projects.get(name)
    }

    /// Descriptors replaced by a later package declaring the same project name.
    pub fn shadowed(&self) -> &[ProjectDescriptor] {
        &self.shadowed
    }

    /// Every registered descriptor: the current holder of each project name,
    /// then the shadowed ones in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ProjectDescriptor> {
        self.projects.values().chain(self.shadowed.iter())
    }

    /// Project names declared by more than one package, with those packages.
    pub fn duplicate_projects(&self) -> Vec<(&ProjectName, Vec<&Path>)> {
        let mut duplicates: BTreeMap<&ProjectName, Vec<&Path>> = BTreeMap::new();
        for descriptor in &self.shadowed {
            duplicates
                .entry(&descriptor.name)
                .or_default()
                .push(descriptor.package.as_path());
        }
        for (name, packages) in duplicates.iter_mut() {
            if let Some(current) = self.projects.get(*name) {
                packages.push(current.package.as_path());
            }
        }
        duplicates.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register every added or modified package in a change list.
    ///
    /// Returns the number of packages registered.
    pub fn register_changes(
        &mut self,
        changes: &[ChangedFile],
        store: &dyn PackageStore,
    ) -> Result<usize, RegistryError> {
        let mut count = 0;
        for change in changes.iter().filter(|c| is_package_candidate(c)) {
            self.register(&change.path, store)?;
            count += 1;
        }
        Ok(count)
    }

    /// Read a package through `store` and index its descriptors.
    ///
    /// Fails with [`RegistryError::MalformedPackage`] if the manifest marker is
    /// missing; nothing is inserted in that case.
    pub fn register(&mut self, path: &Path, store: &dyn PackageStore) -> Result<(), RegistryError> {
        let contents = store.open(path)?;
        if !contents.has_manifest {
            tracing::error!("{} lacks {MANIFEST_MARKER}", path.display());
            return Err(RegistryError::MalformedPackage {
                path: path.to_path_buf(),
                marker: MANIFEST_MARKER,
            });
        }

        let mut descriptors = Vec::with_capacity(contents.descriptors.len());
        for raw in contents.descriptors {
            let fields = parse_descriptor(&raw.json).map_err(|source| RegistryError::Descriptor {
                package: path.to_path_buf(),
                file: raw.file.clone(),
                source,
            })?;
            descriptors.push(ProjectDescriptor::new(
                fields.name,
                fields.key,
                fields.cross_references,
                path.to_path_buf(),
                raw.file,
            ));
        }

        self.insert(path.to_path_buf(), true, descriptors);
        Ok(())
    }

    /// Insert a package and its descriptors without consulting a store.
    ///
    /// The last package to declare a project name wins the name; the previous
    /// descriptor is kept in [`shadowed`](Self::shadowed).
    pub fn insert(
        &mut self,
        path: PathBuf,
        has_manifest: bool,
        descriptors: Vec<ProjectDescriptor>,
    ) {
        let projects = descriptors.iter().map(|d| d.name.clone()).collect();
        for descriptor in descriptors {
            tracing::debug!(
                "registered project {} from {}",
                descriptor.name,
                path.display()
            );
            if let Some(previous) = self.projects.insert(descriptor.name.clone(), descriptor) {
                tracing::warn!(
                    "project {} declared again; {} replaces {}",
                    previous.name,
                    path.display(),
                    previous.package.display()
                );
                self.shadowed.push(previous);
            }
        }
        self.packages.insert(
            path.clone(),
            Package {
                path,
                has_manifest,
                projects,
            },
        );
    }

    // -----------------------------------------------------------------------
    // Remote ids and outcomes
    // -----------------------------------------------------------------------

    /// Associate descriptors with the ids of same-named projects on the server.
    ///
    /// Descriptors without a match keep their current id. Shadowed descriptors
    /// are resolved too, so checks over them see the same ids.
    pub fn resolve_remote_ids(&mut self, remote: &[RemoteProject]) {
        for project in remote {
            if let Some(descriptor) = self.projects.get_mut(&project.name) {
                tracing::debug!(
                    "associating target instance project id {} with {}",
                    project.id,
                    project.name
                );
                descriptor.remote_id = project.id;
            }
            for descriptor in self.shadowed.iter_mut().filter(|d| d.name == project.name) {
                descriptor.remote_id = project.id;
            }
        }
    }

    /// Remember the current remote ids for post-deployment auditing.
    pub fn capture_original_ids(&mut self) {
        for descriptor in self.projects.values_mut().chain(self.shadowed.iter_mut()) {
            descriptor.original_id = descriptor.remote_id;
        }
    }

    /// Mark every descriptor that came from `package` with `outcome`.
    pub fn record_deployment_outcome(&mut self, package: &Path, outcome: DeploymentOutcome) {
        for descriptor in self.projects.values_mut().chain(self.shadowed.iter_mut()) {
            if descriptor.package == package {
                descriptor.outcome = outcome;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rule sequence
    // -----------------------------------------------------------------------

    /// Restart rule numbering at 1.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Number for the next rule report.
    pub fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }
}

/// Added or modified file whose name ends in the package suffix.
pub fn is_package_candidate(change: &ChangedFile) -> bool {
    change.kind.is_added_or_modified()
        && change
            .path
            .to_string_lossy()
            .to_lowercase()
            .ends_with(PACKAGE_SUFFIX)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
