//! Domain types for deployment batches.
//!
//! All path fields use `PathBuf`. Descriptor payloads deserialize via serde from
//! the JSON documents bundled in deployment packages.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Entry that proves an archive was produced by the deployment export.
pub const MANIFEST_MARKER: &str = "multiExport.txt";

/// File-name suffix of a deployment package.
pub const PACKAGE_SUFFIX: &str = ".deployment.zip";

/// File-name suffix of a project descriptor inside a package.
pub const DESCRIPTOR_SUFFIX: &str = ".json";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Display name of a tracker project, e.g. `"NS-Foo"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl ProjectName {
    /// Namespace prefix of the name, see [`namespace`].
    pub fn namespace(&self) -> Option<&str> {
        namespace(&self.0)
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Namespace-qualified project key, e.g. `"NS-123"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ProjectKey(pub String);

impl ProjectKey {
    /// Namespace prefix of the key, see [`namespace`].
    pub fn namespace(&self) -> Option<&str> {
        namespace(&self.0)
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric project id on the target server. `0` means "new or inaccessible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct RemoteId(pub u64);

impl RemoteId {
    pub const UNRESOLVED: RemoteId = RemoteId(0);

    pub fn is_resolved(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Naming helpers
// ---------------------------------------------------------------------------

/// Substring before the first `-`.
///
/// Returns `None` when the value has no hyphen or the prefix is empty. A
/// hyphen-free name such as `Foo` is therefore not its own namespace and fails
/// the namespace-present check, while `NS-` has the namespace `NS`.
pub fn namespace(value: &str) -> Option<&str> {
    let (prefix, _) = value.split_once('-')?;
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Everything before the last occurrence of `suffix` in `file_name`.
///
/// Yields `""` when the suffix does not occur at all, so a file that lacks the
/// expected suffix never matches a non-empty name.
pub fn base_name<'a>(file_name: &'a str, suffix: &str) -> &'a str {
    match file_name.rfind(suffix) {
        Some(idx) => &file_name[..idx],
        None => "",
    }
}

/// Final path component as a `String` (empty if there is none).
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Change detection
// ---------------------------------------------------------------------------

/// Kind of change a commit applied to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl ChangeKind {
    /// Map a `git diff --name-status` letter (`M`, `A`, `R100`, ...) to a kind.
    pub fn from_status(status: &str) -> Self {
        match status.chars().next() {
            Some('A') => ChangeKind::Added,
            Some('M') => ChangeKind::Modified,
            Some('D') => ChangeKind::Deleted,
            Some('R') => ChangeKind::Renamed,
            Some('C') => ChangeKind::Copied,
            Some('T') => ChangeKind::TypeChanged,
            Some('U') => ChangeKind::Unmerged,
            _ => ChangeKind::Unknown,
        }
    }

    /// Only added and modified files feed a deployment batch.
    pub fn is_added_or_modified(self) -> bool {
        matches!(self, ChangeKind::Added | ChangeKind::Modified)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            ChangeKind::Added => "A",
            ChangeKind::Modified => "M",
            ChangeKind::Deleted => "D",
            ChangeKind::Renamed => "R",
            ChangeKind::Copied => "C",
            ChangeKind::TypeChanged => "T",
            ChangeKind::Unmerged => "U",
            ChangeKind::Unknown => "X",
        };
        f.write_str(letter)
    }
}

/// One file touched by the commit under deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Repository-relative path (post-image path for renames).
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Author of the commit under deployment, as recorded by git.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// The commit under deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitInfo {
    pub author: CommitAuthor,
    pub sha: String,
    pub short_sha: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Packages and descriptors
// ---------------------------------------------------------------------------

/// A reference from one project's configuration into another project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Result of deploying the package a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentOutcome {
    #[default]
    Unset,
    Succeeded,
    Failed,
}

/// One versioned deployment archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub path: PathBuf,
    /// Whether [`MANIFEST_MARKER`] is present in the archive.
    pub has_manifest: bool,
    /// Projects bundled in the archive, in archive order.
    pub projects: Vec<ProjectName>,
}

impl Package {
    /// Package file name with [`PACKAGE_SUFFIX`] stripped.
    pub fn base_name(&self) -> String {
        base_name(&file_name_of(&self.path), PACKAGE_SUFFIX).to_string()
    }

    /// Name of the directory holding the package.
    pub fn folder_name(&self) -> String {
        self.path.parent().map(file_name_of).unwrap_or_default()
    }
}

/// Metadata of one project definition inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: ProjectName,
    pub key: ProjectKey,
    /// `None` when the export omitted the section entirely.
    pub cross_references: Option<Vec<CrossReference>>,
    /// Package the descriptor was read from.
    pub package: PathBuf,
    /// File name of the descriptor inside the package.
    pub descriptor_file: String,
    pub remote_id: RemoteId,
    /// Remote id as it was before the deploy step.
    pub original_id: RemoteId,
    pub outcome: DeploymentOutcome,
}

impl ProjectDescriptor {
    pub fn new(
        name: ProjectName,
        key: ProjectKey,
        cross_references: Option<Vec<CrossReference>>,
        package: PathBuf,
        descriptor_file: impl Into<String>,
    ) -> Self {
        Self {
            name,
            key,
            cross_references,
            package,
            descriptor_file: descriptor_file.into(),
            remote_id: RemoteId::UNRESOLVED,
            original_id: RemoteId::UNRESOLVED,
            outcome: DeploymentOutcome::Unset,
        }
    }

    /// Descriptor file name with [`DESCRIPTOR_SUFFIX`] stripped.
    pub fn descriptor_base_name(&self) -> &str {
        let file = self
            .descriptor_file
            .rsplit('/')
            .next()
            .unwrap_or(&self.descriptor_file);
        base_name(file, DESCRIPTOR_SUFFIX)
    }

    /// Cross-references that carry a project id other than this project's own.
    pub fn external_references(&self) -> Vec<&CrossReference> {
        self.cross_references
            .iter()
            .flatten()
            .filter(|r| matches!(r.project_id, Some(id) if id != self.remote_id.0))
            .collect()
    }
}

/// A project as listed by the target server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: RemoteId,
    pub name: ProjectName,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_prefix_before_first_hyphen() {
        assert_eq!(namespace("NS-Foo"), Some("NS"));
        assert_eq!(namespace("NS-Foo-Bar"), Some("NS"));
        assert_eq!(namespace("NS-"), Some("NS"));
        assert_eq!(namespace("-Foo"), None);
        assert_eq!(namespace("Foo"), None);
        assert_eq!(namespace(""), None);
    }

    #[test]
    fn base_name_strips_last_suffix_occurrence() {
        assert_eq!(base_name("Foo-Bar.deployment.zip", PACKAGE_SUFFIX), "Foo-Bar");
        assert_eq!(base_name("Foo-Bar.json", DESCRIPTOR_SUFFIX), "Foo-Bar");
        assert_eq!(base_name("Foo-Bar.zip", PACKAGE_SUFFIX), "");
    }

    #[test]
    fn package_names_come_from_path() {
        let pkg = Package {
            path: PathBuf::from("projects/Foo-Bar/Foo-Bar.deployment.zip"),
            has_manifest: true,
            projects: vec![],
        };
        assert_eq!(pkg.base_name(), "Foo-Bar");
        assert_eq!(pkg.folder_name(), "Foo-Bar");
    }

    #[test]
    fn change_kind_from_status_letters() {
        assert_eq!(ChangeKind::from_status("M"), ChangeKind::Modified);
        assert_eq!(ChangeKind::from_status("R087"), ChangeKind::Renamed);
        assert_eq!(ChangeKind::from_status("?"), ChangeKind::Unknown);
        assert!(ChangeKind::Added.is_added_or_modified());
        assert!(!ChangeKind::Deleted.is_added_or_modified());
    }

    #[test]
    fn external_references_skip_own_and_idless_entries() {
        let mut d = ProjectDescriptor::new(
            ProjectName::from("NS-Foo"),
            ProjectKey::from("NS-1"),
            Some(vec![
                CrossReference { project_id: Some(7), ..Default::default() },
                CrossReference { project_id: Some(42), ..Default::default() },
                CrossReference { path: Some("tracker/1".into()), ..Default::default() },
            ]),
            PathBuf::from("a.deployment.zip"),
            "a.json",
        );
        d.remote_id = RemoteId(7);
        let ext = d.external_references();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext[0].project_id, Some(42));
    }

    #[test]
    fn descriptor_base_name_ignores_directories() {
        let d = ProjectDescriptor::new(
            ProjectName::from("NS-Foo"),
            ProjectKey::from("NS-1"),
            None,
            PathBuf::from("x.deployment.zip"),
            "nested/Foo-Baz.json",
        );
        assert_eq!(d.descriptor_base_name(), "Foo-Baz");
    }
}
