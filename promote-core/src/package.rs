//! Package store: reads the manifest marker and project descriptors out of a
//! deployment archive.
//!
//! The registry only depends on [`PackageStore`]; [`ZipPackageStore`] is the
//! on-disk implementation used by the CLI.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zip::ZipArchive;

use crate::error::{io_err, RegistryError};
use crate::types::{CrossReference, ProjectKey, ProjectName, DESCRIPTOR_SUFFIX, MANIFEST_MARKER};

/// One project descriptor file as stored in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDescriptor {
    /// Entry name inside the archive.
    pub file: String,
    pub json: Vec<u8>,
}

/// What a package store reports about one archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageContents {
    pub has_manifest: bool,
    pub descriptors: Vec<RawDescriptor>,
}

/// Extraction contract between the registry and wherever packages live.
pub trait PackageStore {
    fn open(&self, path: &Path) -> Result<PackageContents, RegistryError>;
}

/// Reads packages from zip files below a repository root.
#[derive(Debug, Clone)]
pub struct ZipPackageStore {
    root: PathBuf,
}

impl ZipPackageStore {
    /// Relative package paths are resolved against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl PackageStore for ZipPackageStore {
    fn open(&self, path: &Path) -> Result<PackageContents, RegistryError> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| io_err(&full, e))?;
        let archive_err = |source| RegistryError::Archive {
            path: full.clone(),
            source,
        };
        let mut archive = ZipArchive::new(file).map_err(archive_err)?;

        let mut contents = PackageContents::default();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(archive_err)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if name == MANIFEST_MARKER {
                contents.has_manifest = true;
                continue;
            }
            // Project descriptors sit at the archive root.
            if name.contains('/') || !name.ends_with(DESCRIPTOR_SUFFIX) {
                continue;
            }
            let mut json = Vec::new();
            entry.read_to_end(&mut json).map_err(|e| io_err(&full, e))?;
            tracing::debug!("found descriptor {name} in {}", path.display());
            contents.descriptors.push(RawDescriptor { file: name, json });
        }
        Ok(contents)
    }
}

// ---------------------------------------------------------------------------
// Descriptor documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DescriptorDocument {
    project: DescriptorBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorBody {
    name: String,
    #[serde(default)]
    key_name: String,
    #[serde(default)]
    cross_references: Option<Vec<CrossReference>>,
}

/// Fields of a descriptor document the checks care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFields {
    pub name: ProjectName,
    pub key: ProjectKey,
    pub cross_references: Option<Vec<CrossReference>>,
}

/// Parse the `project` section of a descriptor document.
///
/// A missing `keyName` parses as an empty key; a missing `crossReferences`
/// section stays `None` so the checks can tell it apart from an empty list.
pub fn parse_descriptor(json: &[u8]) -> Result<DescriptorFields, serde_json::Error> {
    let doc: DescriptorDocument = serde_json::from_slice(json)?;
    Ok(DescriptorFields {
        name: ProjectName::from(doc.project.name),
        key: ProjectKey::from(doc.project.key_name),
        cross_references: doc.project.cross_references,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_descriptor() {
        let json = br#"{"project": {"name": "NS-Foo", "keyName": "NS-123",
            "crossReferences": [{"projectId": 9, "projectName": "Other", "path": "tracker/4"}]}}"#;
        let fields = parse_descriptor(json).expect("parse");
        assert_eq!(fields.name, ProjectName::from("NS-Foo"));
        assert_eq!(fields.key, ProjectKey::from("NS-123"));
        let refs = fields.cross_references.expect("refs");
        assert_eq!(refs[0].project_id, Some(9));
        assert_eq!(refs[0].project_name.as_deref(), Some("Other"));
    }

    #[test]
    fn missing_cross_references_is_none_not_empty() {
        let fields = parse_descriptor(br#"{"project": {"name": "NS-Foo", "keyName": "NS-1"}}"#)
            .expect("parse");
        assert!(fields.cross_references.is_none());

        let fields = parse_descriptor(
            br#"{"project": {"name": "NS-Foo", "keyName": "NS-1", "crossReferences": []}}"#,
        )
        .expect("parse");
        assert_eq!(fields.cross_references, Some(vec![]));
    }

    #[test]
    fn missing_project_name_is_an_error() {
        assert!(parse_descriptor(br#"{"project": {"keyName": "NS-1"}}"#).is_err());
        assert!(parse_descriptor(br#"{"tracker": {}}"#).is_err());
    }
}
