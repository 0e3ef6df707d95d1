//! Pure classification of the files a commit touched.
//!
//! Configuration files are recognised by their base name: `release.*.yaml`
//! drives a release and deployment, `content.*.yaml` drives project creation
//! or update. Classification checks run in priority order, release first.

use std::path::{Path, PathBuf};

use promote_core::registry::is_package_candidate;
use promote_core::types::{file_name_of, ChangeKind, ChangedFile};

use crate::error::DetectError;

/// What a changed configuration file asks the pipeline to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    /// Export from the source server and deploy to the target.
    Release,
    /// Create or update a project from an inheritance config.
    Content,
    /// A YAML file the pipeline does not act on.
    Ignored,
}

/// A changed YAML configuration file and its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub path: PathBuf,
    pub kind: ConfigKind,
}

/// Parse `git diff --name-status -z` output into change entries.
///
/// Fields are NUL-separated and paths are verbatim, so non-ASCII names need no
/// unquoting. Renames and copies carry two paths; the post-image path is kept.
pub fn parse_name_status(output: &str) -> Vec<ChangedFile> {
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();
    while let Some(status) = fields.next() {
        let kind = ChangeKind::from_status(status.trim());
        let paths = if matches!(kind, ChangeKind::Renamed | ChangeKind::Copied) {
            2
        } else {
            1
        };
        let Some(path) = fields.by_ref().take(paths).last() else {
            break;
        };
        changes.push(ChangedFile {
            path: PathBuf::from(path),
            kind,
        });
    }
    changes
}

/// Classify a YAML file by its base name; `None` for non-YAML files.
pub fn classify(path: &Path) -> Option<ConfigKind> {
    let name = file_name_of(path).to_lowercase();
    if !(name.ends_with(".yaml") || name.ends_with(".yml")) {
        return None;
    }
    if name.starts_with("release.") {
        return Some(ConfigKind::Release);
    }
    if name.starts_with("content.") {
        return Some(ConfigKind::Content);
    }
    Some(ConfigKind::Ignored)
}

/// Added or modified YAML files, classified, in change order.
pub fn config_changes(changes: &[ChangedFile]) -> Vec<ConfigChange> {
    changes
        .iter()
        .filter(|c| c.kind.is_added_or_modified())
        .filter_map(|c| {
            classify(&c.path).map(|kind| ConfigChange {
                path: c.path.clone(),
                kind,
            })
        })
        .collect()
}

/// Added or modified deployment packages, in change order.
pub fn package_changes(changes: &[ChangedFile]) -> Vec<ChangedFile> {
    changes
        .iter()
        .filter(|c| is_package_candidate(c))
        .cloned()
        .collect()
}

/// True when the commit touches both content and release configuration.
///
/// Every change counts here, deletions included.
pub fn is_mixed_commit(changes: &[ChangedFile]) -> bool {
    let mut content = false;
    let mut release = false;
    for change in changes {
        let path = change.path.to_string_lossy().to_lowercase();
        if path.contains("content.") {
            content = true;
        } else if path.contains("release.") {
            release = true;
        }
    }
    content && release
}

/// Reject mixed commits before any pipeline step runs.
pub fn ensure_not_mixed(changes: &[ChangedFile]) -> Result<(), DetectError> {
    if is_mixed_commit(changes) {
        tracing::error!("mixed pipeline detected: content creation and release");
        return Err(DetectError::MixedCommit);
    }
    Ok(())
}
