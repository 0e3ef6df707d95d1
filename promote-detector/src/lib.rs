//! Change detection for `promote-detector`.
//!
//! [`git`] asks the `git` binary which files the current commit touched and
//! who authored it; [`changes`] classifies those files without any I/O. A
//! commit touching both content and release configuration is rejected by
//! [`changes::ensure_not_mixed`] before anything else runs.

pub mod changes;
pub mod error;
pub mod git;

pub use changes::{
    classify, config_changes, ensure_not_mixed, is_mixed_commit, package_changes,
    parse_name_status, ConfigChange, ConfigKind,
};
pub use error::DetectError;
pub use git::{base_revision, commit_info, detect_changes};
