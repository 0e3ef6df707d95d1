//! Pre-deployment validation and deployment of a package batch.
//!
//! - [`identity`]: commit author → server account
//! - [`rules`]: the ten consistency rules and their override policy
//! - [`orchestrator`]: runs the rules, decides GO / NO-GO
//! - [`deploy`]: baselines, deployment and admin bookkeeping
//! - [`pipeline`]: `check` and `promote`, the entrypoints

pub mod deploy;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod pipeline;
pub mod rules;

pub use deploy::{
    AdminMember, AdminPolicy, Baseline, DeploymentDriver, ProjectStatus, ProjectSummary,
};
pub use error::{IdentityError, TransportError, ValidateError};
pub use identity::{
    resolve_author, NameQuery, ProjectDirectory, UserAccount, UserDirectory, UserSearch,
};
pub use orchestrator::{validate, BatchReport};
pub use pipeline::{check, promote, Promotion, Target};
pub use rules::{RuleRecord, RuleResult};
