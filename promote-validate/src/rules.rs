//! The fixed consistency rule set.
//!
//! A rule inspects the batch and reports a [`Finding`]; it never decides
//! whether the batch aborts. [`evaluate`] turns a finding into a
//! [`RuleResult`] according to the rule's [`Policy`] and the override flag.

use std::fmt;

use promote_core::types::{CommitAuthor, MANIFEST_MARKER};
use promote_core::BatchContext;
use serde::Serialize;

use crate::error::{IdentityError, TransportError};
use crate::identity::{resolve_author, UserDirectory};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a violation of a rule affects the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Aborts unless the override flag is set.
    Overridable,
    /// Aborts regardless of the override flag.
    Mandatory,
    /// Never aborts; findings are informational.
    Advisory,
}

/// What a rule observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Clean,
    Violation(String),
    Advisory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleResult {
    Passed,
    /// A violation was found but the override flag suppressed the abort.
    PassedForced,
    Failed,
    /// Advisory findings; the deployment may fail.
    Inconclusive,
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleResult::Passed => "Passed",
            RuleResult::PassedForced => "Passed (forced)",
            RuleResult::Failed => "Failed",
            RuleResult::Inconclusive => "Inconclusive, deployment may fail",
        };
        f.write_str(s)
    }
}

/// Outcome of one rule in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRecord {
    /// Report number, `Test N`.
    pub seq: u32,
    pub title: &'static str,
    pub result: RuleResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Collaborators the rules may consult besides the batch itself.
pub struct RuleEnv<'a> {
    pub directory: &'a dyn UserDirectory,
    pub author: &'a CommitAuthor,
}

pub type Check = fn(&BatchContext, &RuleEnv<'_>) -> Result<Finding, TransportError>;

/// One numbered consistency rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub title: &'static str,
    pub policy: Policy,
    pub check: Check,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("title", &self.title)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Every rule, in report order.
pub const RULES: [Rule; 10] = [
    Rule {
        title: "Ensure that a deployment ZIP is found",
        policy: Policy::Overridable,
        check: batch_not_empty,
    },
    Rule {
        title: "Ensure that deployment ZIP contains only one project",
        policy: Policy::Overridable,
        check: single_project_per_package,
    },
    Rule {
        title: "Ensure that deployment ZIP contains deployment files (i.e. is a deployment ZIP)",
        policy: Policy::Mandatory,
        check: manifest_present,
    },
    Rule {
        title: "Check folder name/zip name consistency",
        policy: Policy::Overridable,
        check: folder_matches_package,
    },
    Rule {
        title: "Check project name/key for namespaces",
        policy: Policy::Overridable,
        check: namespace_present,
    },
    Rule {
        title: "Check project name/key namespaces for consistency",
        policy: Policy::Overridable,
        check: namespace_consistent,
    },
    Rule {
        title: "Commit author can be found on the target server",
        policy: Policy::Overridable,
        check: author_resolvable,
    },
    Rule {
        title: "Ensure that deployment ZIP contains correct project JSON",
        policy: Policy::Overridable,
        check: descriptor_matches_package,
    },
    Rule {
        title: "Assert that cross-references are in the deployment JSON",
        policy: Policy::Overridable,
        check: cross_references_present,
    },
    Rule {
        title: "Check for external project references in JSON",
        policy: Policy::Advisory,
        check: external_references,
    },
];

/// Apply `rule`'s policy and the override flag to a finding.
pub fn evaluate(seq: u32, rule: &Rule, finding: Finding, force: bool) -> RuleRecord {
    let (result, message) = match finding {
        Finding::Clean => (RuleResult::Passed, None),
        Finding::Advisory(msg) => (RuleResult::Inconclusive, Some(msg)),
        Finding::Violation(msg) => {
            let result = match rule.policy {
                Policy::Overridable if force => RuleResult::PassedForced,
                Policy::Advisory => RuleResult::Inconclusive,
                Policy::Overridable | Policy::Mandatory => RuleResult::Failed,
            };
            (result, Some(msg))
        }
    };
    RuleRecord {
        seq,
        title: rule.title,
        result,
        message,
    }
}

fn violations(messages: Vec<String>) -> Finding {
    if messages.is_empty() {
        Finding::Clean
    } else {
        Finding::Violation(messages.join("; "))
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn batch_not_empty(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    tracing::debug!("Number of deployment ZIPs: {}", ctx.package_count());
    Ok(if ctx.is_empty() {
        Finding::Violation("NO deployment ZIP found".to_string())
    } else {
        Finding::Clean
    })
}

fn single_project_per_package(
    ctx: &BatchContext,
    _: &RuleEnv<'_>,
) -> Result<Finding, TransportError> {
    let mut messages = Vec::new();
    let offending: Vec<String> = ctx
        .packages()
        .filter(|p| p.projects.len() > 1)
        .map(|p| p.path.display().to_string())
        .collect();
    if !offending.is_empty() {
        messages.push(format!("More than one project in: {offending:?}"));
    }
    for (name, packages) in ctx.duplicate_projects() {
        let packages: Vec<String> = packages.iter().map(|p| p.display().to_string()).collect();
        messages.push(format!(
            "Project {name} is contained in more than one deployment ZIP: {packages:?}"
        ));
    }
    Ok(violations(messages))
}

fn manifest_present(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.packages()
            .filter(|p| !p.has_manifest)
            .map(|p| {
                format!(
                    "Invalid ZIP contents for a deployment ZIP (missing '{MANIFEST_MARKER}'): {}",
                    p.path.display()
                )
            })
            .collect(),
    ))
}

fn folder_matches_package(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.packages()
            .filter_map(|p| {
                let base = p.base_name();
                let folder = p.folder_name();
                tracing::debug!("Base ZIP filename: {base}, folder name: {folder}");
                (base != folder).then(|| {
                    format!(
                        "Deployment ZIP filename ({base}) does not match parent folder name: {folder}"
                    )
                })
            })
            .collect(),
    ))
}

fn namespace_present(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.descriptors()
            .filter(|d| d.name.namespace().is_none() || d.key.namespace().is_none())
            .map(|d| {
                format!(
                    "Namespace not present for project ({}) or project key ({})",
                    d.name, d.key
                )
            })
            .collect(),
    ))
}

fn namespace_consistent(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.descriptors()
            .filter(|d| d.name.namespace() != d.key.namespace())
            .map(|d| {
                format!(
                    "Namespaces differ between project ({}) and project key ({})",
                    d.name, d.key
                )
            })
            .collect(),
    ))
}

fn author_resolvable(_: &BatchContext, env: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    match resolve_author(env.directory, env.author) {
        Ok(account) => {
            tracing::debug!("commit author resolves to {account}");
            Ok(Finding::Clean)
        }
        Err(IdentityError::Transport(e)) => Err(e),
        Err(e) => Ok(Finding::Violation(e.to_string())),
    }
}

fn descriptor_matches_package(
    ctx: &BatchContext,
    _: &RuleEnv<'_>,
) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.descriptors()
            .filter_map(|d| {
                let package = ctx.package(&d.package)?.base_name();
                let descriptor = d.descriptor_base_name();
                tracing::debug!("ZIP basename: {package}, JSON basename: {descriptor}");
                (package != descriptor).then(|| {
                    format!(
                        "Deployment ZIP filename ({package}) does not match project JSON filename: {descriptor}"
                    )
                })
            })
            .collect(),
    ))
}

fn cross_references_present(
    ctx: &BatchContext,
    _: &RuleEnv<'_>,
) -> Result<Finding, TransportError> {
    Ok(violations(
        ctx.descriptors()
            .filter(|d| d.cross_references.is_none())
            .map(|d| {
                format!(
                    "Deployment JSON of {} does not contain key 'crossReferences' (incomplete file?)",
                    d.name
                )
            })
            .collect(),
    ))
}

fn external_references(ctx: &BatchContext, _: &RuleEnv<'_>) -> Result<Finding, TransportError> {
    let mut referencing = Vec::new();
    for descriptor in ctx.descriptors() {
        let external = descriptor.external_references();
        for reference in &external {
            tracing::debug!(
                "{} ({}): {}",
                reference.project_name.as_deref().unwrap_or("?"),
                reference.project_id.unwrap_or_default(),
                reference.path.as_deref().unwrap_or("")
            );
        }
        if !external.is_empty() {
            referencing.push(descriptor.name.to_string());
        }
    }
    Ok(if referencing.is_empty() {
        Finding::Clean
    } else {
        Finding::Advisory(format!(
            "External project references found in: {referencing:?}"
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
