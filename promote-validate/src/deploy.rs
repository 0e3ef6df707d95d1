//! Deployment of a validated batch and the bookkeeping around it.
//!
//! Before deploying, every project that already exists on the target gets a
//! "Before deployment" baseline. After deploying, each successfully deployed
//! project gets its admins and an "After deployment" baseline.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use promote_core::types::{CommitAuthor, CommitInfo, DeploymentOutcome, ProjectName, RemoteId};
use promote_core::BatchContext;
use serde::Serialize;

use crate::error::{IdentityError, TransportError};
use crate::identity::{resolve_author, UserDirectory};

pub const BEFORE_DEPLOYMENT: &str = "Before deployment";
pub const AFTER_DEPLOYMENT: &str = "After deployment";
pub const BASELINE_TIME_FORMAT: &str = "%Y_%m_%dT%H_%M_%S";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Name and description of a project baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Baseline {
    pub name: String,
    pub description: String,
}

impl Baseline {
    /// `"<prefix> - <sha> (<timestamp>)"`, described by the commit.
    pub fn new(prefix: &str, commit: &CommitInfo, at: NaiveDateTime) -> Self {
        Self {
            name: format!(
                "{prefix} - {} ({})",
                commit.sha,
                at.format(BASELINE_TIME_FORMAT)
            ),
            description: format!("{}: {}", commit.author.name, commit.message),
        }
    }
}

/// A member of the project-admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMember {
    User(String),
    Group(String),
}

impl fmt::Display for AdminMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminMember::User(name) => write!(f, "user/{name}"),
            AdminMember::Group(name) => write!(f, "group/{name}"),
        }
    }
}

/// Who becomes project admin after a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicy {
    /// Accounts added to every deployed project.
    pub accounts: Vec<String>,
    pub group: Option<String>,
    /// Role id of the project-admin role.
    pub role: u32,
}

/// Mutating operations on the target server.
pub trait DeploymentDriver {
    fn create_baseline(&self, project: RemoteId, baseline: &Baseline) -> Result<(), TransportError>;

    /// Upload and apply one package.
    fn deploy_package(&self, package: &Path) -> Result<(), TransportError>;

    fn add_project_admin(
        &self,
        project: RemoteId,
        role: u32,
        member: &AdminMember,
    ) -> Result<(), TransportError>;

    /// Members page of a project, for the final report.
    fn members_url(&self, project: RemoteId) -> String;
}

/// What post-processing made of one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// The package deployment failed.
    DeployFailed,
    /// Deployed, but the project is not listed on the target.
    NotCreated,
    /// Did not exist (under this name) before the deployment.
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub name: ProjectName,
    pub remote_id: RemoteId,
    pub original_id: RemoteId,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Capture original ids and baseline every project that already exists.
pub fn pre_process(
    ctx: &mut BatchContext,
    driver: &dyn DeploymentDriver,
    commit: &CommitInfo,
    at: NaiveDateTime,
) -> Result<(), TransportError> {
    ctx.capture_original_ids();
    for project in ctx.projects() {
        if project.remote_id.is_resolved() {
            tracing::info!(
                "Create project baseline prior to deployment in {} ({})",
                project.name,
                project.remote_id
            );
            driver.create_baseline(project.remote_id, &Baseline::new(BEFORE_DEPLOYMENT, commit, at))?;
        } else {
            tracing::warn!(
                "Project {} may be new, renamed, or not accessible",
                project.name
            );
        }
    }
    Ok(())
}

/// Deploy every package and record the outcome on its descriptors.
///
/// A failing package does not stop the others.
pub fn deploy_packages(
    ctx: &mut BatchContext,
    driver: &dyn DeploymentDriver,
) -> Vec<(PathBuf, DeploymentOutcome)> {
    let paths: Vec<PathBuf> = ctx.packages().map(|p| p.path.clone()).collect();
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!("deploying {}", path.display());
        let outcome = match driver.deploy_package(&path) {
            Ok(()) => DeploymentOutcome::Succeeded,
            Err(e) => {
                tracing::error!("deployment of {} failed: {e}", path.display());
                DeploymentOutcome::Failed
            }
        };
        ctx.record_deployment_outcome(&path, outcome);
        outcomes.push((path, outcome));
    }
    outcomes
}

/// Grant admin rights and baseline every deployed project.
///
/// Expects remote ids to have been re-resolved after the deployment.
pub fn post_process(
    ctx: &BatchContext,
    driver: &dyn DeploymentDriver,
    directory: &dyn UserDirectory,
    admins: &AdminPolicy,
    commit: &CommitInfo,
    at: NaiveDateTime,
) -> Result<Vec<ProjectSummary>, TransportError> {
    let mut author_account: Option<Option<String>> = None;
    let mut summaries = Vec::new();

    for project in ctx.projects() {
        let mut summary = ProjectSummary {
            name: project.name.clone(),
            remote_id: project.remote_id,
            original_id: project.original_id,
            status: ProjectStatus::Updated,
            members_url: None,
        };

        if project.outcome != DeploymentOutcome::Succeeded {
            tracing::error!("Deployment of project {} failed", project.name);
            summary.status = ProjectStatus::DeployFailed;
            summaries.push(summary);
            continue;
        }
        if !project.remote_id.is_resolved() {
            tracing::error!("Project {} could not be created", project.name);
            summary.status = ProjectStatus::NotCreated;
            summaries.push(summary);
            continue;
        }
        if !project.original_id.is_resolved() {
            tracing::warn!(
                "Project {} was new or got renamed: Check Project Admins manually!",
                project.name
            );
            summary.status = ProjectStatus::Created;
        }

        if author_account.is_none() {
            author_account = Some(commit_author_account(directory, &commit.author)?);
        }
        let author = author_account.as_ref().and_then(|a| a.as_deref());
        let members = admin_members(admins, author);
        tracing::info!("Adding users to Project Admin role");
        for member in &members {
            driver.add_project_admin(project.remote_id, admins.role, member)?;
            tracing::debug!("Add {member} to project {}", project.remote_id);
        }

        tracing::info!(
            "Create project baseline after deployment in {} ({})",
            project.name,
            project.remote_id
        );
        driver.create_baseline(project.remote_id, &Baseline::new(AFTER_DEPLOYMENT, commit, at))?;

        let url = driver.members_url(project.remote_id);
        tracing::info!("{url}");
        summary.members_url = Some(url);
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Default accounts, then the commit author, then the deploy group.
pub fn admin_members(admins: &AdminPolicy, author: Option<&str>) -> Vec<AdminMember> {
    let mut members: Vec<AdminMember> = Vec::new();
    for account in admins.accounts.iter().map(String::as_str).chain(author) {
        let member = AdminMember::User(account.to_string());
        if !members.contains(&member) {
            members.push(member);
        }
    }
    members.extend(admins.group.clone().map(AdminMember::Group));
    members
}

fn commit_author_account(
    directory: &dyn UserDirectory,
    author: &CommitAuthor,
) -> Result<Option<String>, TransportError> {
    match resolve_author(directory, author) {
        Ok(account) => Ok(Some(account)),
        Err(IdentityError::Transport(e)) => Err(e),
        Err(e) => {
            tracing::warn!("{e}; commit author is not added as project admin");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn commit() -> CommitInfo {
        CommitInfo {
            author: CommitAuthor {
                name: "Doe, John (ACME)".into(),
                email: "j.doe@x.com".into(),
            },
            sha: "0123abcd".into(),
            short_sha: "0123ab".into(),
            message: "Update Foo-Bar".into(),
        }
    }

    #[test]
    fn baseline_name_and_description() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 1))
            .expect("timestamp");
        let baseline = Baseline::new(BEFORE_DEPLOYMENT, &commit(), at);
        assert_eq!(baseline.name, "Before deployment - 0123abcd (2024_03_07T09_05_01)");
        assert_eq!(baseline.description, "Doe, John (ACME): Update Foo-Bar");
    }

    #[test]
    fn admin_members_are_deduplicated_and_ordered() {
        let admins = AdminPolicy {
            accounts: vec!["fixcbjf".into(), "fixc9ms".into()],
            group: Some("ALM-DEPLOY".into()),
            role: 1,
        };
        let members = admin_members(&admins, Some("fixc9ms"));
        assert_eq!(
            members,
            vec![
                AdminMember::User("fixcbjf".into()),
                AdminMember::User("fixc9ms".into()),
                AdminMember::Group("ALM-DEPLOY".into()),
            ]
        );
        assert_eq!(members[2].to_string(), "group/ALM-DEPLOY");
    }
}
