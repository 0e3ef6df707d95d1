//! Shared validation and deployment entrypoints used by the CLI.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use promote_core::types::{CommitAuthor, CommitInfo, DeploymentOutcome};
use promote_core::BatchContext;
use serde::Serialize;

use crate::deploy::{
    deploy_packages, post_process, pre_process, AdminPolicy, DeploymentDriver, ProjectSummary,
};
use crate::error::ValidateError;
use crate::identity::{ProjectDirectory, UserDirectory};
use crate::orchestrator::{validate, BatchReport};
use crate::rules::RuleEnv;

/// The target server, seen through its collaborators.
#[derive(Clone, Copy)]
pub struct Target<'a> {
    pub projects: &'a dyn ProjectDirectory,
    pub users: &'a dyn UserDirectory,
    pub driver: &'a dyn DeploymentDriver,
}

/// Everything a completed promotion did.
#[derive(Debug, Clone, Serialize)]
pub struct Promotion {
    pub report: BatchReport,
    pub deployments: Vec<(PathBuf, DeploymentOutcome)>,
    pub projects: Vec<ProjectSummary>,
}

impl Promotion {
    pub fn all_deployed(&self) -> bool {
        self.deployments
            .iter()
            .all(|(_, outcome)| *outcome == DeploymentOutcome::Succeeded)
    }
}

/// Resolve remote ids, then run every rule.
pub fn check(
    ctx: &mut BatchContext,
    projects: &dyn ProjectDirectory,
    users: &dyn UserDirectory,
    author: &CommitAuthor,
) -> Result<BatchReport, ValidateError> {
    ctx.resolve_remote_ids(&projects.projects()?);
    let env = RuleEnv {
        directory: users,
        author,
    };
    validate(ctx, &env)
}

/// Validate the batch and, if it may proceed, deploy it.
///
/// Nothing on the target is touched unless validation succeeds.
pub fn promote(
    ctx: &mut BatchContext,
    target: Target<'_>,
    commit: &CommitInfo,
    admins: &AdminPolicy,
    at: NaiveDateTime,
) -> Result<Promotion, ValidateError> {
    let report = check(ctx, target.projects, target.users, &commit.author)?;

    pre_process(ctx, target.driver, commit, at)?;
    let deployments = deploy_packages(ctx, target.driver);
    ctx.resolve_remote_ids(&target.projects.projects()?);
    let projects = post_process(ctx, target.driver, target.users, admins, commit, at)?;

    Ok(Promotion {
        report,
        deployments,
        projects,
    })
}
