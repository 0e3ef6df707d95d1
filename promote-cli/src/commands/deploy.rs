//! `promote deploy`: check, baseline, deploy and hand over the changed packages.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use promote_core::{Config, DeploymentOutcome};
use promote_validate::{promote, AdminPolicy, ProjectStatus, ProjectSummary, Promotion, Target};

use super::{collect_batch, print_json, print_report, GlobalArgs, TargetArgs};

/// Arguments for `promote deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Downgrade overridable rule failures to warnings.
    #[arg(long)]
    pub force: bool,

    /// Run the checks and log every change without sending it.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let mut collected = collect_batch(global, &config, self.force)?;
        let server = self.target.connect(global, &config, self.dry_run)?;
        let target = Target {
            projects: &server,
            users: &server,
            driver: &server,
        };
        let at = chrono::Local::now().naive_local();
        let promotion = promote(
            &mut collected.batch,
            target,
            &collected.commit,
            &admin_policy(&config),
            at,
        )
        .context("deployment aborted")?;

        if self.json {
            print_json(&promotion)?;
        } else {
            print_promotion(&promotion, self.dry_run);
            if promotion.deployments.is_empty() {
                println!("No deployment packages in this commit. Nothing deployed.");
            }
        }

        if !promotion.all_deployed() {
            let failed = promotion
                .deployments
                .iter()
                .filter(|(_, outcome)| *outcome == DeploymentOutcome::Failed)
                .count();
            bail!("{failed} package(s) failed to deploy");
        }
        Ok(())
    }
}

fn admin_policy(config: &Config) -> AdminPolicy {
    AdminPolicy {
        accounts: config.default_admins.clone(),
        group: config.deploy_group.clone(),
        role: config.admin_role,
    }
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "project")]
    name: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "status")]
    status: String,
}

fn status_label(summary: &ProjectSummary) -> String {
    let text = match summary.status {
        ProjectStatus::DeployFailed => "deployment failed".red().bold(),
        ProjectStatus::NotCreated => "not created".red(),
        ProjectStatus::Created => "created".yellow(),
        ProjectStatus::Updated => "updated".green(),
    };
    text.to_string()
}

fn print_promotion(promotion: &Promotion, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    print_report(&promotion.report);

    for (package, outcome) in &promotion.deployments {
        match outcome {
            DeploymentOutcome::Succeeded => {
                println!("{prefix}{} {}", "✓".green(), package.display())
            }
            DeploymentOutcome::Failed => println!("{prefix}{} {}", "✗".red(), package.display()),
            DeploymentOutcome::Unset => println!("{prefix}  {}", package.display()),
        }
    }

    let rows: Vec<ProjectRow> = promotion
        .projects
        .iter()
        .map(|p| ProjectRow {
            name: p.name.to_string(),
            id: if p.remote_id.is_resolved() {
                p.remote_id.to_string()
            } else {
                "-".to_string()
            },
            status: status_label(p),
        })
        .collect();
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for summary in &promotion.projects {
        if let Some(url) = &summary.members_url {
            println!("  members of {}: {url}", summary.name);
        }
    }
}
