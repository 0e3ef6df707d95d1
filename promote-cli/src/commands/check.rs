//! `promote check`: run the consistency checks without touching the target.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use promote_validate::{check, BatchReport};

use super::{collect_batch, print_json, print_report, GlobalArgs, TargetArgs};

/// Arguments for `promote check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Downgrade overridable rule failures to warnings.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckJson<'a> {
    packages: usize,
    projects: usize,
    clean: bool,
    report: &'a BatchReport,
}

impl CheckArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let mut collected = collect_batch(global, &config, self.force)?;
        let server = self.target.connect(global, &config, true)?;

        let report = check(
            &mut collected.batch,
            &server,
            &server,
            &collected.commit.author,
        )
        .context("validation aborted")?;

        if self.json {
            return print_json(&CheckJson {
                packages: collected.batch.package_count(),
                projects: collected.batch.projects().count(),
                clean: report.is_clean(),
                report: &report,
            });
        }

        if collected.batch.is_empty() {
            println!("No deployment packages in this commit.");
        }
        print_report(&report);
        print_summary(&report, collected.batch.package_count());
        Ok(())
    }
}

fn print_summary(report: &BatchReport, packages: usize) {
    let forced = report.forced().count();
    let advisories = report.advisories().count();
    if report.is_clean() {
        println!("{} {packages} package(s) ready to deploy", "✓".green());
    } else {
        println!(
            "{} {packages} package(s) ready to deploy ({forced} forced, {advisories} advisory)",
            "!".yellow()
        );
    }
}
