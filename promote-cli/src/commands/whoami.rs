//! `promote whoami`: the server account the commit author maps to.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use promote_detector::commit_info;
use promote_validate::resolve_author;

use super::{print_json, GlobalArgs, TargetArgs};

/// Arguments for `promote whoami`.
#[derive(Args, Debug)]
pub struct WhoamiArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct WhoamiJson<'a> {
    author: &'a str,
    email: &'a str,
    account: &'a str,
}

impl WhoamiArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let commit = commit_info(&global.repo).context("failed to read commit metadata")?;
        let server = self.target.connect(global, &config, true)?;

        let account = resolve_author(&server, &commit.author).with_context(|| {
            format!(
                "could not map {} <{}> to a server account",
                commit.author.name, commit.author.email
            )
        })?;

        if self.json {
            return print_json(&WhoamiJson {
                author: &commit.author.name,
                email: &commit.author.email,
                account: &account,
            });
        }
        println!(
            "{} <{}> → {}",
            commit.author.name,
            commit.author.email,
            account.bold()
        );
        Ok(())
    }
}
