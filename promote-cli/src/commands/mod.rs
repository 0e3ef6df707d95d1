//! Subcommands and the plumbing they share.

pub mod changes;
pub mod check;
pub mod deploy;
pub mod whoami;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use tabled::{settings::Style, Table, Tabled};

use promote_core::{
    config, BatchContext, CiEnvironment, CommitInfo, Config, ZipPackageStore,
};
use promote_detector::{commit_info, detect_changes, ensure_not_mixed};
use promote_remote::{
    Credentials, HttpClient, TrackerServer, DEFAULT_TIMEOUT, ENV_PASSWORD, ENV_USERNAME,
};
use promote_validate::{BatchReport, RuleResult};

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Options accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Repository holding the deployment packages.
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Configuration file [default: <repo>/.promote.yaml, then ~/.promote/config.yaml].
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => config::load_from(path),
            None => config::load(&self.repo),
        }
        .context("failed to load configuration")
    }
}

/// Where and as whom to connect.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Target server alias or URL [default: routed from the CI environment].
    #[arg(long)]
    pub target: Option<String>,

    /// Server account [env: PROMOTE_USERNAME].
    #[arg(long)]
    pub username: Option<String>,

    /// Server password [env: PROMOTE_PASSWORD].
    #[arg(long)]
    pub password: Option<String>,
}

impl TargetArgs {
    pub fn target_url(&self, config: &Config) -> Result<String> {
        let env = CiEnvironment::from_env();
        let alias = match self.target.as_deref() {
            Some(target) => target,
            None => config.target_for(&env).with_context(|| {
                format!(
                    "no target server: pass --target or route repository {:?} in the config",
                    env.repository.as_deref().unwrap_or("<unset>")
                )
            })?,
        };
        let url = config.server_url(alias)?;
        tracing::info!("Target server: {url}");
        Ok(url)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let from_env = Credentials::from_env();
        let username = self
            .username
            .clone()
            .or_else(|| from_env.as_ref().map(|c| c.username.clone()))
            .with_context(|| format!("no server account: pass --username or set {ENV_USERNAME}"))?;
        let password = self
            .password
            .clone()
            .or_else(|| from_env.map(|c| c.password))
            .with_context(|| format!("no server password: pass --password or set {ENV_PASSWORD}"))?;
        Ok(Credentials::new(username, password))
    }

    pub fn connect(
        &self,
        global: &GlobalArgs,
        config: &Config,
        dry_run: bool,
    ) -> Result<TrackerServer> {
        let url = self.target_url(config)?;
        let client = HttpClient::new(&url, &self.credentials()?, DEFAULT_TIMEOUT);
        Ok(TrackerServer::new(client, global.repo.clone(), dry_run))
    }
}

// ---------------------------------------------------------------------------
// Batch collection
// ---------------------------------------------------------------------------

/// The current commit and the packages it changed.
pub struct CommitBatch {
    pub commit: CommitInfo,
    pub batch: BatchContext,
}

/// Detect changes, reject mixed commits and register every changed package.
pub fn collect_batch(global: &GlobalArgs, config: &Config, force: bool) -> Result<CommitBatch> {
    let changes = detect_changes(&global.repo, &config.main_branch)
        .context("failed to determine the files changed by this commit")?;
    for change in &changes {
        tracing::info!("{}:{}", change.kind, change.path.display());
    }
    ensure_not_mixed(&changes)?;
    let commit = commit_info(&global.repo).context("failed to read commit metadata")?;
    tracing::info!(
        "Commit {} by {} <{}>",
        commit.short_sha,
        commit.author.name,
        commit.author.email
    );

    let mut batch = BatchContext::new(force);
    let store = ZipPackageStore::new(&global.repo);
    batch
        .register_changes(&changes, &store)
        .context("failed to read deployment packages")?;
    for shadowed in batch.shadowed() {
        eprintln!(
            "{} project {} from {} is declared again by a later package and ignored",
            "warning:".yellow().bold(),
            shadowed.name,
            shadowed.package.display()
        );
    }

    Ok(CommitBatch { commit, batch })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "test")]
    seq: u32,
    #[tabled(rename = "check")]
    title: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "message")]
    message: String,
}

pub fn result_label(result: RuleResult) -> ColoredString {
    let text = result.to_string();
    match result {
        RuleResult::Passed => text.green(),
        RuleResult::PassedForced | RuleResult::Inconclusive => text.yellow(),
        RuleResult::Failed => text.red().bold(),
    }
}

pub fn print_report(report: &BatchReport) {
    let rows: Vec<RuleRow> = report
        .records
        .iter()
        .map(|r| RuleRow {
            seq: r.seq,
            title: r.title.to_string(),
            result: result_label(r.result).to_string(),
            message: r.message.clone().unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
