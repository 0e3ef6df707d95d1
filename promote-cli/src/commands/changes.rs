//! `promote changes`: what the current commit touched, offline.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use promote_core::types::{ChangeKind, ChangedFile};
use promote_core::{CiEnvironment, Config};
use promote_detector::{
    config_changes, detect_changes, is_mixed_commit, package_changes, ConfigKind,
};

use super::{print_json, GlobalArgs};

/// Arguments for `promote changes`.
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ChangesArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let changes = detect_changes(&global.repo, &config.main_branch)
            .context("failed to determine the files changed by this commit")?;
        let mixed = is_mixed_commit(&changes);
        let routing = Routing::from_config(&config, &CiEnvironment::from_env());

        let roles = Roles::of(&changes);
        let entries: Vec<ChangeEntry> = changes
            .iter()
            .map(|change| ChangeEntry {
                path: change.path.display().to_string(),
                kind: change.kind,
                role: roles.role_of(change),
            })
            .collect();

        if self.json {
            return print_json(&ChangesJson {
                mixed,
                packages: roles.packages.len(),
                source: routing.source,
                target: routing.target,
                changes: entries,
            });
        }

        print_routing(&routing);
        if entries.is_empty() {
            println!("No changes since the base revision.");
            return Ok(());
        }
        let rows: Vec<ChangeRow> = entries
            .into_iter()
            .map(|e| ChangeRow {
                kind: e.kind.to_string(),
                role: e.role.to_string(),
                path: e.path,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!(
            "{} package(s), {} release and {} content configuration(s)",
            roles.packages.len(),
            roles.count(ConfigKind::Release),
            roles.count(ConfigKind::Content)
        );

        if mixed {
            println!(
                "{} release and content configuration changed in one commit; \
                 check and deploy will refuse it",
                "warning:".yellow().bold()
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Source and target server aliases selected for the running build.
struct Routing {
    source: Option<String>,
    target: Option<String>,
}

impl Routing {
    fn from_config(config: &Config, env: &CiEnvironment) -> Self {
        Self {
            source: config.source_for(env).map(str::to_string),
            target: config.target_for(env).map(str::to_string),
        }
    }
}

fn print_routing(routing: &Routing) {
    let alias = |a: &Option<String>| a.clone().unwrap_or_else(|| "-".to_string());
    println!(
        "source: {}  target: {}",
        alias(&routing.source).bold(),
        alias(&routing.target).bold()
    );
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// How the pipeline treats a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Package,
    Release,
    Content,
    Config,
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Role::Package => "package",
            Role::Release => "release",
            Role::Content => "content",
            Role::Config => "config (ignored)",
            Role::Other => "-",
        };
        f.write_str(text)
    }
}

/// Packages and configuration files the pipeline acts on.
struct Roles {
    packages: BTreeSet<PathBuf>,
    configs: BTreeMap<PathBuf, ConfigKind>,
}

impl Roles {
    fn of(changes: &[ChangedFile]) -> Self {
        Self {
            packages: package_changes(changes).into_iter().map(|c| c.path).collect(),
            configs: config_changes(changes)
                .into_iter()
                .map(|c| (c.path, c.kind))
                .collect(),
        }
    }

    fn role_of(&self, change: &ChangedFile) -> Role {
        if self.packages.contains(&change.path) {
            return Role::Package;
        }
        match self.configs.get(&change.path) {
            Some(ConfigKind::Release) => Role::Release,
            Some(ConfigKind::Content) => Role::Content,
            Some(ConfigKind::Ignored) => Role::Config,
            None => Role::Other,
        }
    }

    fn count(&self, kind: ConfigKind) -> usize {
        self.configs.values().filter(|k| **k == kind).count()
    }
}

#[derive(Serialize)]
struct ChangesJson {
    mixed: bool,
    packages: usize,
    source: Option<String>,
    target: Option<String>,
    changes: Vec<ChangeEntry>,
}

#[derive(Serialize)]
struct ChangeEntry {
    path: String,
    kind: ChangeKind,
    role: Role,
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "path")]
    path: String,
}
