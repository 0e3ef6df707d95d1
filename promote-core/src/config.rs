//! YAML configuration: server aliases, CI routing and admin defaults.
//!
//! # Lookup order
//!
//! 1. an explicit `--config <path>` (must exist)
//! 2. `<repo>/.promote.yaml`
//! 3. `<home>/.promote/config.yaml`
//! 4. built-in defaults
//!
//! As with the registry, functions taking `home` explicitly have an `_at`
//! suffix; tests only ever call those.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};

pub const REPO_CONFIG_FILE: &str = ".promote.yaml";

/// CI variable holding the repository that triggered the build.
pub const ENV_REPOSITORY: &str = "Build_Repository_Name";
/// CI variable holding the branch that triggered the build.
pub const ENV_BRANCH: &str = "Build_SourceBranchName";

/// Target server aliases for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Target when building the main branch.
    pub main: String,
    /// Target for every other branch.
    pub other: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Alias (e.g. `Test`) → base URL.
    pub servers: BTreeMap<String, String>,
    /// Repository name → target routing.
    pub routes: BTreeMap<String, Route>,
    /// Repository name → source server alias.
    pub source_routes: BTreeMap<String, String>,
    /// Source alias when no source route matches.
    pub default_source: Option<String>,
    pub main_branch: String,
    /// Accounts always added as project admins after a deployment.
    pub default_admins: Vec<String>,
    /// Group added as project admin after a deployment.
    pub deploy_group: Option<String>,
    /// Id of the project-admin role on the target server.
    pub admin_role: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: BTreeMap::new(),
            routes: BTreeMap::new(),
            source_routes: BTreeMap::new(),
            default_source: None,
            main_branch: "main".to_string(),
            default_admins: Vec::new(),
            deploy_group: None,
            admin_role: 1,
        }
    }
}

/// Build metadata exported by the CI runner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CiEnvironment {
    pub repository: Option<String>,
    pub branch: Option<String>,
}

impl CiEnvironment {
    pub fn from_env() -> Self {
        Self {
            repository: std::env::var(ENV_REPOSITORY).ok().filter(|v| !v.is_empty()),
            branch: std::env::var(ENV_BRANCH).ok().filter(|v| !v.is_empty()),
        }
    }
}

impl Config {
    /// Resolve an alias or URL to a base URL without trailing slash.
    pub fn server_url(&self, alias_or_url: &str) -> Result<String, RegistryError> {
        let raw = if alias_or_url.starts_with("http://") || alias_or_url.starts_with("https://") {
            alias_or_url
        } else {
            self.servers
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(alias_or_url))
                .map(|(_, url)| url.as_str())
                .ok_or_else(|| RegistryError::UnknownServer(alias_or_url.to_string()))?
        };
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Target alias for the running build, if its repository is routed.
    pub fn target_for(&self, env: &CiEnvironment) -> Option<&str> {
        let route = self.routes.get(env.repository.as_deref()?)?;
        let on_main = env.branch.as_deref() == Some(self.main_branch.as_str());
        tracing::info!(
            "running in repo {:?} on branch {:?}",
            env.repository,
            env.branch
        );
        Some(if on_main {
            route.main.as_str()
        } else {
            route.other.as_str()
        })
    }

    /// Source alias for the running build.
    pub fn source_for(&self, env: &CiEnvironment) -> Option<&str> {
        env.repository
            .as_deref()
            .and_then(|repo| self.source_routes.get(repo))
            .or(self.default_source.as_ref())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.promote/config.yaml`: pure, no I/O.
pub fn user_config_path_at(home: &Path) -> PathBuf {
    home.join(".promote").join("config.yaml")
}

/// Load the config at `path`; a missing file is an error.
pub fn load_from(path: &Path) -> Result<Config, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| RegistryError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the repository config, falling back to the user config and then defaults.
pub fn load_at(repo_root: &Path, home: &Path) -> Result<Config, RegistryError> {
    for candidate in [repo_root.join(REPO_CONFIG_FILE), user_config_path_at(home)] {
        if candidate.exists() {
            tracing::debug!("using config {}", candidate.display());
            return load_from(&candidate);
        }
    }
    Ok(Config::default())
}

/// `load_at` convenience wrapper.
pub fn load(repo_root: &Path) -> Result<Config, RegistryError> {
    load_at(repo_root, &home()?)
}

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed() -> Config {
        let mut config = Config::default();
        config
            .servers
            .insert("Test".into(), "https://tracker-test.example.com/".into());
        config
            .servers
            .insert("Prod".into(), "https://tracker-prod.example.com".into());
        config.routes.insert(
            "templates".into(),
            Route {
                main: "Prod".into(),
                other: "Test".into(),
            },
        );
        config
    }

    #[test]
    fn server_url_accepts_alias_and_url() {
        let config = routed();
        assert_eq!(
            config.server_url("test").expect("alias"),
            "https://tracker-test.example.com"
        );
        assert_eq!(
            config.server_url("https://other.example.com/").expect("url"),
            "https://other.example.com"
        );
        assert!(matches!(
            config.server_url("Nope"),
            Err(RegistryError::UnknownServer(_))
        ));
    }

    #[test]
    fn target_follows_branch() {
        let config = routed();
        let main = CiEnvironment {
            repository: Some("templates".into()),
            branch: Some("main".into()),
        };
        let feature = CiEnvironment {
            repository: Some("templates".into()),
            branch: Some("feature/x".into()),
        };
        assert_eq!(config.target_for(&main), Some("Prod"));
        assert_eq!(config.target_for(&feature), Some("Test"));
        assert_eq!(config.target_for(&CiEnvironment::default()), None);
    }

    #[test]
    fn source_falls_back_to_default() {
        let mut config = routed();
        config.default_source = Some("Tmpl".into());
        config.source_routes.insert("tc".into(), "Tmpl-TC".into());
        let tc = CiEnvironment {
            repository: Some("tc".into()),
            branch: None,
        };
        assert_eq!(config.source_for(&tc), Some("Tmpl-TC"));
        assert_eq!(config.source_for(&CiEnvironment::default()), Some("Tmpl"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("default_admins: [fixcbjf]\n").expect("yaml");
        assert_eq!(config.main_branch, "main");
        assert_eq!(config.admin_role, 1);
        assert_eq!(config.default_admins, vec!["fixcbjf".to_string()]);
    }
}
