//! The target tracker server behind the validation collaborators.
//!
//! Reads always reach the server. With `dry_run` set, every mutating call is
//! logged and skipped.

use std::path::{Path, PathBuf};

use promote_core::types::{RemoteId, RemoteProject};
use promote_validate::{
    AdminMember, Baseline, DeploymentDriver, NameQuery, ProjectDirectory, TransportError,
    UserDirectory, UserSearch,
};
use serde::Serialize;

use crate::client::HttpClient;

pub const USER_SEARCH_PATH: &str = "/api/v3/users/search?page=1&pageSize=1";
pub const PROJECTS_PATH: &str = "/api/v3/projects";
pub const BASELINES_PATH: &str = "/api/v3/baselines";
pub const DEPLOY_PATH: &str = "/api/v3/projects/deploy-horizontal";

/// Path granting `member` the role `role` in `project`.
pub fn role_member_path(project: RemoteId, role: u32, member: &AdminMember) -> String {
    format!("/rest/project/{project}/role/{role}/{member}")
}

#[derive(Debug, Serialize)]
struct BaselineRequest<'a> {
    name: &'a str,
    description: &'a str,
    project: ProjectRef,
}

#[derive(Debug, Serialize)]
struct ProjectRef {
    id: RemoteId,
}

/// Tracker server reached over HTTP.
pub struct TrackerServer {
    client: HttpClient,
    /// Directory deployment packages are read from.
    repo_root: PathBuf,
    dry_run: bool,
}

impl TrackerServer {
    pub fn new(client: HttpClient, repo_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            client,
            repo_root: repo_root.into(),
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    fn skip(&self, action: &str) -> bool {
        if self.dry_run {
            tracing::info!("[dry-run] would {action}");
        }
        self.dry_run
    }
}

impl UserDirectory for TrackerServer {
    fn search(&self, query: &NameQuery) -> Result<UserSearch, TransportError> {
        self.client.post_json(USER_SEARCH_PATH, query)
    }
}

impl ProjectDirectory for TrackerServer {
    fn projects(&self) -> Result<Vec<RemoteProject>, TransportError> {
        let projects: Vec<RemoteProject> = self.client.get_json(PROJECTS_PATH)?;
        tracing::debug!("{} project(s) on {}", projects.len(), self.base_url());
        Ok(projects)
    }
}

impl DeploymentDriver for TrackerServer {
    fn create_baseline(&self, project: RemoteId, baseline: &Baseline) -> Result<(), TransportError> {
        if self.skip(&format!("create baseline '{}' in {project}", baseline.name)) {
            return Ok(());
        }
        let body = BaselineRequest {
            name: &baseline.name,
            description: &baseline.description,
            project: ProjectRef { id: project },
        };
        self.client.post_json_unit(BASELINES_PATH, &body)
    }

    fn deploy_package(&self, package: &Path) -> Result<(), TransportError> {
        if self.skip(&format!("deploy {}", package.display())) {
            return Ok(());
        }
        let path = self.repo_root.join(package);
        let bytes =
            std::fs::read(&path).map_err(|source| TransportError::Upload { path, source })?;
        self.client.post_bytes(DEPLOY_PATH, "application/zip", &bytes)
    }

    fn add_project_admin(
        &self,
        project: RemoteId,
        role: u32,
        member: &AdminMember,
    ) -> Result<(), TransportError> {
        if self.skip(&format!("add {member} to role {role} of project {project}")) {
            return Ok(());
        }
        self.client.put(&role_member_path(project, role, member))
    }

    fn members_url(&self, project: RemoteId) -> String {
        self.client.url(&format!("/project/{project}/members"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Credentials, DEFAULT_TIMEOUT};

    #[test]
    fn role_paths() {
        assert_eq!(
            role_member_path(RemoteId(12), 1, &AdminMember::User("fixc9ms".into())),
            "/rest/project/12/role/1/user/fixc9ms"
        );
        assert_eq!(
            role_member_path(RemoteId(12), 1, &AdminMember::Group("ALM-DEPLOY".into())),
            "/rest/project/12/role/1/group/ALM-DEPLOY"
        );
    }

    #[test]
    fn dry_run_never_sends_mutations() {
        // Port 9 (discard) on localhost: any real request would fail.
        let client = HttpClient::new(
            "http://127.0.0.1:9",
            &Credentials::new("u", "p"),
            DEFAULT_TIMEOUT,
        );
        let server = TrackerServer::new(client, ".", true);
        let baseline = Baseline {
            name: "Before deployment - abc (2024_01_01T00_00_00)".into(),
            description: "me: msg".into(),
        };
        server.create_baseline(RemoteId(1), &baseline).expect("baseline");
        server
            .deploy_package(Path::new("Foo/Foo.deployment.zip"))
            .expect("deploy");
        server
            .add_project_admin(RemoteId(1), 1, &AdminMember::User("me".into()))
            .expect("admin");
        assert_eq!(server.members_url(RemoteId(1)), "http://127.0.0.1:9/project/1/members");
    }

    #[test]
    fn baseline_request_shape() {
        let body = BaselineRequest {
            name: "n",
            description: "d",
            project: ProjectRef { id: RemoteId(7) },
        };
        assert_eq!(
            serde_json::to_string(&body).expect("json"),
            r#"{"name":"n","description":"d","project":{"id":7}}"#
        );
    }
}
