//! Blocking HTTP client with basic authentication.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use promote_validate::TransportError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Environment variable holding the server account name.
pub const ENV_USERNAME: &str = "PROMOTE_USERNAME";
/// Environment variable holding the server account password.
pub const ENV_PASSWORD: &str = "PROMOTE_PASSWORD";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Account used to talk to the target server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials from [`ENV_USERNAME`] and [`ENV_PASSWORD`], if both are set.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(ENV_USERNAME).ok().filter(|v| !v.is_empty())?;
        let password = std::env::var(ENV_PASSWORD).ok()?;
        Some(Self::new(username, password))
    }

    /// `Authorization` header value.
    pub fn basic_auth(&self) -> String {
        let token = BASE64.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// JSON-over-HTTP access to one server.
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
}

impl HttpClient {
    pub fn new(base_url: &str, credentials: &Credentials, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: credentials.basic_auth(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.url(path);
        let response = self
            .request("GET", &url)
            .call()
            .map_err(|e| map_error("GET", &url, e))?;
        decode(&url, response)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.url(path);
        let response = self
            .request("POST", &url)
            .send_json(body)
            .map_err(|e| map_error("POST", &url, e))?;
        decode(&url, response)
    }

    /// POST a JSON body, ignoring the response body.
    pub fn post_json_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), TransportError> {
        let url = self.url(path);
        self.request("POST", &url)
            .send_json(body)
            .map_err(|e| map_error("POST", &url, e))?;
        Ok(())
    }

    pub fn post_bytes(
        &self,
        path: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let url = self.url(path);
        self.request("POST", &url)
            .set("Content-Type", content_type)
            .send_bytes(bytes)
            .map_err(|e| map_error("POST", &url, e))?;
        Ok(())
    }

    pub fn put(&self, path: &str) -> Result<(), TransportError> {
        let url = self.url(path);
        self.request("PUT", &url)
            .call()
            .map_err(|e| map_error("PUT", &url, e))?;
        Ok(())
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        tracing::debug!("{method} {url}");
        self.agent
            .request(method, url)
            .set("Authorization", &self.authorization)
            .set("Accept", "application/json")
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, TransportError> {
    response.into_json().map_err(|e| TransportError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Convert a ureq failure, keeping the response body of error statuses.
pub fn map_error(method: &'static str, url: &str, error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Status(status, response) => TransportError::Status {
            method,
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => TransportError::Connection {
            method,
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let credentials = Credentials::new("deploy", "s3cret");
        assert_eq!(credentials.basic_auth(), "Basic ZGVwbG95OnMzY3JldA==");
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", Credentials::new("deploy", "s3cret"));
        assert!(shown.contains("deploy"));
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn urls_join_without_double_slash() {
        let client = HttpClient::new(
            "https://tracker.example.com/",
            &Credentials::new("u", "p"),
            DEFAULT_TIMEOUT,
        );
        assert_eq!(client.base_url(), "https://tracker.example.com");
        assert_eq!(
            client.url("/api/v3/projects"),
            "https://tracker.example.com/api/v3/projects"
        );
    }

    #[test]
    fn status_errors_keep_body() {
        let response = ureq::Response::new(403, "Forbidden", "no access").expect("response");
        let err = map_error("PUT", "https://x/rest", ureq::Error::Status(403, response));
        match err {
            TransportError::Status { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "no access");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
