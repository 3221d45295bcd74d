//! GitHub contents API publish adapter.

use crate::domain::error::DipLadderError;
use crate::ports::publish_port::{PublishOutcome, PublishPort, PublishRequest};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const TOKEN_ENV: &str = "TOKEN";

/// Where and as whom to publish. Built once from config and environment.
#[derive(Clone, PartialEq)]
pub struct GitHubConfig {
    pub api_url: String,
    /// `owner/name`.
    pub repo: String,
    pub branch: String,
    pub token: String,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

pub struct GitHubAdapter {
    client: Client,
    config: GitHubConfig,
}

fn publish_error(path: &str, reason: impl Into<String>) -> DipLadderError {
    DipLadderError::Publish {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Map a PUT status to an outcome; `None` for statuses that are errors.
pub fn outcome_for_status(status: StatusCode) -> Option<PublishOutcome> {
    match status {
        StatusCode::OK => Some(PublishOutcome::Updated),
        StatusCode::CREATED => Some(PublishOutcome::Created),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Some(PublishOutcome::Conflict),
        StatusCode::NOT_FOUND => Some(PublishOutcome::NotFound),
        _ => None,
    }
}

impl GitHubAdapter {
    pub fn new(config: GitHubConfig) -> Result<Self, DipLadderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("dipladder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                publish_error(&config.repo, format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, config })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            path
        )
    }

    fn payload<'a>(&'a self, request: &'a PublishRequest) -> PutContents<'a> {
        PutContents {
            message: &request.message,
            content: STANDARD.encode(&request.content),
            branch: &self.config.branch,
            sha: request.sha.as_deref(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", "application/vnd.github.v3+json")
    }
}

impl PublishPort for GitHubAdapter {
    fn existing_sha(&self, path: &str) -> Result<Option<String>, DipLadderError> {
        let resp = self
            .authorized(self.client.get(format!(
                "{}?ref={}",
                self.contents_url(path),
                self.config.branch
            )))
            .send()
            .map_err(|e| publish_error(path, e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: ContentsResponse = resp
                    .json()
                    .map_err(|e| publish_error(path, format!("invalid contents response: {e}")))?;
                debug!(path, sha = ?body.sha, "found existing file");
                Ok(body.sha)
            }
            StatusCode::NOT_FOUND => {
                debug!(path, "file does not exist yet");
                Ok(None)
            }
            status => {
                let body = resp.text().unwrap_or_default();
                error!(path, %status, %body, "failed to fetch file sha");
                Err(publish_error(path, format!("HTTP {status} fetching sha")))
            }
        }
    }

    fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, DipLadderError> {
        let resp = self
            .authorized(self.client.put(self.contents_url(&request.path)))
            .json(&self.payload(request))
            .send()
            .map_err(|e| publish_error(&request.path, e.to_string()))?;

        let status = resp.status();
        match outcome_for_status(status) {
            Some(outcome) => Ok(outcome),
            None => {
                let body = resp.text().unwrap_or_default();
                error!(path = %request.path, %status, %body, "publish failed");
                Err(publish_error(&request.path, format!("HTTP {status}")))
            }
        }
    }
}
