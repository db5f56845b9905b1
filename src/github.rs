//! GitHub Actions workflow dispatch client.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;

use crate::error::Result;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Failure classes the chat reply switches on, derived from the upstream
/// status code rather than by scanning error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    AuthenticationFailed,
    NotFound,
    PermissionDenied,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("GitHub dispatch failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub dispatch failed ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Rejected { status: 401, .. } => FailureKind::AuthenticationFailed,
            DispatchError::Rejected { status: 403, .. } => FailureKind::PermissionDenied,
            DispatchError::Rejected { status: 404, .. } => FailureKind::NotFound,
            _ => FailureKind::Other,
        }
    }
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: DispatchInputs<'a>,
}

#[derive(Debug, Serialize)]
struct DispatchInputs<'a> {
    stage: &'a str,
    branch: &'a str,
}

/// Client for the workflow dispatch endpoint. Built once at startup and
/// shared across requests; the base URL is injectable so tests can stand
/// in for the real API.
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl GithubClient {
    pub fn new(token: String, base_url: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Triggers one workflow run. `repository` is the `owner/repo` slug;
    /// `git_ref` is the ref the workflow file is read from, while stage and
    /// branch travel as workflow inputs. GitHub answers 204 on success.
    pub async fn dispatch_workflow(
        &self,
        repository: &str,
        workflow: &str,
        git_ref: &str,
        stage: &str,
        branch: &str,
    ) -> std::result::Result<(), DispatchError> {
        let url = format!(
            "{}/repos/{}/actions/workflows/{}/dispatches",
            self.base_url, repository, workflow
        );
        let payload = DispatchRequest {
            git_ref,
            inputs: DispatchInputs { stage, branch },
        };

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.text().await.unwrap_or_default();
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
