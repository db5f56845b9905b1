pub mod auth;
pub mod command;
pub mod error;
pub mod github;
pub mod handlers;
pub mod slack;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::SigningContext;
use crate::error::{DeployBotError, Result};
use crate::github::GithubClient;

#[derive(Debug, Deserialize, Clone)]
pub struct DeployConfig {
    /// Slack workspaces allowed to call the command. Empty disables the check.
    #[serde(default)]
    pub allowed_team_ids: Vec<String>,
    pub allowed_stages: Vec<String>,
    /// Workflow file name or id passed to the dispatch endpoint.
    pub workflow: String,
    pub default_ref: Option<String>,
    pub repo_in_command: Option<bool>,
    pub repo: Vec<RepoConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    /// Short name users type in the command.
    pub name: String,
    /// The `owner/repo` slug used in the API path.
    pub repository: String,
    pub default_ref: Option<String>,
}

impl DeployConfig {
    /// Returns true if the command's first token names the target repo
    /// (3-token mode). Defaults to true.
    pub fn repo_in_command(&self) -> bool {
        self.repo_in_command.unwrap_or(true)
    }

    pub fn is_allowed_stage(&self, stage: &str) -> bool {
        self.allowed_stages.iter().any(|s| s == stage)
    }

    /// Looks up the dispatch target: by name in 3-token mode, the single
    /// configured repo otherwise.
    pub fn resolve_repo(&self, name: Option<&str>) -> Option<&RepoConfig> {
        match name {
            Some(n) => self.repo.iter().find(|r| r.name == n),
            None => self.repo.first(),
        }
    }

    pub fn repo_names(&self) -> Vec<&str> {
        self.repo.iter().map(|r| r.name.as_str()).collect()
    }

    /// Ref the workflow file is read from. Precedence: environment override,
    /// per-repo default, config-wide default, then "main".
    pub fn trigger_ref<'a>(
        &'a self,
        repo: &'a RepoConfig,
        env_override: Option<&'a str>,
    ) -> &'a str {
        env_override
            .or(repo.default_ref.as_deref())
            .or(self.default_ref.as_deref())
            .unwrap_or("main")
    }

    /// Startup validation; runs once after parsing, before the server binds.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_stages.is_empty() {
            return Err(DeployBotError::ConfigError(
                "allowed_stages must list at least one stage".to_string(),
            ));
        }
        if self.repo.is_empty() {
            return Err(DeployBotError::ConfigError(
                "at least one [[repo]] entry is required".to_string(),
            ));
        }
        if !self.repo_in_command() && self.repo.len() > 1 {
            return Err(DeployBotError::ConfigError(
                "repo_in_command = false expects exactly one [[repo]] entry".to_string(),
            ));
        }
        for (i, repo) in self.repo.iter().enumerate() {
            let well_formed = repo
                .repository
                .split_once('/')
                .map(|(owner, name)| {
                    !owner.is_empty() && !name.is_empty() && !name.contains('/')
                })
                .unwrap_or(false);
            if !well_formed {
                return Err(DeployBotError::ConfigError(format!(
                    "repo '{}': repository '{}' is not an owner/repo slug",
                    repo.name, repo.repository
                )));
            }
            if self.repo[..i].iter().any(|r| r.name == repo.name) {
                return Err(DeployBotError::ConfigError(format!(
                    "duplicate repo name '{}'",
                    repo.name
                )));
            }
        }
        Ok(())
    }
}

pub struct AppState {
    pub config: DeployConfig,
    pub signing: SigningContext,
    pub github: GithubClient,
    /// GITHUB_REF_OVERRIDE, captured once at startup.
    pub ref_override: Option<String>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;
