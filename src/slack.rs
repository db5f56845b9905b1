//! Slack wire types and chat response formatting.

use serde::{Deserialize, Serialize};

use crate::command::DeployCommand;
use crate::github::{DispatchError, FailureKind};

/// Form fields Slack posts with a slash command. Everything is optional on
/// the wire; unknown fields (token, channel_id, ...) are ignored.
#[derive(Debug, Deserialize)]
pub struct SlashPayload {
    pub team_id: Option<String>,
    pub user_id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Visible only to the requesting user.
    Ephemeral,
    /// Visible to the whole channel.
    InChannel,
}

/// The JSON body Slack renders as the command's reply.
#[derive(Debug, Serialize)]
pub struct SlashResponse {
    pub response_type: ResponseType,
    pub text: String,
}

impl SlashResponse {
    pub fn ephemeral(text: String) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text,
        }
    }

    pub fn in_channel(text: String) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text,
        }
    }
}

/// Public confirmation posted to the channel after a successful dispatch.
pub fn deploy_started_text(command: &DeployCommand) -> String {
    let mut text = String::from("🚀 Deployment started\n");
    if let Some(repo) = &command.repo {
        text.push_str(&format!("• Repo: `{}`\n", repo));
    }
    text.push_str(&format!(
        "• Stage: `{}`\n• Branch: `{}`\n• Triggered by: <@{}>",
        command.stage, command.branch, command.user_id
    ));
    text
}

/// Private explanation for a failed dispatch, worded per failure class.
pub fn dispatch_failure_text(err: &DispatchError, repository: &str, workflow: &str) -> String {
    match err.kind() {
        FailureKind::AuthenticationFailed => {
            "GitHub rejected the token (401). Check that GITHUB_TOKEN is set and has not expired."
                .to_string()
        }
        FailureKind::NotFound => format!(
            "GitHub returned 404 Not Found. Check that repository `{}` and workflow `{}` exist.",
            repository, workflow
        ),
        FailureKind::PermissionDenied => {
            "GitHub refused the dispatch (403). The token is missing the workflow scope or access to the repository."
                .to_string()
        }
        FailureKind::Other => format!("Deployment failed to start.\n```\n{}\n```", err),
    }
}
