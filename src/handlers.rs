//! HTTP handlers and router assembly.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::SharedState;
use crate::auth::verify_slash_request;
use crate::command::{parse_command, validate};
use crate::github::DispatchError;
use crate::slack::{SlashPayload, SlashResponse, deploy_started_text, dispatch_failure_text};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route("/slack/deploy", routing::post(slack_deploy))
        .with_state(state)
}

pub async fn root() -> &'static str {
    "OK"
}

/// Returns the current server status and a config summary.
pub async fn status(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    Json(json!({
        "server": {
            "name": "slack_deploy_bot",
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "config": {
            "repos": state.config.repo.len(),
            "stages": state.config.allowed_stages.len(),
            "workflow": state.config.workflow,
        }
    }))
}

/// Handles the slash-command POST: authenticate, parse, validate, dispatch.
///
/// Once a request is authenticated every outcome is HTTP 200 with the
/// logical result in the JSON body; Slack renders non-200 responses as
/// opaque errors.
pub async fn slack_deploy(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Decode the form up front for team_id; the raw bytes stay untouched
    // because the signature covers them exactly as received.
    let payload: SlashPayload = match serde_urlencoded::from_bytes(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!("Could not decode slash payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let request_id = Uuid::now_v7();

    if let Err(reason) = verify_slash_request(
        &state.signing,
        &state.config.allowed_team_ids,
        &headers,
        &body,
        payload.team_id.as_deref(),
        Utc::now().timestamp(),
    ) {
        warn!("Request {} - rejected: {}", request_id, reason);
        return reason.into_response();
    }

    let text = payload.text.as_deref().unwrap_or("");
    let team_id = payload.team_id.as_deref().unwrap_or("");
    let user_id = payload.user_id.as_deref().unwrap_or("");

    let command = match parse_command(text, team_id, user_id, state.config.repo_in_command()) {
        Ok(c) => c,
        Err(e) => {
            info!("Request {} - usage help for text {:?}", request_id, text);
            return Json(SlashResponse::ephemeral(e.to_string())).into_response();
        }
    };

    let repo = match validate(&state.config, &command) {
        Ok(r) => r,
        Err(e) => {
            info!("Request {} - invalid command {:?}: {}", request_id, text, e);
            return Json(SlashResponse::ephemeral(e.to_string())).into_response();
        }
    };

    let git_ref = state.config.trigger_ref(repo, state.ref_override.as_deref());
    info!(
        "Request {} - dispatching {} on {} (ref '{}', stage '{}', branch '{}') for user {}",
        request_id,
        state.config.workflow,
        repo.repository,
        git_ref,
        command.stage,
        command.branch,
        command.user_id
    );

    match state
        .github
        .dispatch_workflow(
            &repo.repository,
            &state.config.workflow,
            git_ref,
            &command.stage,
            &command.branch,
        )
        .await
    {
        Ok(()) => {
            info!("Request {} - dispatch accepted", request_id);
            Json(SlashResponse::in_channel(deploy_started_text(&command))).into_response()
        }
        Err(e) => {
            // A rejection is an outcome; only transport faults are errors.
            match &e {
                DispatchError::Rejected { .. } => {
                    warn!("Request {} - dispatch rejected: {}", request_id, e)
                }
                DispatchError::Transport(_) => {
                    error!("Request {} - dispatch failed: {}", request_id, e)
                }
            }
            let text = dispatch_failure_text(&e, &repo.repository, &state.config.workflow);
            Json(SlashResponse::ephemeral(text)).into_response()
        }
    }
}
