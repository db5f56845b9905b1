//! Slack request authentication: timestamp-bounded HMAC signature
//! verification with replay protection.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Maximum accepted age (and future skew) of a signed request, in seconds.
pub const REQUEST_TTL_SECONDS: u64 = 300;

const SIGNATURE_PREFIX: &str = "v0=";

/// Shared signing secret plus the accepted request age.
/// Loaded once at startup and never mutated.
#[derive(Clone)]
pub struct SigningContext {
    secret: String,
    ttl_seconds: u64,
}

impl SigningContext {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            ttl_seconds: REQUEST_TTL_SECONDS,
        }
    }
}

// The secret must never reach the logs, even via {:?}.
impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Why a request was rejected before reaching the command pipeline.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Slack headers")]
    MissingHeaders,

    #[error("Missing raw body")]
    MissingBody,

    #[error("Stale Slack request")]
    StaleRequest,

    #[error("Invalid Slack signature")]
    InvalidSignature,

    #[error("Team not allowed")]
    ForbiddenTeam,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            // Bare 403, no reason text.
            AuthError::ForbiddenTeam => StatusCode::FORBIDDEN.into_response(),
            other => (StatusCode::UNAUTHORIZED, other.to_string()).into_response(),
        }
    }
}

/// Verifies an inbound slash-command request.
///
/// Check order: team allow-list, header presence, body presence, staleness,
/// then the signature. Earlier checks are cheaper and fail fast; only the
/// signature comparison needs to be constant-time.
pub fn verify_slash_request(
    ctx: &SigningContext,
    allowed_team_ids: &[String],
    headers: &HeaderMap,
    body: &[u8],
    team_id: Option<&str>,
    now: i64,
) -> Result<(), AuthError> {
    // Team check runs first when an allow-list is configured; an empty
    // list disables it.
    if !allowed_team_ids.is_empty() {
        let allowed = team_id
            .map(|id| allowed_team_ids.iter().any(|t| t == id))
            .unwrap_or(false);
        if !allowed {
            return Err(AuthError::ForbiddenTeam);
        }
    }

    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let (timestamp, signature) = match (timestamp, signature) {
        (Some(t), Some(s)) => (t, s),
        _ => return Err(AuthError::MissingHeaders),
    };

    if body.is_empty() {
        return Err(AuthError::MissingBody);
    }

    // A timestamp that does not parse is as unusable as an expired one.
    // A plain signed subtraction would overflow on far-out header values.
    let ts: i64 = timestamp.parse().map_err(|_| AuthError::StaleRequest)?;
    if now.abs_diff(ts) > ctx.ttl_seconds {
        return Err(AuthError::StaleRequest);
    }

    let claimed = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(AuthError::InvalidSignature)?;
    let claimed = hex_decode(claimed).map_err(|_| AuthError::InvalidSignature)?;

    // Signed message is "v0:{timestamp}:{body}". The body is fed as raw
    // bytes; re-serializing a parsed form would break verification.
    let mut mac = match HmacSha256::new_from_slice(ctx.secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err(AuthError::InvalidSignature),
    };
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&claimed)
        .map_err(|_| AuthError::InvalidSignature)
}
