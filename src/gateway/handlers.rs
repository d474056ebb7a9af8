use crate::error::UpstreamError;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;

use super::AppState;

/// Agent ids shorter than this are rejected before any upstream call.
pub const MIN_AGENT_ID_LEN: usize = 5;

/// Request body for `POST /api/create-web-call`. Both spellings of the agent
/// id are accepted; `agent_id` wins when both are present. Surrounding
/// whitespace is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CreateWebCallBody {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default, rename = "agentId")]
    pub agent_id_alias: Option<String>,
}

impl CreateWebCallBody {
    fn agent_id(&self) -> Option<&str> {
        [&self.agent_id, &self.agent_id_alias]
            .into_iter()
            .filter_map(Option::as_deref)
            .map(str::trim)
            .find(|id| !id.is_empty())
    }
}

type JsonResponse = (StatusCode, Json<Value>);

fn json_error(status: StatusCode, error: &str, hint: Option<&str>) -> JsonResponse {
    let body = match hint {
        Some(hint) => json!({ "error": error, "hint": hint }),
        None => json!({ "error": error }),
    };
    (status, Json(body))
}

/// GET /health. Reports key state, never the key itself.
pub(super) async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "cors": state.policy.mode_label(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "apiKey": state.api_key_state,
    }))
}

/// POST /api/create-web-call: trade an agent id for a short-lived access token.
pub(super) async fn handle_create_web_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> JsonResponse {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");

    // ── Parse body ──
    let request: CreateWebCallBody = if body.iter().all(u8::is_ascii_whitespace) {
        CreateWebCallBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(origin, "rejecting token request with invalid JSON: {e}");
                let error = format!("Invalid JSON: {e}");
                return json_error(StatusCode::BAD_REQUEST, &error, None);
            }
        }
    };

    // ── Validate agent id ──
    let Some(agent_id) = request.agent_id() else {
        tracing::warn!(origin, "token request without agent id");
        return json_error(
            StatusCode::BAD_REQUEST,
            "Missing required parameter: agent_id or agentId",
            Some("Include either agent_id or agentId in your request body"),
        );
    };
    if agent_id.chars().count() < MIN_AGENT_ID_LEN {
        tracing::warn!(origin, agent_id, "token request with malformed agent id");
        return json_error(
            StatusCode::BAD_REQUEST,
            "Invalid agent_id format",
            Some("Agent ID should be a string from your Retell dashboard"),
        );
    }

    // ── API key ──
    let issuer = match &state.issuer {
        Ok(issuer) => issuer,
        Err(key_error) => {
            tracing::error!("cannot issue token: {key_error}");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &key_error.to_string(),
                Some(key_error.hint()),
            );
        }
    };

    tracing::info!(origin, agent_id, "creating web call");
    match issuer.create_web_call(agent_id).await {
        Ok(call) => {
            tracing::info!(agent_id, call_id = call.call_id.as_deref(), "web call created");
            (StatusCode::OK, Json(json!(call)))
        }
        Err(err) => upstream_failure(agent_id, &err),
    }
}

fn upstream_failure(agent_id: &str, err: &UpstreamError) -> JsonResponse {
    match err {
        UpstreamError::Status { status, body } => {
            tracing::warn!(agent_id, status, body = %body, "voice API rejected web call");
            let message = err.upstream_message();
            match *status {
                401 => json_error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid API key",
                    Some("Check your RETELL_API_KEY in server/.env"),
                ),
                400 if message.is_some_and(|m| m.to_lowercase().contains("agent")) => json_error(
                    StatusCode::BAD_REQUEST,
                    "Invalid agent ID",
                    Some("Check that your agent ID is correct and active in your Retell dashboard"),
                ),
                other => {
                    let status =
                        StatusCode::from_u16(other).unwrap_or(StatusCode::BAD_GATEWAY);
                    let body = json!({
                        "error": message.unwrap_or("Failed to create web call"),
                        "details": body,
                    });
                    (status, Json(body))
                }
            }
        }
        UpstreamError::Timeout(secs) => {
            tracing::warn!(agent_id, secs, "voice API timed out");
            json_error(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out", None)
        }
        UpstreamError::Transport(message) | UpstreamError::MalformedResponse(message) => {
            tracing::error!(agent_id, "voice API call failed: {message}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Failed to create web call",
                    "message": message,
                })),
            )
        }
    }
}

/// Fallback for unknown routes
pub(super) async fn handle_not_found() -> JsonResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "available": ["/health", "/api/create-web-call"],
        })),
    )
}

/// Converts a handler panic into a plain 500 without leaking the payload.
pub(super) fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("request handler panicked: {detail}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None).into_response()
}
