use crate::origin::{self, OriginDecision, OriginPolicyConfig};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

pub(super) const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub(super) const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, Accept, Origin";
/// Preflight cache lifetime (24h).
pub(super) const PREFLIGHT_MAX_AGE_SECS: u32 = 86_400;

fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Denied preflights get an empty 403, other requests a JSON reason.
fn forbidden(preflight: bool) -> Response {
    if preflight {
        return StatusCode::FORBIDDEN.into_response();
    }
    let body = serde_json::json!({"error": "Origin not allowed"});
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

/// Origin policy middleware. Denied origins get 403 without any
/// `Access-Control-Allow-Origin`; allowed preflights are answered here.
pub(super) async fn enforce_origin(
    State(policy): State<Arc<OriginPolicyConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let preflight = is_preflight(&request);
    let request_origin = match request.headers().get(header::ORIGIN).map(HeaderValue::to_str) {
        None => None,
        Some(Ok(origin)) => Some(origin.to_owned()),
        Some(Err(_)) => {
            tracing::warn!(path = %request.uri().path(), "undecodable Origin header rejected");
            return forbidden(preflight);
        }
    };
    let decision = origin::evaluate(request_origin.as_deref(), &policy);

    if !decision.allowed {
        tracing::warn!(
            origin = request_origin.as_deref().unwrap_or_default(),
            path = %request.uri().path(),
            preflight,
            "origin rejected by CORS policy"
        );
        return forbidden(preflight);
    }

    tracing::debug!(
        origin = request_origin.as_deref().unwrap_or_default(),
        reason = %decision.reason,
        "origin allowed"
    );

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    apply_cors_headers(response.headers_mut(), &decision, &policy, preflight);
    response
}

fn apply_cors_headers(
    headers: &mut HeaderMap,
    decision: &OriginDecision,
    policy: &OriginPolicyConfig,
    preflight: bool,
) {
    let Some(echo) = decision.echo_origin.as_deref() else {
        return;
    };
    let Ok(value) = HeaderValue::from_str(echo) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);

    if decision.echoes_request_origin() {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
        if policy.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }

    if preflight {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(PREFLIGHT_MAX_AGE_SECS),
        );
    }
}
