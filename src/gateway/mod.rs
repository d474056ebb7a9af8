//! Axum-based token proxy: the only component that holds the voice API key.
//!
//! Routes:
//! - `GET /health`: liveness plus CORS mode and API-key state
//! - `POST /api/create-web-call`: agent id in, short-lived access token out
//! - anything else: 404 listing the available endpoints
//!
//! Every request passes the origin policy first; `/api/*` is rate limited per
//! client IP, with a tighter budget on the token endpoint. Bodies are capped
//! and requests time out so slow clients cannot pin connections. Every
//! response, rejections included, carries the baseline security headers.

mod cors;
mod handlers;
pub mod rate_limit;

pub use handlers::{CreateWebCallBody, MIN_AGENT_ID_LEN};
pub use rate_limit::IpRateLimiter;

use crate::config::Config;
use crate::error::ApiKeyError;
use crate::origin::OriginPolicyConfig;
use crate::upstream::{self, RetellClient, WebCallIssuer};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware,
    routing::{get, post},
};
use handlers::{handle_create_web_call, handle_health, handle_not_found, handle_panic};
use rate_limit::{GENERAL_LIMIT_MESSAGE, RateLimitLayerState, TOKEN_LIMIT_MESSAGE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

/// Static response headers, lowercase names.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-dns-prefetch-control", "off"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<OriginPolicyConfig>,
    /// The configured issuer, or why the key cannot be used. Key problems
    /// are reported per request, never at startup.
    pub issuer: Result<Arc<dyn WebCallIssuer>, ApiKeyError>,
    pub api_key_state: &'static str,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let api_key = config.upstream.api_key.as_deref();
        let issuer = upstream::check_api_key(api_key).map(|key| {
            Arc::new(RetellClient::new(
                key,
                &config.upstream.base_url,
                config.upstream.timeout_secs,
            )) as Arc<dyn WebCallIssuer>
        });
        Self {
            policy: Arc::new(config.origin_policy()),
            issuer,
            api_key_state: upstream::api_key_state(api_key),
        }
    }
}

/// Router-level limits, resolved from `[gateway]` and `[rate_limit]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub rate_window: Duration,
    pub general_max: u32,
    pub token_max: u32,
    pub trust_forwarded_for: bool,
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_body_bytes: config.gateway.max_body_bytes,
            request_timeout: Duration::from_secs(config.gateway.request_timeout_secs),
            rate_window: Duration::from_secs(config.rate_limit.window_secs),
            general_max: config.rate_limit.general_max,
            token_max: config.rate_limit.token_max,
            trust_forwarded_for: config.gateway.trust_forwarded_for,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Assemble the full middleware stack around the routes.
pub fn build_router(state: AppState, settings: &RouterSettings) -> Router {
    let general_limit = RateLimitLayerState {
        limiter: Arc::new(IpRateLimiter::new(
            settings.general_max,
            settings.rate_window,
        )),
        message: GENERAL_LIMIT_MESSAGE,
        trust_forwarded_for: settings.trust_forwarded_for,
    };
    let token_limit = RateLimitLayerState {
        limiter: Arc::new(IpRateLimiter::new(settings.token_max, settings.rate_window)),
        message: TOKEN_LIMIT_MESSAGE,
        trust_forwarded_for: settings.trust_forwarded_for,
    };

    let api = Router::new()
        .route(
            "/create-web-call",
            post(handle_create_web_call).route_layer(middleware::from_fn_with_state(
                token_limit,
                rate_limit::enforce,
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            general_limit,
            rate_limit::enforce,
        ));

    let policy = Arc::clone(&state.policy);
    let router = Router::new()
        .route("/health", get(handle_health))
        .nest("/api", api)
        .fallback(handle_not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            settings.request_timeout,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(policy, cors::enforce_origin));
    with_security_headers(router)
}

/// Baseline hardening headers on every response, including policy rejections.
/// `Cross-Origin-Resource-Policy` is left unset so embedding pages on other
/// origins can still read token responses.
fn with_security_headers(router: Router) -> Router {
    SECURITY_HEADERS
        .iter()
        .fold(router, |router, &(name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

/// Run the proxy on `host:port` until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    run_gateway_with_listener(host, listener, config).await
}

/// Run the proxy from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let actual_port = listener.local_addr()?.port();
    let state = AppState::from_config(&config);
    let settings = RouterSettings::from_config(&config);

    log_banner(host, actual_port, &config, &state);

    let app = build_router(state, &settings);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("proxy stopped");
    Ok(())
}

fn log_banner(host: &str, port: u16, config: &Config, state: &AppState) {
    tracing::info!(
        addr = %format!("{host}:{port}"),
        environment = %config.environment,
        cors = state.policy.mode_label(),
        api_key = state.api_key_state,
        "proxy listening"
    );
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/create-web-call");

    if let Err(err) = &state.issuer {
        tracing::warn!("{err}: {}", err.hint());
    }
    if state.policy.mode_label() == "unconfigured" {
        tracing::warn!("ALLOWED_ORIGINS is empty; every origin is accepted until it is set");
    }
    if state.policy.universal_access {
        tracing::warn!("UNIVERSAL_ACCESS is on; every origin is accepted");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
