use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `callgate`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; startup code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum CallgateError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Call session ────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Token fetch (widget side) ───────────────────────────────────────
    #[error("token: {0}")]
    Token(#[from] TokenFetchError),

    // ── Upstream voice API ──────────────────────────────────────────────
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with the upstream API key. Reported per request (HTTP 500),
/// never at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApiKeyError {
    #[error("Server configuration error: Missing API key")]
    Missing,

    #[error("Server configuration error: Invalid API key format")]
    InvalidFormat,
}

impl ApiKeyError {
    pub fn hint(self) -> &'static str {
        match self {
            Self::Missing => "Set RETELL_API_KEY in the server environment or .env file",
            Self::InvalidFormat => "API key should start with retell_sk_",
        }
    }
}

// ─── Session errors ─────────────────────────────────────────────────────────

/// Errors surfaced by the call session state machine. None of them are
/// fatal: the controller always returns to `Idle` and stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Failed to start call: {0}")]
    TokenFetchFailed(String),

    #[error("Failed to start call: missing agent id")]
    MissingAgentId,

    #[error("Failed to start call: {0}")]
    RemoteClientInitFailed(String),

    #[error("Call failed: {0}")]
    RemoteCallError(String),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenFetchFailed(_) => "token_fetch_failed",
            Self::MissingAgentId => "missing_agent_id",
            Self::RemoteClientInitFailed(_) => "remote_client_init_failed",
            Self::RemoteCallError(_) => "remote_call_error",
        }
    }
}

// ─── Token fetch errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TokenFetchError {
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("response did not contain an access token")]
    MissingToken,

    #[error("invalid proxy endpoint: {0}")]
    Endpoint(String),

    #[error("request failed: {0}")]
    Transport(String),
}

// ─── Upstream errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    #[error("upstream request timed out after {0}s")]
    Timeout(u64),

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream response malformed: {0}")]
    MalformedResponse(String),
}

impl UpstreamError {
    /// The `error` field of an upstream error body, when it is a string.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body.get("error").and_then(serde_json::Value::as_str),
            _ => None,
        }
    }
}
