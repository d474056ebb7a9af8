//! Proxy-side exchange with the third-party voice API.
//!
//! The gateway never hands the secret API key to the browser: it calls
//! [`WebCallIssuer::create_web_call`] and forwards only the short-lived
//! access token.

mod retell;

pub use retell::RetellClient;

use crate::error::{ApiKeyError, UpstreamError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Required prefix of a secret key issued by the voice API dashboard.
pub const API_KEY_PREFIX: &str = "retell_sk_";

/// A freshly created web call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCall {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// Exchanges an agent id for a web-call access token.
pub trait WebCallIssuer: Send + Sync {
    fn create_web_call<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WebCall, UpstreamError>> + Send + 'a>>;
}

/// Check that a configured key is present and well-formed.
pub fn check_api_key(api_key: Option<&str>) -> Result<&str, ApiKeyError> {
    let key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ApiKeyError::Missing)?;
    if key.starts_with(API_KEY_PREFIX) {
        Ok(key)
    } else {
        Err(ApiKeyError::InvalidFormat)
    }
}

/// Human-readable key state for the startup banner and `/health`.
pub fn api_key_state(api_key: Option<&str>) -> &'static str {
    match check_api_key(api_key) {
        Ok(_) => "configured",
        Err(ApiKeyError::Missing) => "missing",
        Err(ApiKeyError::InvalidFormat) => "invalid_format",
    }
}
