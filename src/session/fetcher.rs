use super::remote::{TokenFetcher, TokenGrant};
use crate::error::TokenFetchError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// [`TokenFetcher`] that asks the proxy's `create-web-call` endpoint for a
/// token, the way the browser widget does.
pub struct HttpTokenFetcher {
    endpoint: Url,
    client: Client,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    agent_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    call_id: Option<String>,
}

impl HttpTokenFetcher {
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            endpoint,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Resolve a widget `proxy_endpoint` (absolute, or a path relative to
    /// `base_url`) into a fetcher.
    pub fn from_endpoint(
        proxy_endpoint: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TokenFetchError> {
        let endpoint = match Url::parse(proxy_endpoint) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = base_url.ok_or_else(|| {
                    TokenFetchError::Endpoint(format!(
                        "relative endpoint {proxy_endpoint} needs a base URL"
                    ))
                })?;
                Url::parse(base)
                    .and_then(|base| base.join(proxy_endpoint))
                    .map_err(|e| TokenFetchError::Endpoint(e.to_string()))?
            }
            Err(e) => return Err(TokenFetchError::Endpoint(e.to_string())),
        };
        Ok(Self::new(endpoint, timeout))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(&self, agent_id: &str) -> Result<TokenGrant, TokenFetchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&TokenRequest { agent_id })
            .send()
            .await
            .map_err(|e| TokenFetchError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TokenFetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|body| body.get("error").and_then(|v| v.as_str()).map(String::from))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(TokenFetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|_| TokenFetchError::MissingToken)?;
        match parsed.access_token {
            Some(access_token) if !access_token.trim().is_empty() => Ok(TokenGrant {
                access_token,
                call_id: parsed.call_id,
            }),
            _ => Err(TokenFetchError::MissingToken),
        }
    }
}

impl TokenFetcher for HttpTokenFetcher {
    fn fetch_token<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, TokenFetchError>> + Send + 'a>> {
        Box::pin(self.request(agent_id))
    }
}

impl std::fmt::Debug for HttpTokenFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}
