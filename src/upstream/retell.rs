use super::{WebCall, WebCallIssuer};
use crate::error::UpstreamError;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub struct RetellClient {
    api_key: String,
    create_web_call_url: String,
    timeout_secs: u64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CreateWebCallRequest<'a> {
    agent_id: &'a str,
}

impl RetellClient {
    pub fn new(api_key: &str, base_url: &str, timeout_secs: u64) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            api_key: api_key.to_string(),
            create_web_call_url: format!("{base}/v2/create-web-call"),
            timeout_secs,
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn map_send_error(&self, err: &reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout_secs)
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }

    async fn send(&self, agent_id: &str) -> Result<WebCall, UpstreamError> {
        let response = self
            .client
            .post(&self.create_web_call_url)
            .bearer_auth(&self.api_key)
            .json(&CreateWebCallRequest { agent_id })
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        if !status.is_success() {
            let body = serde_json::from_str::<serde_json::Value>(&text)
                .unwrap_or_else(|_| serde_json::Value::String(text));
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let call: WebCall = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;
        if call.access_token.trim().is_empty() {
            return Err(UpstreamError::MalformedResponse(
                "empty access_token".into(),
            ));
        }
        Ok(call)
    }
}

impl WebCallIssuer for RetellClient {
    fn create_web_call<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<WebCall, UpstreamError>> + Send + 'a>> {
        Box::pin(self.send(agent_id))
    }
}

impl std::fmt::Debug for RetellClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetellClient")
            .field("create_web_call_url", &self.create_web_call_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}
