//! Capabilities the call controller depends on, and the signal channel back
//! into it.

use super::controller::Shared;
use crate::error::TokenFetchError;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;

/// Token returned by the proxy for one call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub call_id: Option<String>,
}

/// Exchanges an agent id for an access token (normally via the proxy).
pub trait TokenFetcher: Send + Sync {
    fn fetch_token<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, TokenFetchError>> + Send + 'a>>;
}

/// Live audio call driven by the third-party client SDK.
///
/// `stop_call`, `mute` and `unmute` are fire-and-forget, matching the SDK.
pub trait RemoteCallClient: Send + Sync {
    fn start_call<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn stop_call(&self);

    fn mute(&self);

    fn unmute(&self);
}

/// Builds one remote client per call session. The client reports lifecycle
/// events through the supplied [`SignalSink`].
pub trait RemoteCallFactory: Send + Sync {
    fn create(&self, signals: SignalSink) -> anyhow::Result<Box<dyn RemoteCallClient>>;
}

/// Lifecycle events a remote call client can emit.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallSignal {
    Started,
    Ended,
    AgentStartTalking,
    AgentStopTalking,
    Error(String),
}

/// Handle a remote client uses to report [`CallSignal`]s for the session it
/// was created for. Signals from a session that is no longer current are
/// dropped.
#[derive(Clone)]
pub struct SignalSink {
    session_id: u64,
    shared: Weak<Shared>,
}

impl SignalSink {
    pub(super) fn new(session_id: u64, shared: Weak<Shared>) -> Self {
        Self { session_id, shared }
    }

    pub fn emit(&self, signal: CallSignal) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_signal(self.session_id, signal);
        }
    }
}

impl std::fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSink")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
