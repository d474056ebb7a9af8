//! Call session state machine for the embeddable voice widget.
//!
//! A [`CallController`] owns at most one call session at a time and drives it
//! through `Idle → Connecting → Active → Ending → Idle`:
//!
//! - `start_call` fetches an access token, builds a remote call client and
//!   asks it to start; the session stays `Connecting` until the client emits
//!   [`CallSignal::Started`].
//! - `Started` records the start time and begins a once-per-second tick that
//!   keeps `elapsed_seconds` current.
//! - `end_call`, [`CallSignal::Ended`] and [`CallSignal::Error`] all converge
//!   on the same teardown: stop the remote client once, cancel the tick and
//!   reset every per-call field.
//!
//! Every failure lands back in `Idle` with a transient, auto-expiring error
//! visible through [`CallSnapshot::error`].

mod controller;
mod fetcher;
mod remote;

pub use controller::CallController;
pub use fetcher::HttpTokenFetcher;
pub use remote::{
    CallSignal, RemoteCallClient, RemoteCallFactory, SignalSink, TokenFetcher, TokenGrant,
};

use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Active,
    Ending,
}

/// Tunables for a [`CallController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Upper bound for each suspending step (token fetch, remote start).
    pub connect_timeout: Duration,
    /// How long an error stays visible before it auto-dismisses.
    pub error_display: Duration,
    /// Cadence of the elapsed-time tick while a call is active.
    pub tick_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            error_display: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Point-in-time view of the controller, suitable for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    pub state: CallState,
    pub session_id: Option<u64>,
    pub agent_id: Option<String>,
    pub access_token: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub muted: bool,
    pub speaking: bool,
    pub elapsed_seconds: u64,
    #[serde(skip)]
    pub error: Option<SessionError>,
}

impl CallSnapshot {
    pub fn is_active(&self) -> bool {
        self.state == CallState::Active
    }

    /// Elapsed time as `MM:SS`.
    pub fn timer_text(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }
}

/// Format seconds as zero-padded `MM:SS`. Minutes keep counting past 59.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
