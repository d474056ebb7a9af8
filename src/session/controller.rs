use super::remote::{CallSignal, RemoteCallClient, RemoteCallFactory, SignalSink, TokenFetcher};
use super::{CallSnapshot, CallState, SessionSettings};
use crate::error::SessionError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Per-call state. Dropped as a whole when the call returns to `Idle`, so no
/// field can leak into the next call.
struct CallSession {
    id: u64,
    state: CallState,
    agent_id: String,
    pending_token: Option<String>,
    access_token: Option<String>,
    started_at: Option<Instant>,
    started_at_wall: Option<DateTime<Utc>>,
    muted: bool,
    speaking: bool,
    elapsed_seconds: u64,
    client: Option<Arc<dyn RemoteCallClient>>,
    ticker: Option<JoinHandle<()>>,
    /// Runtime that called `start_call`. Signals are handled in its context
    /// because remote clients may emit them from their own threads.
    runtime: Option<Handle>,
}

impl CallSession {
    fn new(id: u64, agent_id: &str) -> Self {
        Self {
            id,
            state: CallState::Connecting,
            agent_id: agent_id.to_string(),
            pending_token: None,
            access_token: None,
            started_at: None,
            started_at_wall: None,
            muted: false,
            speaking: false,
            elapsed_seconds: 0,
            client: None,
            ticker: None,
            runtime: Handle::try_current().ok(),
        }
    }

    fn refresh_elapsed(&mut self, now: Instant) {
        if let Some(started) = self.started_at {
            self.elapsed_seconds = now.saturating_duration_since(started).as_secs();
        }
    }
}

struct Notice {
    error: SessionError,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    session: Option<CallSession>,
    next_id: u64,
    notice: Option<Notice>,
}

/// State shared between the controller, its tick task and every
/// [`SignalSink`]. The lock is never held across an await or while calling
/// into the remote client.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    settings: SessionSettings,
    me: Weak<Shared>,
}

impl Shared {
    fn new(settings: SessionSettings) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            inner: Mutex::new(Inner::default()),
            settings,
            me: me.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn handle_signal(&self, session_id: u64, signal: CallSignal) {
        debug!(session_id, %signal, "remote call signal");
        let runtime = self.lock().session.as_ref().and_then(|s| s.runtime.clone());
        let _context = runtime.as_ref().map(Handle::enter);
        match signal {
            CallSignal::Started => self.activate(session_id),
            CallSignal::Ended => {
                if self.teardown(session_id, None) {
                    info!(session_id, "call ended by remote");
                }
            }
            CallSignal::Error(message) => {
                warn!(session_id, "remote call error: {message}");
                self.teardown(session_id, Some(SessionError::RemoteCallError(message)));
            }
            CallSignal::AgentStartTalking => self.set_speaking(session_id, true),
            CallSignal::AgentStopTalking => self.set_speaking(session_id, false),
        }
    }

    fn set_notice(&self, error: SessionError) {
        let expires_at = Instant::now() + self.settings.error_display;
        self.lock().notice = Some(Notice { error, expires_at });
    }

    /// Open a new `Connecting` session, or `None` if one already exists.
    fn begin_connecting(&self, agent_id: &str) -> Option<u64> {
        let mut inner = self.lock();
        if inner.session.is_some() {
            return None;
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.session = Some(CallSession::new(id, agent_id));
        inner.notice = None;
        Some(id)
    }

    fn is_connecting(&self, session_id: u64) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id && s.state == CallState::Connecting)
    }

    fn attach_client(
        &self,
        session_id: u64,
        client: Arc<dyn RemoteCallClient>,
        access_token: String,
    ) -> bool {
        let mut inner = self.lock();
        match inner.session.as_mut() {
            Some(session) if session.id == session_id && session.state == CallState::Connecting => {
                session.client = Some(client);
                session.pending_token = Some(access_token);
                true
            }
            _ => false,
        }
    }

    fn activate(&self, session_id: u64) {
        let mut inner = self.lock();
        let Some(session) = inner.session.as_mut() else {
            debug!(session_id, "started signal with no session; ignoring");
            return;
        };
        if session.id != session_id || session.state != CallState::Connecting {
            debug!(session_id, state = %session.state, "stale started signal; ignoring");
            return;
        }

        session.state = CallState::Active;
        session.access_token = session.pending_token.take();
        session.started_at = Some(Instant::now());
        session.started_at_wall = Some(Utc::now());
        session.elapsed_seconds = 0;
        if let Some(previous) = session.ticker.take() {
            previous.abort();
        }
        session.ticker = self.spawn_ticker(session_id);
        info!(session_id, agent_id = %session.agent_id, "call active");
    }

    fn spawn_ticker(&self, session_id: u64) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id, "no async runtime; elapsed time will only update on tick()");
            return None;
        };
        let period = self.settings.tick_interval;
        let shared = self.me.clone();
        Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if !shared.tick_session(session_id) {
                    break;
                }
            }
        }))
    }

    /// Recompute elapsed time. Returns `false` once the session is no longer
    /// active so the tick task stops.
    fn tick_session(&self, session_id: u64) -> bool {
        let mut inner = self.lock();
        match inner.session.as_mut() {
            Some(session) if session.id == session_id && session.state == CallState::Active => {
                session.refresh_elapsed(Instant::now());
                true
            }
            _ => false,
        }
    }

    fn set_speaking(&self, session_id: u64, speaking: bool) {
        let mut inner = self.lock();
        if let Some(session) = inner.session.as_mut()
            && session.id == session_id
            && session.state == CallState::Active
        {
            session.speaking = speaking;
        }
    }

    /// Move the session to `Ending`, stop the remote client once and drop the
    /// session. Returns `false` when `session_id` is not current or is
    /// already ending.
    fn teardown(&self, session_id: u64, error: Option<SessionError>) -> bool {
        let client = {
            let mut inner = self.lock();
            let Some(session) = inner.session.as_mut() else {
                return false;
            };
            if session.id != session_id || session.state == CallState::Ending {
                return false;
            }

            session.state = CallState::Ending;
            if let Some(ticker) = session.ticker.take() {
                ticker.abort();
            }
            session.pending_token = None;
            session.access_token = None;
            session.started_at = None;
            session.started_at_wall = None;
            session.muted = false;
            session.speaking = false;
            session.elapsed_seconds = 0;
            let client = session.client.take();

            if let Some(error) = error {
                let expires_at = Instant::now() + self.settings.error_display;
                inner.notice = Some(Notice { error, expires_at });
            }
            client
        };

        if let Some(client) = client {
            client.stop_call();
        }

        let mut inner = self.lock();
        if inner.session.as_ref().is_some_and(|s| s.id == session_id) {
            inner.session = None;
        }
        true
    }

    fn current_id(&self) -> Option<u64> {
        self.lock().session.as_ref().map(|s| s.id)
    }
}

/// Drives a single call session against a [`TokenFetcher`] and a
/// [`RemoteCallFactory`].
///
/// Dropping the controller ends any call still in progress.
pub struct CallController {
    shared: Arc<Shared>,
    fetcher: Arc<dyn TokenFetcher>,
    factory: Arc<dyn RemoteCallFactory>,
}

impl CallController {
    pub fn new(fetcher: Arc<dyn TokenFetcher>, factory: Arc<dyn RemoteCallFactory>) -> Self {
        Self::with_settings(fetcher, factory, SessionSettings::default())
    }

    pub fn with_settings(
        fetcher: Arc<dyn TokenFetcher>,
        factory: Arc<dyn RemoteCallFactory>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            shared: Shared::new(settings),
            fetcher,
            factory,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.shared.settings
    }

    /// Begin a call for `agent_id`.
    ///
    /// Returns once the remote client has been asked to start; the session
    /// becomes `Active` when the client emits [`CallSignal::Started`]. A
    /// second call while a session exists is a no-op. Every error leaves the
    /// controller `Idle` with the error visible in [`Self::snapshot`].
    pub async fn start_call(&self, agent_id: &str) -> Result<(), SessionError> {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            let err = SessionError::MissingAgentId;
            warn!("{err}");
            self.shared.set_notice(err.clone());
            return Err(err);
        }

        let Some(id) = self.shared.begin_connecting(agent_id) else {
            debug!(agent_id, "call already in progress; ignoring start");
            return Ok(());
        };
        info!(session_id = id, agent_id, "starting call");

        let timeout = self.shared.settings.connect_timeout;
        let grant = match tokio::time::timeout(timeout, self.fetcher.fetch_token(agent_id)).await
        {
            Ok(Ok(grant)) => grant,
            Ok(Err(e)) => return self.fail(id, SessionError::TokenFetchFailed(e.to_string())),
            Err(_) => {
                let message = format!("token request timed out after {}s", timeout.as_secs());
                return self.fail(id, SessionError::TokenFetchFailed(message));
            }
        };
        if !self.shared.is_connecting(id) {
            debug!(session_id = id, "call cancelled while fetching token");
            return Ok(());
        }

        let signals = SignalSink::new(id, Arc::downgrade(&self.shared));
        let client: Arc<dyn RemoteCallClient> = match self.factory.create(signals) {
            Ok(client) => Arc::from(client),
            Err(e) => {
                return self.fail(id, SessionError::RemoteClientInitFailed(format!("{e:#}")));
            }
        };
        if !self
            .shared
            .attach_client(id, Arc::clone(&client), grant.access_token.clone())
        {
            debug!(session_id = id, "call cancelled before remote start");
            return Ok(());
        }

        match tokio::time::timeout(timeout, client.start_call(&grant.access_token)).await {
            Ok(Ok(())) => {
                debug!(session_id = id, "remote call start requested");
                Ok(())
            }
            Ok(Err(e)) => self.fail(id, SessionError::RemoteCallError(format!("{e:#}"))),
            Err(_) => {
                let message = format!("remote call did not start within {}s", timeout.as_secs());
                self.fail(id, SessionError::RemoteCallError(message))
            }
        }
    }

    fn fail(&self, session_id: u64, err: SessionError) -> Result<(), SessionError> {
        if self.shared.teardown(session_id, Some(err.clone())) {
            warn!(session_id, kind = err.kind(), "{err}");
            Err(err)
        } else {
            debug!(session_id, "call was already ended; dropping {}", err.kind());
            Ok(())
        }
    }

    /// End the current call, if any. Safe to call repeatedly and from any
    /// state; the remote client is stopped at most once.
    pub fn end_call(&self) {
        if let Some(id) = self.shared.current_id()
            && self.shared.teardown(id, None)
        {
            info!(session_id = id, "call ended");
        }
    }

    /// Flip the mute flag of the active call. Returns the new mute state, or
    /// `false` (unchanged) when no call is active.
    pub fn toggle_mute(&self) -> bool {
        let (client, muted) = {
            let mut inner = self.shared.lock();
            let Some(session) = inner.session.as_mut() else {
                return false;
            };
            if session.state != CallState::Active {
                return false;
            }
            let Some(client) = session.client.clone() else {
                return false;
            };
            session.muted = !session.muted;
            (client, session.muted)
        };

        if muted {
            client.mute();
        } else {
            client.unmute();
        }
        muted
    }

    /// Recompute `elapsed_seconds` from the start time immediately.
    pub fn tick(&self) {
        let mut inner = self.shared.lock();
        if let Some(session) = inner.session.as_mut()
            && session.state == CallState::Active
        {
            session.refresh_elapsed(Instant::now());
        }
    }

    pub fn state(&self) -> CallState {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(CallState::Idle, |s| s.state)
    }

    /// Whether the elapsed-time task is running.
    pub fn is_ticking(&self) -> bool {
        self.shared
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.ticker.as_ref())
            .is_some_and(|t| !t.is_finished())
    }

    /// The most recent error, until it auto-dismisses.
    pub fn last_error(&self) -> Option<SessionError> {
        let inner = self.shared.lock();
        visible_error(&inner)
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let inner = self.shared.lock();
        let error = visible_error(&inner);
        match inner.session.as_ref() {
            Some(session) => CallSnapshot {
                state: session.state,
                session_id: Some(session.id),
                agent_id: Some(session.agent_id.clone()),
                access_token: session.access_token.clone(),
                started_at: session.started_at_wall,
                muted: session.muted,
                speaking: session.speaking,
                elapsed_seconds: session.elapsed_seconds,
                error,
            },
            None => CallSnapshot {
                error,
                ..CallSnapshot::default()
            },
        }
    }
}

fn visible_error(inner: &Inner) -> Option<SessionError> {
    inner
        .notice
        .as_ref()
        .filter(|notice| notice.expires_at > Instant::now())
        .map(|notice| notice.error.clone())
}

impl Drop for CallController {
    fn drop(&mut self) {
        self.end_call();
    }
}

impl std::fmt::Debug for CallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("state", &self.state())
            .field("settings", &self.shared.settings)
            .finish_non_exhaustive()
    }
}
