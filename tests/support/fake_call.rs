#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callgate::error::TokenFetchError;
use callgate::session::{
    CallSignal, RemoteCallClient, RemoteCallFactory, SignalSink, TokenFetcher, TokenGrant,
};

/// Token fetcher answering every request with the same grant or HTTP error,
/// optionally after a delay.
pub struct ScriptedFetcher {
    status: Option<(u16, &'static str)>,
    token: &'static str,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn token(token: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: None,
            token,
            delay: None,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn delayed(token: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status: None,
            token,
            delay: Some(delay),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn failing(status: u16, message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: Some((status, message)),
            token: "",
            delay: None,
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TokenFetcher for ScriptedFetcher {
    fn fetch_token<'a>(
        &'a self,
        _agent_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant, TokenFetchError>> + Send + 'a>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.status {
                Some((status, message)) => Err(TokenFetchError::Status {
                    status,
                    message: message.to_string(),
                }),
                None => Ok(TokenGrant {
                    access_token: self.token.to_string(),
                    call_id: None,
                }),
            }
        })
    }
}

/// Everything the fake remote clients did, in order.
#[derive(Default)]
pub struct CallLog {
    events: Mutex<Vec<String>>,
    sinks: Mutex<Vec<SignalSink>>,
}

impl CallLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    /// Signal sink handed to the `index`-th client.
    pub fn sink(&self, index: usize) -> SignalSink {
        self.sinks.lock().unwrap()[index].clone()
    }

    pub fn clients_created(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }
}

struct RecordingClient {
    log: Arc<CallLog>,
}

impl RemoteCallClient for RecordingClient {
    fn start_call<'a>(
        &'a self,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.log.push(format!("start:{access_token}"));
            Ok(())
        })
    }

    fn stop_call(&self) {
        self.log.push("stop");
    }

    fn mute(&self) {
        self.log.push("mute");
    }

    fn unmute(&self) {
        self.log.push("unmute");
    }
}

/// Factory whose clients only record calls; tests drive lifecycle signals
/// through [`CallLog::sink`].
#[derive(Default)]
pub struct RecordingFactory {
    pub log: Arc<CallLog>,
}

impl RemoteCallFactory for RecordingFactory {
    fn create(&self, signals: SignalSink) -> anyhow::Result<Box<dyn RemoteCallClient>> {
        self.log.sinks.lock().unwrap().push(signals);
        Ok(Box::new(RecordingClient {
            log: Arc::clone(&self.log),
        }))
    }
}

pub fn emit(log: &CallLog, index: usize, signal: CallSignal) {
    log.sink(index).emit(signal);
}
