//! Embeddable call widget: configuration, lifecycle and the view model a host
//! renders.
//!
//! The host owns the [`CallWidget`] it constructs; there is no global
//! registry. A widget drives exactly one [`CallController`].

use crate::error::{CallgateError, SessionError};
use crate::session::{
    CallController, CallSnapshot, CallState, HttpTokenFetcher, RemoteCallFactory,
    SessionSettings, TokenFetcher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

/// Options recognised by the widget constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub agent_id: String,
    #[serde(default)]
    pub position: WidgetPosition,
    #[serde(default = "default_proxy_endpoint")]
    pub proxy_endpoint: String,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_secondary_color")]
    pub secondary_color: String,
    #[serde(default = "default_bubble_icon")]
    pub bubble_icon: String,
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    #[serde(default = "default_button_label")]
    pub button_label: String,
    /// Seconds an error message stays on screen.
    #[serde(default = "default_error_display_secs")]
    pub error_display_secs: u64,
}

fn default_proxy_endpoint() -> String {
    "/api/create-web-call".into()
}

fn default_primary_color() -> String {
    "#9333ea".into()
}

fn default_secondary_color() -> String {
    "#a855f7".into()
}

fn default_bubble_icon() -> String {
    "fa-headset".into()
}

fn default_welcome_message() -> String {
    "How can I help you today?".into()
}

fn default_button_label() -> String {
    "Start Conversation".into()
}

fn default_error_display_secs() -> u64 {
    5
}

impl WidgetConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            position: WidgetPosition::default(),
            proxy_endpoint: default_proxy_endpoint(),
            primary_color: default_primary_color(),
            secondary_color: default_secondary_color(),
            bubble_icon: default_bubble_icon(),
            welcome_message: default_welcome_message(),
            button_label: default_button_label(),
            error_display_secs: default_error_display_secs(),
        }
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            error_display: Duration::from_secs(self.error_display_secs),
            ..SessionSettings::default()
        }
    }
}

/// Everything a host needs to draw the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub expanded: bool,
    pub position: WidgetPosition,
    pub state: CallState,
    pub welcome_message: String,
    pub button_label: String,
    pub show_timer: bool,
    pub timer_text: String,
    pub muted: bool,
    pub speaking: bool,
    pub error: Option<String>,
}

pub struct CallWidget {
    config: WidgetConfig,
    controller: CallController,
    expanded: bool,
}

impl CallWidget {
    /// Build a widget. Fails with [`SessionError::MissingAgentId`] when the
    /// configuration carries no agent id.
    pub fn new(
        config: WidgetConfig,
        fetcher: Arc<dyn TokenFetcher>,
        factory: Arc<dyn RemoteCallFactory>,
    ) -> Result<Self, SessionError> {
        if config.agent_id.trim().is_empty() {
            return Err(SessionError::MissingAgentId);
        }
        let controller =
            CallController::with_settings(fetcher, factory, config.session_settings());
        Ok(Self {
            config,
            controller,
            expanded: false,
        })
    }

    /// Build a widget that fetches tokens from `proxy_endpoint`, resolved
    /// against `base_url` when relative. Fails on an unusable endpoint or a
    /// missing agent id.
    pub fn with_proxy(
        config: WidgetConfig,
        base_url: Option<&str>,
        factory: Arc<dyn RemoteCallFactory>,
    ) -> Result<Self, CallgateError> {
        let timeout = config.session_settings().connect_timeout;
        let fetcher = HttpTokenFetcher::from_endpoint(&config.proxy_endpoint, base_url, timeout)?;
        Ok(Self::new(config, Arc::new(fetcher), factory)?)
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn controller(&self) -> &CallController {
        &self.controller
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Open the call panel.
    pub fn show(&mut self) {
        self.expanded = true;
    }

    /// Bubble click: open or close the panel. Closing does not end a call.
    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    /// Main button: start a call when idle, otherwise end the current one.
    pub async fn press_call_button(&self) -> Result<(), SessionError> {
        match self.controller.state() {
            CallState::Idle => self.controller.start_call(&self.config.agent_id).await,
            CallState::Connecting | CallState::Active => {
                self.controller.end_call();
                Ok(())
            }
            CallState::Ending => {
                debug!("call is already ending");
                Ok(())
            }
        }
    }

    /// Returns the new mute state.
    pub fn press_mute_button(&self) -> bool {
        self.controller.toggle_mute()
    }

    pub fn view(&self) -> WidgetView {
        let snapshot = self.controller.snapshot();
        self.render(&snapshot)
    }

    fn render(&self, snapshot: &CallSnapshot) -> WidgetView {
        let button_label = match snapshot.state {
            CallState::Idle => self.config.button_label.clone(),
            CallState::Connecting => "Connecting...".to_string(),
            CallState::Active | CallState::Ending => "End Call".to_string(),
        };
        WidgetView {
            expanded: self.expanded,
            position: self.config.position,
            state: snapshot.state,
            welcome_message: self.config.welcome_message.clone(),
            button_label,
            show_timer: snapshot.is_active(),
            timer_text: snapshot.timer_text(),
            muted: snapshot.muted,
            speaking: snapshot.speaking,
            error: snapshot.error.as_ref().map(ToString::to_string),
        }
    }

    /// Tear the widget down, ending any call in progress.
    pub fn destroy(self) {
        self.controller.end_call();
    }
}

impl std::fmt::Debug for CallWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallWidget")
            .field("agent_id", &self.config.agent_id)
            .field("expanded", &self.expanded)
            .field("controller", &self.controller)
            .finish()
    }
}
