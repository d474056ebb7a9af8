#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod origin;
pub mod session;
pub mod upstream;
pub mod widget;

pub use config::Config;
pub use error::{CallgateError, SessionError};
pub use origin::{OriginDecision, OriginPolicyConfig, OriginReason};
pub use session::{CallController, CallSignal, CallSnapshot, CallState};
pub use widget::{CallWidget, WidgetConfig};
