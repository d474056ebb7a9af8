use super::super::{CorsConfig, GatewayConfig, RateLimitConfig, UpstreamConfig};
use crate::error::ConfigError;
use crate::origin::OriginPolicyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment environment. Anything but production relaxes the origin
/// policy for loopback hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse a `NODE_ENV`-style value. Unknown values mean development.
    pub fn from_env_value(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path the config was loaded from, if any - not serialized
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub environment: Environment,

    /// Log level name (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// The immutable origin policy the gateway evaluates every request against.
    pub fn origin_policy(&self) -> OriginPolicyConfig {
        let mut policy =
            OriginPolicyConfig::with_allowed_origins(self.cors.allowed_origins.iter().cloned());
        policy.universal_access = self.cors.universal_access;
        policy.development_mode = !self.environment.is_production();
        policy.priority_origins = self.cors.priority_origins.iter().cloned().collect();
        policy.allow_credentials = self.cors.allow_credentials;
        policy
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_policy().validate()?;
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.window_secs must be greater than zero".into(),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.timeout_secs must be greater than zero".into(),
            ));
        }
        url::Url::parse(&self.upstream.base_url).map_err(|e| {
            ConfigError::Validation(format!(
                "upstream.base_url '{}' is not a valid URL: {e}",
                self.upstream.base_url
            ))
        })?;
        Ok(())
    }
}
