use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults with a warning, so the proxy can
    /// start from environment variables alone.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "configuration file not found; using defaults"
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents).map_err(|e| {
            ConfigError::Load(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Resolve the effective configuration: defaults or TOML file, then
    /// `.env`, then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path).context("load config file")?,
            None => Self::default(),
        };

        match dotenvy::dotenv() {
            Ok(env_path) => debug!(path = %env_path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("ignoring unreadable .env file: {e}"),
        }

        config.apply_env_overrides();
        config.validate().context("validate config")?;
        Ok(config)
    }
}
