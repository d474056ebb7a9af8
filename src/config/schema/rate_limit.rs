use serde::{Deserialize, Serialize};

/// Per-IP request limits. Both buckets share one window length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds (default: 15 minutes)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Requests per window for every `/api/` route
    #[serde(default = "default_general_max")]
    pub general_max: u32,
    /// Requests per window for `POST /api/create-web-call`
    #[serde(default = "default_token_max")]
    pub token_max: u32,
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_general_max() -> u32 {
    100
}

fn default_token_max() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            general_max: default_general_max(),
            token_max: default_token_max(),
        }
    }
}
