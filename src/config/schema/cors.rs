use serde::{Deserialize, Serialize};

/// Cross-origin settings. Converted into an
/// [`OriginPolicyConfig`](crate::origin::OriginPolicyConfig) at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allow every origin (highest precedence after priority origins)
    #[serde(default)]
    pub universal_access: bool,
    /// Exact origins, `*.domain` subdomain entries, or a literal `*`
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Origins that are always allowed, e.g. a known partner site
    #[serde(default)]
    pub priority_origins: Vec<String>,
    /// Send `Access-Control-Allow-Credentials: true` (incompatible with `*`)
    #[serde(default)]
    pub allow_credentials: bool,
}

/// Split a comma-separated origin list, trimming entries and dropping empties.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
