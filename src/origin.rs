//! Origin policy evaluation for cross-origin widget requests.
//!
//! [`evaluate`] is a pure function: given the request's `Origin` header and an
//! immutable [`OriginPolicyConfig`], it decides whether the request is allowed
//! and which value (if any) belongs in `Access-Control-Allow-Origin`.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. no origin (server-to-server, curl) → allow, no header
//! 2. priority origin → allow, echo origin
//! 3. universal access → allow, echo origin
//! 4. `*` in the allow-list → allow, echo `*`
//! 5. development mode and a loopback host → allow, echo origin
//! 6. empty allow-list → allow, echo origin (fail-open when unconfigured)
//! 7. exact entry or `*.domain` subdomain entry → allow, echo origin
//! 8. otherwise → deny

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Immutable origin policy, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicyConfig {
    pub universal_access: bool,
    pub allowed_origins: Vec<String>,
    pub allow_all_wildcard: bool,
    pub development_mode: bool,
    pub priority_origins: HashSet<String>,
    /// Whether responses carry `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl OriginPolicyConfig {
    /// Build a policy from an allow-list, deriving `allow_all_wildcard` from a
    /// literal `*` entry.
    pub fn with_allowed_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed_origins: Vec<String> = origins.into_iter().map(Into::into).collect();
        let allow_all_wildcard = allowed_origins.iter().any(|o| o == "*");
        Self {
            allowed_origins,
            allow_all_wildcard,
            ..Self::default()
        }
    }

    /// Reject configurations a browser would refuse: a `*` allow-origin may
    /// never be combined with credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allow_credentials && self.allow_all_wildcard {
            return Err(ConfigError::Validation(
                "ALLOWED_ORIGINS contains '*' while credentials are enabled; \
                 list explicit origins or disable CORS_CREDENTIALS"
                    .into(),
            ));
        }
        for entry in &self.allowed_origins {
            if entry.starts_with("*.") && entry.len() == 2 {
                return Err(ConfigError::Validation(
                    "subdomain wildcard '*.' has no domain".into(),
                ));
            }
        }
        Ok(())
    }

    /// Short label for logs and `/health`.
    pub fn mode_label(&self) -> &'static str {
        if self.universal_access {
            "universal"
        } else if self.allow_all_wildcard {
            "wildcard"
        } else if self.allowed_origins.is_empty() {
            if self.development_mode {
                "development"
            } else {
                "unconfigured"
            }
        } else {
            "restricted"
        }
    }
}

/// Why an origin was allowed or denied. Logged and tested, never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OriginReason {
    NoOrigin,
    PriorityMatch,
    Universal,
    WildcardList,
    DevLocalhost,
    ExplicitMatch,
    SubdomainMatch,
    Denied,
    Unconfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginDecision {
    pub allowed: bool,
    pub echo_origin: Option<String>,
    pub reason: OriginReason,
}

impl OriginDecision {
    fn allow(echo_origin: Option<String>, reason: OriginReason) -> Self {
        Self {
            allowed: true,
            echo_origin,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            echo_origin: None,
            reason: OriginReason::Denied,
        }
    }

    /// True when the echoed value is the literal request origin, so caches
    /// must vary on `Origin`.
    pub fn echoes_request_origin(&self) -> bool {
        self.echo_origin.as_deref().is_some_and(|o| o != "*")
    }
}

/// Decide whether a request from `request_origin` is allowed under `config`.
pub fn evaluate(request_origin: Option<&str>, config: &OriginPolicyConfig) -> OriginDecision {
    let Some(origin) = request_origin else {
        return OriginDecision::allow(None, OriginReason::NoOrigin);
    };
    let echo = || Some(origin.to_string());

    if config.priority_origins.contains(origin) {
        return OriginDecision::allow(echo(), OriginReason::PriorityMatch);
    }

    if config.universal_access {
        return OriginDecision::allow(echo(), OriginReason::Universal);
    }

    if config.allow_all_wildcard {
        if config.allow_credentials {
            // validate() refuses this combination; never emit `*` with credentials.
            warn!(origin, "wildcard allow-list with credentials; echoing literal origin");
            return OriginDecision::allow(echo(), OriginReason::WildcardList);
        }
        return OriginDecision::allow(Some("*".to_string()), OriginReason::WildcardList);
    }

    if config.development_mode && is_loopback_origin(origin) {
        return OriginDecision::allow(echo(), OriginReason::DevLocalhost);
    }

    if config.allowed_origins.is_empty() {
        return OriginDecision::allow(echo(), OriginReason::Unconfigured);
    }

    for entry in &config.allowed_origins {
        if entry == origin {
            return OriginDecision::allow(echo(), OriginReason::ExplicitMatch);
        }
        if matches_subdomain(entry, origin) {
            return OriginDecision::allow(echo(), OriginReason::SubdomainMatch);
        }
    }

    OriginDecision::deny()
}

/// `*.example.com` matches `https://a.example.com`, `https://a.b.example.com`
/// and the bare `example.com`, but not `https://example.com.evil.com`.
fn matches_subdomain(entry: &str, origin: &str) -> bool {
    let Some(domain) = entry.strip_prefix("*.") else {
        return false;
    };
    if domain.is_empty() {
        return false;
    }
    origin == domain
        || origin
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

/// Returns `true` if the origin's host is a loopback or unspecified address,
/// on any port.
pub fn is_loopback_origin(origin: &str) -> bool {
    let Ok(parsed) = url::Url::parse(origin) else {
        return false;
    };
    matches!(
        parsed.host_str(),
        Some("localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]")
    )
}
