use callgate::config::{Config, Environment};
use callgate::origin::{OriginPolicyConfig, OriginReason, evaluate};

fn production_config(allowed: &[&str]) -> Config {
    let mut config = Config::default();
    config.environment = Environment::Production;
    config.cors.allowed_origins = allowed.iter().map(ToString::to_string).collect();
    config
}

#[test]
fn explicit_client_origin_is_echoed() {
    let policy = production_config(&["https://client1.com", "https://client2.com"]).origin_policy();

    let decision = evaluate(Some("https://client1.com"), &policy);

    assert!(decision.allowed);
    assert_eq!(decision.echo_origin.as_deref(), Some("https://client1.com"));
    assert_eq!(decision.reason, OriginReason::ExplicitMatch);
}

#[test]
fn missing_origin_is_always_allowed_without_header() {
    let policies = [
        OriginPolicyConfig::default(),
        production_config(&["https://client1.com"]).origin_policy(),
        OriginPolicyConfig {
            universal_access: true,
            ..OriginPolicyConfig::default()
        },
        OriginPolicyConfig::with_allowed_origins(["*"]),
    ];

    for policy in &policies {
        let decision = evaluate(None, policy);
        assert!(decision.allowed);
        assert_eq!(decision.echo_origin, None);
        assert_eq!(decision.reason, OriginReason::NoOrigin);
    }
}

#[test]
fn universal_access_allows_any_origin() {
    let mut config = production_config(&["https://client1.com"]);
    config.cors.universal_access = true;
    let policy = config.origin_policy();

    for origin in ["https://evil.com", "http://localhost:5173", "null", "x"] {
        let decision = evaluate(Some(origin), &policy);
        assert!(decision.allowed, "{origin} should be allowed");
        assert_eq!(decision.reason, OriginReason::Universal);
        assert_eq!(decision.echo_origin.as_deref(), Some(origin));
    }
}

#[test]
fn subdomain_entry_does_not_match_lookalike_hosts() {
    let policy = production_config(&["*.example.com"]).origin_policy();

    let sub = evaluate(Some("https://a.example.com"), &policy);
    assert!(sub.allowed);
    assert_eq!(sub.reason, OriginReason::SubdomainMatch);

    let evil = evaluate(Some("https://example.com.evil.com"), &policy);
    assert!(!evil.allowed);
    assert_eq!(evil.reason, OriginReason::Denied);
    assert_eq!(evil.echo_origin, None);
}

#[test]
fn priority_origin_overrides_restrictive_list() {
    let mut config = production_config(&["https://client1.com"]);
    config.cors.priority_origins = vec!["https://partner.example".into()];
    let policy = config.origin_policy();

    let decision = evaluate(Some("https://partner.example"), &policy);
    assert!(decision.allowed);
    assert_eq!(decision.reason, OriginReason::PriorityMatch);
}

#[test]
fn loopback_is_only_relaxed_in_development() {
    let mut config = production_config(&["https://client1.com"]);
    let prod = config.origin_policy();
    assert!(!evaluate(Some("http://localhost:3000"), &prod).allowed);

    config.environment = Environment::Development;
    let dev = config.origin_policy();
    let decision = evaluate(Some("http://127.0.0.1:8080"), &dev);
    assert!(decision.allowed);
    assert_eq!(decision.reason, OriginReason::DevLocalhost);
}

#[test]
fn empty_allow_list_fails_open() {
    let policy = production_config(&[]).origin_policy();
    let decision = evaluate(Some("https://anyone.example"), &policy);
    assert!(decision.allowed);
    assert_eq!(decision.reason, OriginReason::Unconfigured);
    assert_eq!(policy.mode_label(), "unconfigured");
}

#[test]
fn credentials_with_wildcard_fail_validation() {
    let mut config = production_config(&["*"]);
    config.cors.allow_credentials = true;
    assert!(config.validate().is_err());

    config.cors.allowed_origins = vec!["https://client1.com".into()];
    assert!(config.validate().is_ok());
}

#[test]
fn evaluation_is_deterministic() {
    let policy = production_config(&["https://client1.com", "*.example.com"]).origin_policy();
    for origin in ["https://client1.com", "https://b.example.com", "https://nope.io"] {
        assert_eq!(evaluate(Some(origin), &policy), evaluate(Some(origin), &policy));
    }
}
