use super::super::parse_origin_list;
use super::{Config, Environment};

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("RETELL_API_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                self.upstream.api_key = Some(key.to_string());
            }
        }

        if let Ok(base_url) = std::env::var("RETELL_API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            self.upstream.base_url = base_url.trim().to_string();
        }

        if let Ok(port_str) = std::env::var("CALLGATE_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.trim().parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) = std::env::var("CALLGATE_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(env) = std::env::var("NODE_ENV").or_else(|_| std::env::var("APP_ENV"))
            && !env.is_empty()
        {
            self.environment = Environment::from_env_value(&env);
        }

        if let Some(universal) = env_flag("UNIVERSAL_ACCESS") {
            self.cors.universal_access = universal;
        }

        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = parse_origin_list(&origins);
        }

        if let Ok(origins) = std::env::var("PRIORITY_ORIGINS") {
            self.cors.priority_origins = parse_origin_list(&origins);
        }

        if let Some(credentials) = env_flag("CORS_CREDENTIALS") {
            self.cors.allow_credentials = credentials;
        }

        if let Some(trust) = env_flag("TRUST_FORWARDED_FOR") {
            self.gateway.trust_forwarded_for = trust;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL")
            && !level.trim().is_empty()
        {
            self.log_level = Some(level.trim().to_lowercase());
        }
    }
}
