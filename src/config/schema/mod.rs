mod core;
mod cors;
mod gateway;
mod rate_limit;
mod upstream;

pub use self::core::{Config, Environment};
pub use cors::{CorsConfig, parse_origin_list};
pub use gateway::GatewayConfig;
pub use rate_limit::RateLimitConfig;
pub use upstream::UpstreamConfig;
