pub mod schema;

pub use schema::{
    Config, CorsConfig, Environment, GatewayConfig, RateLimitConfig, UpstreamConfig,
    parse_origin_list,
};
