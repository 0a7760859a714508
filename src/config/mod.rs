//! Configuration module for waypost.

mod app_config;
mod helpers;
mod http_retry;
mod rhai;
mod server;

pub use app_config::{AppConfig, AppConfigBuilder};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use rhai::RhaiConfig;
pub use server::ServerConfig;
