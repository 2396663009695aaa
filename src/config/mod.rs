//! Configuration module for Cirrus.

mod app_config;
mod helpers;
mod http_retry;
mod queue;

pub use app_config::{
    AppConfig, ConnectivityConfig, EmailConfig, PushConfig, WeatherProviderConfig,
};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use queue::QueueConfig;
