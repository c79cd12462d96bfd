//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, GeminiConfig, LogFormat, LoggingConfig, MetricsConfig,
    RateLimitSettings, ServerConfig, UploadConfig,
};
