//! mathmark
//!
//! A conversion gateway that turns PDFs and images into Markdown with
//! mathematical notation preserved. Extraction is delegated to Gemini; this
//! crate supplies the surrounding infrastructure:
//! - Content-hash keyed TTL/LRU caching of conversions
//! - Fixed-window rate limiting per client
//! - Memory-bounded processing of uploads
//! - Heuristic quality scoring of the produced Markdown

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::{middleware::ClientIpConfig, state::AppState};
use infrastructure::{
    cache::ConversionCache,
    extraction::{GeminiExtractor, HttpClient},
    rate_limit::RateLimiter,
    services::{ConversionService, ConversionServiceConfig},
};
use tracing::{info, warn};

/// Builds the conversion service and its collaborators from configuration
///
/// Background sweepers are not started here; callers running a long-lived
/// server spawn them on the returned cache and limiter.
pub fn create_conversion_service(config: &AppConfig) -> anyhow::Result<ConversionService> {
    let client = HttpClient::with_timeout(Duration::from_secs(config.gemini.timeout_secs))?;
    let api_key = config.gemini.api_key.clone().unwrap_or_default();

    let extractor = GeminiExtractor::with_base_url(client, api_key, &config.gemini.base_url)
        .with_models(&config.gemini.model, &config.gemini.fast_model)
        .with_generation(config.gemini.temperature, config.gemini.max_output_tokens);

    if extractor.is_configured() {
        info!(
            model = %config.gemini.model,
            fast_model = %config.gemini.fast_model,
            "Using Gemini extractor"
        );
    } else {
        warn!("No Gemini API key configured; conversions will fail until one is set");
    }

    let cache = Arc::new(ConversionCache::new(config.cache.to_bounded()));
    let rate_limiter = Arc::new(
        RateLimiter::new(config.rate_limit.to_domain())
            .with_cleanup_interval(config.rate_limit.sweep_interval()),
    );

    let service_config = ConversionServiceConfig {
        max_file_size: config.upload.max_file_size,
        max_in_memory_bytes: config.upload.max_in_memory_bytes,
        cache_ttl: None,
    };

    Ok(ConversionService::new(
        Arc::new(extractor),
        cache,
        rate_limiter,
        service_config,
    ))
}

/// Create the application state with all services initialized
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let service = create_conversion_service(config)?;
    let extractor_configured = config
        .gemini
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());

    let client_ip = ClientIpConfig {
        trust_proxy_headers: config.server.trust_proxy_headers,
    };

    Ok(AppState::new(Arc::new(service), extractor_configured).with_client_ip(client_ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_from_defaults() {
        let state = create_app_state(&AppConfig::default()).unwrap();

        assert!(!state.extractor_configured);
        assert!(!state.client_ip.trust_proxy_headers);
        assert_eq!(state.conversion_service.extractor_name(), "gemini");
        assert_eq!(
            state.conversion_service.config().max_file_size,
            20 * 1024 * 1024
        );
        assert_eq!(state.conversion_service.cache().config().max_entries, 100);
    }

    #[tokio::test]
    async fn test_app_state_with_key_is_configured() {
        let mut config = AppConfig::default();
        config.gemini.api_key = Some("key".to_string());

        let state = create_app_state(&config).unwrap();
        assert!(state.extractor_configured);
    }

    #[tokio::test]
    async fn test_app_state_carries_proxy_trust() {
        let mut config = AppConfig::default();
        config.server.trust_proxy_headers = true;

        let state = create_app_state(&config).unwrap();
        assert!(state.client_ip.trust_proxy_headers);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.rate_limit.max_requests = 0;

        assert!(create_app_state(&config).is_err());
    }
}
