use std::time::Duration;

use serde::Deserialize;

use crate::domain::{DomainError, RateLimitConfig};
use crate::infrastructure::cache::BoundedCacheConfig;
use crate::infrastructure::extraction::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_FAST_MODEL, DEFAULT_GEMINI_MODEL,
};

const MIB: usize = 1024 * 1024;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gemini: GeminiConfig,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub upload: UploadConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Enable only behind a reverse proxy.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Extraction API settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fast_model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("fast_model", &self.fast_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_ms: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted upload, in bytes
    pub max_file_size: usize,
    /// Largest document held in memory for extraction, in bytes
    pub max_in_memory_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_proxy_headers: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            fast_model: DEFAULT_GEMINI_FAST_MODEL.to_string(),
            timeout_secs: 300,
            temperature: 0.1,
            max_output_tokens: 65_536,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_ms: 15 * 60 * 1000, // 15 minutes
            sweep_interval_secs: 300,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_secs: 3600, // 1 hour
            sweep_interval_secs: 300,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 20 * MIB,
            max_in_memory_bytes: 20 * MIB,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl RateLimitSettings {
    pub fn to_domain(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.max_requests, Duration::from_millis(self.window_ms))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl CacheSettings {
    pub fn to_bounded(&self) -> BoundedCacheConfig {
        BoundedCacheConfig::default()
            .with_max_entries(self.max_entries)
            .with_default_ttl(Duration::from_secs(self.ttl_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
    }
}

impl AppConfig {
    /// Loads `config/default`, `config/local`, `APP__*` variables and the flat
    /// variable fallbacks, in increasing precedence
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(app_config)
    }

    /// Applies the flat variables used by existing deployments
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key.trim().to_string());
            }
        }

        if let Some(value) = parse_var(&lookup, "RATE_LIMIT_MAX_REQUESTS")? {
            self.rate_limit.max_requests = value;
        }
        if let Some(value) = parse_var(&lookup, "RATE_LIMIT_WINDOW_MS")? {
            self.rate_limit.window_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "MAX_FILE_SIZE")? {
            self.upload.max_file_size = value;
            // every accepted upload must also fit the in-memory limit
            self.upload.max_in_memory_bytes = self.upload.max_in_memory_bytes.max(value);
        }
        if let Some(value) = parse_var(&lookup, "CACHE_TTL_SECS")? {
            self.cache.ttl_secs = value;
        }
        if let Some(value) = parse_var(&lookup, "CACHE_MAX_ENTRIES")? {
            self.cache.max_entries = value;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.server.port = port;
        }
        if let Some(trust) = parse_var(&lookup, "TRUST_PROXY_HEADERS")? {
            self.server.trust_proxy_headers = trust;
        }

        Ok(())
    }

    /// Rejects settings that would make the service unusable
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.rate_limit.max_requests == 0 {
            return Err(DomainError::configuration(
                "rate_limit.max_requests must be greater than 0",
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(DomainError::configuration(
                "rate_limit.window_ms must be greater than 0",
            ));
        }
        if self.upload.max_file_size == 0 {
            return Err(DomainError::configuration(
                "upload.max_file_size must be greater than 0",
            ));
        }
        if self.upload.max_in_memory_bytes < self.upload.max_file_size {
            return Err(DomainError::configuration(format!(
                "upload.max_in_memory_bytes ({}) must be at least upload.max_file_size ({})",
                self.upload.max_in_memory_bytes, self.upload.max_file_size
            )));
        }
        if self.cache.max_entries == 0 {
            return Err(DomainError::configuration(
                "cache.max_entries must be greater than 0",
            ));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(DomainError::configuration(
                "gemini.timeout_secs must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, DomainError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(|_| {
            DomainError::configuration(format!("{} has an invalid value: {}", key, raw))
        }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.upload.max_file_size, 20 * 1024 * 1024);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.sweep_interval_secs, 300);
        assert!(config.gemini.api_key.is_none());
        assert!(!config.server.trust_proxy_headers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_trust_proxy_headers_override() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[("TRUST_PROXY_HEADERS", "true")]))
            .unwrap();
        assert!(config.server.trust_proxy_headers);

        let result = config.apply_env_overrides(lookup_from(&[("TRUST_PROXY_HEADERS", "maybe")]));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[
                ("GOOGLE_API_KEY", " abc "),
                ("RATE_LIMIT_MAX_REQUESTS", "25"),
                ("RATE_LIMIT_WINDOW_MS", "60000"),
                ("MAX_FILE_SIZE", "1048576"),
                ("CACHE_TTL_SECS", "120"),
                ("CACHE_MAX_ENTRIES", "5"),
            ]))
            .unwrap();

        assert_eq!(config.gemini.api_key.as_deref(), Some("abc"));
        assert_eq!(config.rate_limit.to_domain(), RateLimitConfig::new(25, Duration::from_secs(60)));
        assert_eq!(config.upload.max_file_size, 1_048_576);
        assert_eq!(config.cache.to_bounded().default_ttl, Duration::from_secs(120));
        assert_eq!(config.cache.to_bounded().max_entries, 5);
    }

    #[test]
    fn test_gemini_key_takes_precedence() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[
                ("GEMINI_API_KEY", "primary"),
                ("GOOGLE_API_KEY", "secondary"),
            ]))
            .unwrap();

        assert_eq!(config.gemini.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_invalid_number_is_configuration_error() {
        let mut config = AppConfig::default();

        let result = config.apply_env_overrides(lookup_from(&[("RATE_LIMIT_MAX_REQUESTS", "lots")]));

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[("MAX_FILE_SIZE", ""), ("GEMINI_API_KEY", "  ")]))
            .unwrap();

        assert_eq!(config.upload.max_file_size, 20 * 1024 * 1024);
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.rate_limit.max_requests = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_file_size_override_raises_in_memory_limit() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[("MAX_FILE_SIZE", "52428800")]))
            .unwrap();

        assert_eq!(config.upload.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.upload.max_in_memory_bytes, 50 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_smaller_max_file_size_keeps_in_memory_limit() {
        let mut config = AppConfig::default();

        config
            .apply_env_overrides(lookup_from(&[("MAX_FILE_SIZE", "1048576")]))
            .unwrap();

        assert_eq!(config.upload.max_in_memory_bytes, 20 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_in_memory_limit_below_file_size() {
        let mut config = AppConfig::default();
        config.upload.max_file_size = 50 * 1024 * 1024;

        let result = config.validate();

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = GeminiConfig {
            api_key: Some("super-secret".to_string()),
            ..Default::default()
        };

        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "rate_limit": { "max_requests": 3 },
            "logging": { "format": "json" }
        }))
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.port, 8080);
    }
}
