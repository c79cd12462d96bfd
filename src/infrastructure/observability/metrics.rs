//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MetricsConfig;
use crate::domain::{ConversionMode, DomainError};

static RE_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static RE_NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
///
/// The recorder is process-global, so only the first call can succeed.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("mathmark_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record the end of a conversion request, successful or not
pub fn record_conversion(mode: ConversionMode, result: Result<bool, &DomainError>) {
    let (outcome, cached) = match result {
        Ok(true) => ("success", "true"),
        Ok(false) => ("success", "false"),
        Err(error) => (error.code(), "false"),
    };

    counter!(
        "conversions_total",
        "mode" => mode.to_string(),
        "outcome" => outcome,
        "cached" => cached
    )
    .increment(1);
}

/// Record a cache lookup
pub fn record_cache_lookup(mode: ConversionMode, hit: bool) {
    counter!(
        "conversion_cache_total",
        "mode" => mode.to_string(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("rate_limited_total").increment(1);
}

/// Record a call to the extraction backend
pub fn record_extraction(provider: &str, mode: ConversionMode, success: bool, duration: Duration) {
    let labels = [
        ("provider", provider.to_string()),
        ("mode", mode.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    histogram!("extraction_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record the quality score of a fresh conversion
pub fn record_quality(mode: ConversionMode, completeness_percent: u8) {
    histogram!("conversion_quality_percent", "mode" => mode.to_string())
        .record(f64::from(completeness_percent));
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = RE_UUID.replace_all(path, "{id}");
    let path = RE_NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    path.chars().take(50).collect()
}
