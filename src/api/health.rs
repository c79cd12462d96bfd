//! Health check endpoints for Kubernetes probes

use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;

/// Detailed health response with component status
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Health check status
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health check
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Returns 200 while the process is serving
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: None,
        latency_ms: None,
    };

    (StatusCode::OK, Json(response))
}

/// Liveness probe
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: extractor configuration plus cache and limiter occupancy
///
/// A missing API key makes the service unready since every conversion would
/// fail.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let checks = vec![
        check_extractor(&state),
        check_cache(&state).await,
        check_rate_limiter(&state).await,
    ];

    let overall_status = checks
        .iter()
        .map(|check| check.status)
        .fold(HealthStatus::Healthy, worst);

    let response = HealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: Some(checks),
        latency_ms: Some(start.elapsed().as_millis() as u64),
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

fn worst(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    match (a, b) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

fn check_extractor(state: &AppState) -> HealthCheck {
    let provider = state.conversion_service.extractor_name();

    if state.extractor_configured {
        HealthCheck {
            name: "extractor".to_string(),
            status: HealthStatus::Healthy,
            message: Some(format!("{} configured", provider)),
        }
    } else {
        HealthCheck {
            name: "extractor".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some("No extraction API key configured".to_string()),
        }
    }
}

async fn check_cache(state: &AppState) -> HealthCheck {
    let cache = state.conversion_service.cache();
    let stats = cache.stats().await;
    let capacity = cache.config().max_entries;

    HealthCheck {
        name: "cache".to_string(),
        status: HealthStatus::Healthy,
        message: Some(format!(
            "{}/{} entries, {} hits, {} misses",
            stats.entries, capacity, stats.hits, stats.misses
        )),
    }
}

async fn check_rate_limiter(state: &AppState) -> HealthCheck {
    let tracked = state
        .conversion_service
        .rate_limiter()
        .tracked_identifiers()
        .await;

    HealthCheck {
        name: "rate_limiter".to_string(),
        status: HealthStatus::Healthy,
        message: Some(format!("{} clients tracked", tracked)),
    }
}
