//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_cache_lookup, record_conversion,
    record_extraction, record_http_request, record_quality, record_rate_limited,
    PrometheusMetrics,
};
