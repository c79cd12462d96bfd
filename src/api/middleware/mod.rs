//! API middleware components

pub mod client_ip;
pub mod logging;
pub mod metrics;
pub mod security;

pub use client_ip::{ClientIdentity, ClientIpConfig};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use security::security_headers_middleware;
