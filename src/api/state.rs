//! Shared state for request handlers

use std::sync::Arc;

use axum::extract::FromRef;

use super::middleware::ClientIpConfig;
use crate::infrastructure::services::ConversionService;

/// Application state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub conversion_service: Arc<ConversionService>,
    /// Whether an extraction API key was provided at startup
    pub extractor_configured: bool,
    pub client_ip: ClientIpConfig,
}

impl AppState {
    pub fn new(conversion_service: Arc<ConversionService>, extractor_configured: bool) -> Self {
        Self {
            conversion_service,
            extractor_configured,
            client_ip: ClientIpConfig::default(),
        }
    }

    pub fn with_client_ip(mut self, client_ip: ClientIpConfig) -> Self {
        self.client_ip = client_ip;
        self
    }
}

impl FromRef<AppState> for ClientIpConfig {
    fn from_ref(state: &AppState) -> Self {
        state.client_ip
    }
}
