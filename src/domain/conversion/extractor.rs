//! Extraction backend abstraction

use async_trait::async_trait;
use bytes::Bytes;

use super::ConversionMode;
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Everything a backend needs to turn one document into Markdown
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub bytes: Bytes,
    pub mime_type: String,
    pub prompt: String,
    pub mode: ConversionMode,
}

/// Backend that converts a document to Markdown
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Converts the document; the returned string is the raw model output
    async fn extract(&self, request: ExtractionRequest) -> Result<String, DomainError>;

    /// Short backend identifier for logs and metrics
    fn provider_name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentExtractor({})", self.provider_name())
    }
}
