//! Conversion request and response bodies

use serde::{Deserialize, Serialize};

use crate::domain::{
    ConversionMode, ConversionOutcome, ConversionState, DocumentMetadata, DomainError,
    QualityReport,
};

/// Successful conversion body, also the payload of the SSE `result` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub markdown: String,
    pub metadata: DocumentMetadata,
    pub quality: QualityReport,
    pub cached: bool,
    pub content_hash: String,
    pub mode: ConversionMode,
}

impl From<ConversionOutcome> for ConvertResponse {
    fn from(outcome: ConversionOutcome) -> Self {
        let record = outcome.record;

        Self {
            success: true,
            markdown: record.markdown.clone(),
            metadata: record.metadata.clone(),
            quality: record.quality.clone(),
            cached: outcome.cache_hit,
            content_hash: outcome.content_hash,
            mode: outcome.mode,
        }
    }
}

/// SSE `progress` event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub message: String,
}

impl From<&ConversionState> for ProgressEvent {
    fn from(state: &ConversionState) -> Self {
        Self {
            stage: state.stage().to_string(),
            message: state.description(),
        }
    }
}

/// SSE `error` event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamErrorEvent {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&DomainError> for StreamErrorEvent {
    fn from(err: &DomainError) -> Self {
        let retry_after = match err {
            DomainError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        };

        Self {
            message: err.to_string(),
            code: err.code().to_string(),
            retry_after,
        }
    }
}
