use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unsupported media type: {mime_type}")]
    UnsupportedMediaType { mime_type: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unsupported_media_type(mime_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            mime_type: mime_type.into(),
        }
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::RateLimited {
            retry_after_seconds,
        }
    }

    pub fn payload_too_large(size: usize, limit: usize) -> Self {
        Self::PayloadTooLarge { size, limit }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in API bodies and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::UnsupportedMediaType { .. } => "unsupported_media_type",
            Self::RateLimited { .. } => "rate_limited",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("File is empty");
        assert_eq!(error.to_string(), "Validation error: File is empty");
        assert_eq!(error.code(), "validation_error");
    }

    #[test]
    fn test_rate_limited_error() {
        let error = DomainError::rate_limited(42);
        assert_eq!(error.to_string(), "Rate limit exceeded, retry after 42s");
    }

    #[test]
    fn test_payload_too_large_error() {
        let error = DomainError::payload_too_large(2048, 1024);
        assert_eq!(
            error.to_string(),
            "Payload too large: 2048 bytes exceeds the 1024 byte limit"
        );
        assert_eq!(error.code(), "payload_too_large");
    }
}
