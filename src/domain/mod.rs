//! Domain layer - Core conversion types, policies and boundary traits

pub mod cache;
pub mod clock;
pub mod conversion;
pub mod error;
pub mod quality;
pub mod rate_limit;

pub use cache::{ContentHasher, ConversionCacheKey, Sha256ContentHasher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use conversion::{
    ConversionMode, ConversionOutcome, ConversionRecord, ConversionState, DocumentExtractor,
    DocumentMetadata, DocumentUpload, ExtractionRequest,
};
pub use error::DomainError;
pub use quality::{QualityReport, QualityScorer, QualityTier, StructureElements};
pub use rate_limit::{RateLimitConfig, RateLimitDecision};
