//! Document conversion domain

mod extractor;
mod record;
pub mod sample;
mod state;
mod upload;

#[cfg(test)]
pub use extractor::MockDocumentExtractor;
pub use extractor::{DocumentExtractor, ExtractionRequest};
pub use record::{ConversionMode, ConversionOutcome, ConversionRecord, DocumentMetadata};
pub use state::ConversionState;
pub use upload::{resolve_mime_type, DocumentUpload, MIME_PDF, SUPPORTED_MIME_TYPES};
