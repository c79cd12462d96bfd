use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::sample::count_pdf_pages;
use super::upload::DocumentUpload;
use crate::domain::quality::{predicates, QualityReport};
use crate::domain::DomainError;

/// Which extraction path to take
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Detailed prompt on the primary model
    #[default]
    Full,
    /// Shorter prompt on the lighter model
    Fast,
}

impl ConversionMode {
    pub fn from_fast_flag(fast: bool) -> Self {
        if fast { Self::Fast } else { Self::Full }
    }
}

impl std::fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

impl std::str::FromStr for ConversionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "fast" => Ok(Self::Fast),
            _ => Err(DomainError::validation(format!(
                "Unknown conversion mode: {}. Valid modes: full, fast",
                s
            ))),
        }
    }
}

/// Descriptive facts about a converted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub total_pages: u32,
    pub has_images: bool,
    pub has_formulas: bool,
    pub has_tables: bool,
}

impl DocumentMetadata {
    /// Derives metadata from the upload and the produced Markdown
    pub fn derive(upload: &DocumentUpload, markdown: &str) -> Self {
        let title =
            predicates::first_title(markdown).unwrap_or_else(|| upload.file_stem().to_string());

        let total_pages = if upload.is_pdf() {
            count_pdf_pages(&upload.bytes).max(1)
        } else {
            1
        };

        Self {
            title,
            total_pages,
            has_images: predicates::has_image(markdown),
            has_formulas: predicates::has_formula(markdown),
            has_tables: predicates::has_table_row(markdown),
        }
    }
}

/// Cached result of one successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub markdown: String,
    pub metadata: DocumentMetadata,
    pub quality: QualityReport,
}

/// What the service hands back for a request
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub record: Arc<ConversionRecord>,
    pub content_hash: String,
    pub mode: ConversionMode,
    pub cache_hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("FAST".parse::<ConversionMode>().unwrap(), ConversionMode::Fast);
        assert_eq!("full".parse::<ConversionMode>().unwrap(), ConversionMode::Full);
        assert!("turbo".parse::<ConversionMode>().is_err());
        assert_eq!(ConversionMode::from_fast_flag(true), ConversionMode::Fast);
    }

    #[test]
    fn test_metadata_from_pdf() {
        let pdf = Bytes::from_static(
            b"%PDF-1.4\n1 0 obj << /Type /Pages /Count 2 >> endobj\n\
2 0 obj << /Type /Page >> endobj\n3 0 obj << /Type/Page >> endobj\n",
        );
        let upload = DocumentUpload::new("calculus.pdf", None, pdf);
        let markdown = "# Limits\n\n$$\\lim_{x \\to 0} f(x)$$\n\n| x | f |\n|---|---|\n";

        let metadata = DocumentMetadata::derive(&upload, markdown);

        assert_eq!(metadata.title, "Limits");
        assert_eq!(metadata.total_pages, 2);
        assert!(metadata.has_formulas);
        assert!(metadata.has_tables);
        assert!(!metadata.has_images);
    }

    #[test]
    fn test_metadata_title_falls_back_to_file_stem() {
        let upload = DocumentUpload::new(
            "whiteboard.png",
            None,
            Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
        );

        let metadata = DocumentMetadata::derive(&upload, "Plain text ![eq](eq.png)");

        assert_eq!(metadata.title, "whiteboard");
        assert_eq!(metadata.total_pages, 1);
        assert!(metadata.has_images);
    }
}
