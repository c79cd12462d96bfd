//! Uploaded document and its admission checks

use bytes::Bytes;

use crate::domain::DomainError;

pub const MIME_PDF: &str = "application/pdf";

/// Media types the extraction API accepts as native file input
pub const SUPPORTED_MIME_TYPES: &[&str] = &[MIME_PDF, "image/png", "image/jpeg", "image/webp"];

const OCTET_STREAM: &str = "application/octet-stream";

/// A file received for conversion
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl DocumentUpload {
    /// Builds an upload, resolving the media type from content, the declared
    /// type and the file name, in that order
    pub fn new(file_name: impl Into<String>, declared_mime: Option<&str>, bytes: Bytes) -> Self {
        let file_name = file_name.into();
        let mime_type = resolve_mime_type(&file_name, declared_mime, &bytes);

        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF
    }

    /// File name without directory or extension
    pub fn file_stem(&self) -> &str {
        let name = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name);

        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }

    /// Rejects empty, oversized and unsupported uploads
    pub fn validate(&self, max_file_size: usize) -> Result<(), DomainError> {
        if self.bytes.is_empty() {
            return Err(DomainError::validation("Uploaded file is empty"));
        }

        if self.size() > max_file_size {
            return Err(DomainError::validation(format!(
                "File size {} bytes exceeds the maximum of {} bytes",
                self.size(),
                max_file_size
            )));
        }

        if !SUPPORTED_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(DomainError::unsupported_media_type(&self.mime_type));
        }

        Ok(())
    }
}

/// Media type detection: magic bytes win, then the declared type, then the
/// file extension
pub fn resolve_mime_type(file_name: &str, declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(sniffed) = sniff_mime_type(bytes) {
        return sniffed.to_string();
    }

    let declared = declared
        .map(|mime| mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty() && mime != OCTET_STREAM);

    if let Some(mime) = declared {
        return mime;
    }

    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        Some(MIME_PDF)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
