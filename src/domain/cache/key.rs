//! Content hashing and cache key generation

use std::fmt::{self, Debug};

use sha2::{Digest, Sha256};

use crate::domain::conversion::ConversionMode;

/// Computes a stable identifier for uploaded bytes
///
/// Collision resistance beyond what the chosen hash gives for free is not
/// relied upon: the identifier only has to be stable for the lifetime of the
/// process and distinct for distinct, non-adversarial uploads.
pub trait ContentHasher: Send + Sync + Debug {
    fn hash(&self, bytes: &[u8]) -> String;
}

/// SHA-256 content hasher producing 64 lowercase hex characters
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

impl ContentHasher for Sha256ContentHasher {
    fn hash(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

/// Cache key for a conversion: content hash namespaced by conversion mode
///
/// Fast and full conversions of the same file produce different Markdown,
/// so they never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversionCacheKey {
    pub mode: ConversionMode,
    pub content_hash: String,
}

impl ConversionCacheKey {
    pub fn new(mode: ConversionMode, content_hash: impl Into<String>) -> Self {
        Self {
            mode,
            content_hash: content_hash.into(),
        }
    }
}

impl fmt::Display for ConversionCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.content_hash)
    }
}
