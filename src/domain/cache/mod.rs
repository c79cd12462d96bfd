//! Cache domain - content hashing and cache key types

mod key;

pub use key::{ContentHasher, ConversionCacheKey, Sha256ContentHasher};
