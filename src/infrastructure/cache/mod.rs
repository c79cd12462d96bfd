//! Cache infrastructure - In-process conversion result cache

mod bounded;

pub use bounded::{BoundedCache, BoundedCacheConfig, CacheEntryInfo, CacheStats};

use std::sync::Arc;

use crate::domain::{ConversionCacheKey, ConversionRecord};

/// Cache of finished conversions keyed by mode and content hash
pub type ConversionCache = BoundedCache<ConversionCacheKey, Arc<ConversionRecord>>;
