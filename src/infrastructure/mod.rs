//! Infrastructure layer - Cache, rate limiting, memory guard and the extraction adapter

pub mod cache;
pub mod extraction;
pub mod logging;
pub mod memory;
pub mod observability;
pub mod rate_limit;
pub mod services;
