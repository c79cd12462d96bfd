//! Rate limit infrastructure

mod fixed_window;

pub use fixed_window::RateLimiter;
