//! Infrastructure services

mod conversion_service;

pub use conversion_service::{ConversionService, ConversionServiceConfig, ProgressSender};
