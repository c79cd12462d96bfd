//! Request and response types for the HTTP API

pub mod convert;
pub mod error;

pub use convert::{ConvertResponse, ProgressEvent, StreamErrorEvent};
pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
