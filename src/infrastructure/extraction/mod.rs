//! Extraction infrastructure - Gemini adapter, prompts and output cleanup

mod gemini;
pub mod http_client;
pub mod postprocess;
pub mod prompts;

pub use gemini::{
    GeminiExtractor, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_FAST_MODEL, DEFAULT_GEMINI_MODEL,
};
pub use http_client::{HttpClient, HttpClientTrait};
pub use postprocess::clean_markdown;
pub use prompts::prompt_for;
