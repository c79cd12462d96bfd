use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http_client::HttpClientTrait;
use crate::domain::{ConversionMode, DocumentExtractor, DomainError, ExtractionRequest};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GEMINI_FAST_MODEL: &str = "gemini-2.5-flash";

/// Gemini `generateContent` extractor sending the document as inline data
pub struct GeminiExtractor<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
    model: String,
    fast_model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl<C: HttpClientTrait> std::fmt::Debug for GeminiExtractor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiExtractor")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("fast_model", &self.fast_model)
            .field("api_key_set", &self.is_configured())
            .finish()
    }
}

impl<C: HttpClientTrait> GeminiExtractor<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_GEMINI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            api_key: api_key.into(),
            base_url,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            fast_model: DEFAULT_GEMINI_FAST_MODEL.to_string(),
            temperature: 0.1,
            max_output_tokens: 65_536,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn with_models(mut self, model: impl Into<String>, fast_model: impl Into<String>) -> Self {
        self.model = model.into();
        self.fast_model = fast_model.into();
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model_for(&self, mode: ConversionMode) -> &str {
        match mode {
            ConversionMode::Full => &self.model,
            ConversionMode::Fast => &self.fast_model,
        }
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-goog-api-key", self.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, request: &ExtractionRequest) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": request.mime_type,
                            "data": BASE64.encode(&request.bytes),
                        }
                    },
                    { "text": request.prompt }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<String, DomainError> {
        let response: GeminiResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::extraction(format!("Failed to parse Gemini response: {}", e))
        })?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(DomainError::extraction(format!(
                "Document was blocked by the model: {}",
                reason
            )));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::extraction("Gemini returned no candidates"))?;

        match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => {
                return Err(DomainError::extraction(format!(
                    "Generation stopped: {}",
                    reason
                )));
            }
            Some("MAX_TOKENS") => {
                warn!("Gemini output hit the token limit, Markdown may be truncated");
            }
            _ => {}
        }

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(DomainError::extraction("Gemini returned an empty document"));
        }

        if let Some(usage) = response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini token usage"
            );
        }

        Ok(text)
    }
}

#[async_trait]
impl<C: HttpClientTrait> DocumentExtractor for GeminiExtractor<C> {
    async fn extract(&self, request: ExtractionRequest) -> Result<String, DomainError> {
        if !self.is_configured() {
            return Err(DomainError::configuration(
                "Gemini API key is not set (GEMINI_API_KEY or GOOGLE_API_KEY)",
            ));
        }

        let model = self.model_for(request.mode);
        let url = self.generate_url(model);
        let body = self.build_request(&request);

        debug!(
            model = %model,
            mime_type = %request.mime_type,
            bytes = request.bytes.len(),
            "Sending document to Gemini"
        );

        let response = self.client.post_json(&url, self.headers(), &body).await?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
