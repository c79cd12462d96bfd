//! Conversion orchestration
//!
//! validate → rate limit → hash → cache lookup → guarded extraction →
//! cleanup → scoring → cache store. Only successful conversions are stored.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::conversion::sample::source_sample;
use crate::domain::{
    ContentHasher, ConversionCacheKey, ConversionMode, ConversionOutcome, ConversionRecord,
    ConversionState, DocumentExtractor, DocumentMetadata, DocumentUpload, DomainError,
    ExtractionRequest, QualityScorer, Sha256ContentHasher,
};
use crate::infrastructure::cache::ConversionCache;
use crate::infrastructure::extraction::{clean_markdown, prompt_for};
use crate::infrastructure::memory::MemoryGuardedExecutor;
use crate::infrastructure::observability::{
    record_cache_lookup, record_conversion, record_extraction, record_quality,
    record_rate_limited,
};
use crate::infrastructure::rate_limit::RateLimiter;

const EXTRACTION_FAILED_MESSAGE: &str = "The extraction service could not convert the document";
const EMPTY_OUTPUT_MESSAGE: &str = "The extraction service returned no content";

/// Channel through which streaming callers observe progress
pub type ProgressSender = mpsc::Sender<ConversionState>;

/// Limits applied by the conversion service
#[derive(Debug, Clone)]
pub struct ConversionServiceConfig {
    /// Largest accepted upload, in bytes
    pub max_file_size: usize,
    /// Largest document handed to the extractor, in bytes
    pub max_in_memory_bytes: usize,
    /// TTL for stored conversions, `None` for the cache default
    pub cache_ttl: Option<Duration>,
}

impl Default for ConversionServiceConfig {
    fn default() -> Self {
        Self {
            max_file_size: 20 * 1024 * 1024,
            max_in_memory_bytes: 20 * 1024 * 1024,
            cache_ttl: None,
        }
    }
}

/// Orchestrates a single conversion request
#[derive(Debug)]
pub struct ConversionService {
    extractor: Arc<dyn DocumentExtractor>,
    cache: Arc<ConversionCache>,
    rate_limiter: Arc<RateLimiter>,
    hasher: Arc<dyn ContentHasher>,
    memory_guard: MemoryGuardedExecutor,
    scorer: QualityScorer,
    config: ConversionServiceConfig,
}

impl ConversionService {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        cache: Arc<ConversionCache>,
        rate_limiter: Arc<RateLimiter>,
        config: ConversionServiceConfig,
    ) -> Self {
        Self {
            extractor,
            cache,
            rate_limiter,
            hasher: Arc::new(Sha256ContentHasher),
            memory_guard: MemoryGuardedExecutor::default(),
            scorer: QualityScorer::new(),
            config,
        }
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_memory_guard(mut self, memory_guard: MemoryGuardedExecutor) -> Self {
        self.memory_guard = memory_guard;
        self
    }

    pub fn cache(&self) -> &Arc<ConversionCache> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn memory_guard(&self) -> &MemoryGuardedExecutor {
        &self.memory_guard
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.provider_name()
    }

    pub fn config(&self) -> &ConversionServiceConfig {
        &self.config
    }

    pub async fn convert(
        &self,
        client_id: &str,
        upload: DocumentUpload,
        mode: ConversionMode,
    ) -> Result<ConversionOutcome, DomainError> {
        self.convert_with_progress(client_id, upload, mode, None)
            .await
    }

    /// Converts `upload`, reporting each state change to `progress`
    ///
    /// The final state sent is `Done`, `RateLimited` or `Errored`.
    #[instrument(
        skip(self, upload, progress),
        fields(client = %client_id, mode = %mode, file = %upload.file_name, size = upload.size())
    )]
    pub async fn convert_with_progress(
        &self,
        client_id: &str,
        upload: DocumentUpload,
        mode: ConversionMode,
        progress: Option<&ProgressSender>,
    ) -> Result<ConversionOutcome, DomainError> {
        let progress = Progress { sender: progress };
        let result = self.run(client_id, upload, mode, &progress).await;

        record_conversion(mode, result.as_ref().map(|outcome| outcome.cache_hit));

        match &result {
            Ok(outcome) => {
                info!(
                    content_hash = %outcome.content_hash,
                    cached = outcome.cache_hit,
                    completeness = outcome.record.quality.completeness_percent,
                    "Conversion completed"
                );
            }
            Err(DomainError::RateLimited { .. }) => {}
            Err(e) => {
                warn!(code = e.code(), error = %e, "Conversion failed");
                progress
                    .emit(ConversionState::Errored {
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    async fn run(
        &self,
        client_id: &str,
        upload: DocumentUpload,
        mode: ConversionMode,
        progress: &Progress<'_>,
    ) -> Result<ConversionOutcome, DomainError> {
        upload.validate(self.config.max_file_size)?;

        progress.emit(ConversionState::RateLimitChecking).await;
        let decision = self.rate_limiter.check(client_id).await;
        if !decision.allowed {
            let retry_after_seconds = decision.retry_after_seconds.unwrap_or(1);
            record_rate_limited();
            info!(retry_after_seconds, "Conversion rate limited");

            progress
                .emit(ConversionState::RateLimited {
                    retry_after_seconds,
                })
                .await;
            return Err(DomainError::rate_limited(retry_after_seconds));
        }

        progress.emit(ConversionState::Hashing).await;
        let content_hash = self.hasher.hash(&upload.bytes);
        let key = ConversionCacheKey::new(mode, content_hash.clone());

        progress.emit(ConversionState::CacheChecking).await;
        if let Some(record) = self.cache.get(&key).await {
            record_cache_lookup(mode, true);
            debug!(key = %key, "Cache hit");

            progress.emit(ConversionState::CacheHit).await;
            progress.emit(ConversionState::Done).await;

            return Ok(ConversionOutcome {
                record,
                content_hash,
                mode,
                cache_hit: true,
            });
        }
        record_cache_lookup(mode, false);

        progress.emit(ConversionState::Extracting).await;
        let markdown = self.extract(&upload, mode).await?;

        progress.emit(ConversionState::Scoring).await;
        let sample = source_sample(&upload.bytes, upload.is_pdf());
        let quality = self.scorer.analyze(&sample, &markdown);
        record_quality(mode, quality.completeness_percent);
        let metadata = DocumentMetadata::derive(&upload, &markdown);

        let record = Arc::new(ConversionRecord {
            markdown,
            metadata,
            quality,
        });

        progress.emit(ConversionState::Caching).await;
        self.cache
            .set(key, record.clone(), self.config.cache_ttl)
            .await;

        progress.emit(ConversionState::Done).await;

        Ok(ConversionOutcome {
            record,
            content_hash,
            mode,
            cache_hit: false,
        })
    }

    /// Runs the extractor inside the memory guard and cleans its output
    async fn extract(
        &self,
        upload: &DocumentUpload,
        mode: ConversionMode,
    ) -> Result<String, DomainError> {
        let request = ExtractionRequest {
            bytes: upload.bytes.clone(),
            mime_type: upload.mime_type.clone(),
            prompt: prompt_for(mode).to_string(),
            mode,
        };
        let provider = self.extractor.provider_name();

        let raw = self
            .memory_guard
            .run(upload.size(), self.config.max_in_memory_bytes, || async {
                let started = Instant::now();
                let result = self.extractor.extract(request).await;
                record_extraction(provider, mode, result.is_ok(), started.elapsed());

                result.map_err(|e| match e {
                    DomainError::Configuration { .. } => e,
                    other => {
                        error!(provider, error = %other, "Extraction backend failed");
                        DomainError::extraction(EXTRACTION_FAILED_MESSAGE)
                    }
                })
            })
            .await?;

        let markdown = clean_markdown(&raw);
        if markdown.is_empty() {
            warn!(provider, "Extraction backend returned only whitespace");
            return Err(DomainError::extraction(EMPTY_OUTPUT_MESSAGE));
        }

        Ok(markdown)
    }
}

/// Optional progress reporting for one request
struct Progress<'a> {
    sender: Option<&'a ProgressSender>,
}

impl Progress<'_> {
    async fn emit(&self, state: ConversionState) {
        debug!(stage = state.stage(), "Conversion state");

        if let Some(sender) = self.sender {
            // a closed receiver is ignored here; the stream handler drops this
            // future once its client disconnects
            let _ = sender.send(state).await;
        }
    }
}
