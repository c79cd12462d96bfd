//! Document conversion endpoints
//!
//! Both endpoints take a multipart form with a `file` part and an optional
//! `fast` (or `use_fast_path`) flag. `/convert` answers with a single JSON
//! body; `/convert/stream` answers with Server-Sent Events.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use super::middleware::ClientIdentity;
use super::state::AppState;
use super::types::{ApiError, ConvertResponse, ProgressEvent, StreamErrorEvent};
use crate::domain::{ConversionMode, ConversionState, DocumentUpload};

const FILE_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "upload";

/// Routes mounted under `/api`
pub fn create_convert_router() -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert_document))
        .route("/convert/stream", post(convert_document_stream))
}

/// Parsed multipart form
#[derive(Debug)]
struct ConvertForm {
    upload: DocumentUpload,
    mode: ConversionMode,
}

/// POST /api/convert
pub async fn convert_document(
    State(state): State<AppState>,
    client: ClientIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let form = read_form(multipart).await?;

    let outcome = state
        .conversion_service
        .convert(client.as_str(), form.upload, form.mode)
        .await?;

    Ok(Json(outcome.into()))
}

/// POST /api/convert/stream
///
/// Emits `progress` events for each state change, then one `result` or
/// `error` event, then `complete`. Malformed forms are rejected with a plain
/// JSON error before the stream opens.
pub async fn convert_document_stream(
    State(state): State<AppState>,
    client: ClientIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let form = read_form(multipart).await?;
    let stream = create_event_stream(state, client.0, form);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn create_event_stream(
    state: AppState,
    client_id: String,
    form: ConvertForm,
) -> ReceiverStream<Result<Event, Infallible>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    tokio::spawn(async move {
        let (progress_tx, mut progress_rx) = mpsc::channel::<ConversionState>(16);
        let service = state.conversion_service.clone();

        let conversion = async move {
            service
                .convert_with_progress(&client_id, form.upload, form.mode, Some(&progress_tx))
                .await
        };

        let forward_tx = tx.clone();
        let forward = async move {
            while let Some(update) = progress_rx.recv().await {
                let event = json_event("progress", &ProgressEvent::from(&update));
                if forward_tx.send(Ok(event)).await.is_err() {
                    break;
                }
            }
        };

        // Dropping the conversion future on disconnect releases its memory guard
        let result = tokio::select! {
            _ = tx.closed() => {
                info!("Client disconnected, abandoning conversion");
                return;
            }
            (result, ()) = async { tokio::join!(conversion, forward) } => result,
        };

        let last = match result {
            Ok(outcome) => json_event("result", &ConvertResponse::from(outcome)),
            Err(e) => json_event("error", &StreamErrorEvent::from(&e)),
        };

        let _ = tx.send(Ok(last)).await;
        let _ = tx
            .send(Ok(Event::default().event("complete").data("{}")))
            .await;
    });

    ReceiverStream::new(rx)
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| {
            error!(event = name, error = %e, "Failed to serialize SSE payload");
            Event::default().event(name).data("{}")
        })
}

async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<ConvertForm, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::bad_request(rejection.body_text()).with_code("invalid_multipart")
    })?;

    let mut upload = None;
    let mut fast = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            FILE_FIELD => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_FILE_NAME)
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;

                debug!(file = %file_name, size = bytes.len(), "Received upload");
                upload = Some(DocumentUpload::new(file_name, content_type.as_deref(), bytes));
            }
            "fast" | "use_fast_path" | "useFastPath" => {
                let value = field.text().await.map_err(multipart_error)?;
                fast = parse_flag(&value);
            }
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    let upload = upload.ok_or_else(|| {
        ApiError::bad_request("No file provided in the 'file' form field").with_code("missing_file")
    })?;

    Ok(ConvertForm {
        upload,
        mode: ConversionMode::from_fast_flag(fast),
    })
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text()).with_code("payload_too_large")
    } else {
        ApiError::bad_request(err.body_text()).with_code("invalid_multipart")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        extract::ConnectInfo,
        http::{Request, header},
    };
    use tower::ServiceExt;

    use crate::api::middleware::ClientIpConfig;
    use crate::api::router::create_router;
    use crate::domain::conversion::MockDocumentExtractor;
    use crate::domain::{ManualClock, RateLimitConfig};
    use crate::infrastructure::cache::{BoundedCacheConfig, ConversionCache};
    use crate::infrastructure::rate_limit::RateLimiter;
    use crate::infrastructure::services::{ConversionService, ConversionServiceConfig};

    const BOUNDARY: &str = "mathmark-test-boundary";
    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Page >> endobj\nBT (E = mc^2) Tj ET\n";
    const MARKDOWN: &str = "# Relativity\n\nEnergy is $E = mc^2$.\n";

    fn extractor(times: usize) -> MockDocumentExtractor {
        let mut mock = MockDocumentExtractor::new();
        mock.expect_extract()
            .times(times)
            .returning(|_| Ok(MARKDOWN.to_string()));
        mock.expect_provider_name().return_const("mock");
        mock
    }

    fn app(extractor: MockDocumentExtractor, rate_limit: RateLimitConfig) -> Router {
        app_with_client_ip(extractor, rate_limit, ClientIpConfig::default())
    }

    fn app_with_client_ip(
        extractor: MockDocumentExtractor,
        rate_limit: RateLimitConfig,
        client_ip: ClientIpConfig,
    ) -> Router {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(ConversionCache::with_clock(
            BoundedCacheConfig::default(),
            clock.clone(),
        ));
        let limiter = Arc::new(RateLimiter::with_clock(rate_limit, clock));
        let service = ConversionService::new(
            Arc::new(extractor),
            cache,
            limiter,
            ConversionServiceConfig::default(),
        );

        create_router(
            AppState::new(Arc::new(service), true).with_client_ip(client_ip),
            ConversionServiceConfig::default().max_file_size,
        )
    }

    fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8], fast: bool) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");

        if fast {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fast\"\r\n\r\ntrue\r\n"
                )
                .as_bytes(),
            );
        }

        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn pdf_request(uri: &str) -> Request<Body> {
        upload_request(uri, multipart_body("relativity.pdf", "application/pdf", PDF, false))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_convert_round_trip() {
        let app = app(extractor(1), RateLimitConfig::default());

        let response = app.oneshot(pdf_request("/api/convert")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["markdown"], MARKDOWN);
        assert_eq!(json["metadata"]["title"], "Relativity");
        assert_eq!(json["metadata"]["total_pages"], 1);
        assert_eq!(json["metadata"]["has_formulas"], true);
        assert_eq!(json["cached"], false);
        assert_eq!(json["mode"], "full");
        assert_eq!(json["content_hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_repeat_upload_is_cached() {
        let app = app(extractor(1), RateLimitConfig::default());

        let first = app.clone().oneshot(pdf_request("/api/convert")).await.unwrap();
        let first = json_body(first).await;

        let second = app.oneshot(pdf_request("/api/convert")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let second = json_body(second).await;

        assert_eq!(second["cached"], true);
        assert_eq!(second["markdown"], first["markdown"]);
        assert_eq!(second["quality"], first["quality"]);
    }

    #[tokio::test]
    async fn test_fast_flag_selects_fast_mode() {
        let app = app(extractor(1), RateLimitConfig::default());
        let body = multipart_body("relativity.pdf", "application/pdf", PDF, true);

        let response = app
            .oneshot(upload_request("/api/convert", body))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["mode"], "fast");
    }

    #[tokio::test]
    async fn test_unsupported_type_is_415() {
        let app = app(extractor(0), RateLimitConfig::default());
        let body = multipart_body("notes.txt", "text/plain", b"just some plain text", false);

        let response = app
            .oneshot(upload_request("/api/convert", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "unsupported_media_type");
    }

    #[tokio::test]
    async fn test_missing_file_is_400() {
        let app = app(extractor(0), RateLimitConfig::default());
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fast\"\r\n\r\ntrue\r\n--{BOUNDARY}--\r\n"
        );

        let response = app
            .oneshot(upload_request("/api/convert", body.into_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "missing_file");
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_400() {
        let app = app(extractor(0), RateLimitConfig::default());
        let request = Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_rate_limited_is_429_with_retry_after() {
        let app = app(
            extractor(1),
            RateLimitConfig::new(1, std::time::Duration::from_secs(60)),
        );

        let first = app.clone().oneshot(pdf_request("/api/convert")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(pdf_request("/api/convert")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "60");

        let json = json_body(second).await;
        assert_eq!(json["error"]["type"], "rate_limit_error");
        assert_eq!(json["error"]["retry_after"], 60);
    }

    fn pdf_request_from(peer: [u8; 4], forwarded_for: &str) -> Request<Body> {
        let mut request = pdf_request("/api/convert");
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded_for.parse().unwrap());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_bypass_limit() {
        let app = app(
            extractor(1),
            RateLimitConfig::new(1, std::time::Duration::from_secs(60)),
        );

        let mut statuses = Vec::new();
        for i in 0..5 {
            let request = pdf_request_from([192, 0, 2, 50], &format!("10.9.9.{i}"));
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..]
            .iter()
            .all(|status| *status == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_trusted_proxy_limits_by_appended_hop() {
        let app = app_with_client_ip(
            extractor(1),
            RateLimitConfig::new(1, std::time::Duration::from_secs(60)),
            ClientIpConfig {
                trust_proxy_headers: true,
            },
        );
        let proxy = [10, 0, 0, 1];

        let first = app
            .clone()
            .oneshot(pdf_request_from(proxy, "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // a forged leftmost entry does not give the same client a new bucket
        let forged = app
            .clone()
            .oneshot(pdf_request_from(proxy, "10.9.9.9, 203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::TOO_MANY_REQUESTS);

        // served from the cache, so the extractor still runs once
        let other_client = app
            .oneshot(pdf_request_from(proxy, "203.0.113.2"))
            .await
            .unwrap();
        assert_eq!(other_client.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_502() {
        let mut mock = MockDocumentExtractor::new();
        mock.expect_extract()
            .returning(|_| Err(crate::domain::DomainError::extraction("quota exhausted")));
        mock.expect_provider_name().return_const("mock");
        let app = app(mock, RateLimitConfig::default());

        let response = app.oneshot(pdf_request("/api/convert")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = json_body(response).await;
        let message = json["error"]["message"].as_str().unwrap();
        assert!(!message.contains("quota exhausted"));
    }

    fn sse_events(body: &str) -> Vec<(String, String)> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event: ") {
                        name = Some(value.to_string());
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data = Some(value.to_string());
                    }
                }
                Some((name?, data.unwrap_or_default()))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stream_emits_progress_result_complete() {
        let app = app(extractor(1), RateLimitConfig::default());

        let response = app
            .oneshot(pdf_request("/api/convert/stream"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events = sse_events(std::str::from_utf8(&bytes).unwrap());
        let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();

        let (progress, last_two) = names.split_at(names.len() - 2);
        assert!(progress.iter().all(|name| *name == "progress"));
        assert_eq!(last_two, ["result", "complete"]);

        let stages: Vec<String> = events
            .iter()
            .filter(|(name, _)| name == "progress")
            .map(|(_, data)| {
                let json: serde_json::Value = serde_json::from_str(data).unwrap();
                json["stage"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            stages,
            [
                "rate_limit_checking",
                "hashing",
                "cache_checking",
                "extracting",
                "scoring",
                "caching",
                "done"
            ]
        );

        let result: serde_json::Value = serde_json::from_str(&events[events.len() - 2].1).unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["markdown"], MARKDOWN);
    }

    #[tokio::test]
    async fn test_stream_reports_rate_limit_as_error_event() {
        let app = app(extractor(0), RateLimitConfig::new(0, std::time::Duration::from_secs(30)));

        let response = app
            .oneshot(pdf_request("/api/convert/stream"))
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events = sse_events(std::str::from_utf8(&bytes).unwrap());

        let (name, data) = &events[events.len() - 2];
        assert_eq!(name, "error");
        let error: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(error["code"], "rate_limited");
        assert_eq!(error["retry_after"], 30);
        assert_eq!(events.last().unwrap().0, "complete");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("Yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
