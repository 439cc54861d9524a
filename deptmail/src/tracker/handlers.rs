//! Tracker request handlers.
//!
//! `record_open` and `get_open_count` are transport-agnostic: they return a
//! [`TrackerResponse`] in the serverless proxy shape (base64 body plus an
//! `isBase64Encoded` flag). The axum router adapts those responses to plain
//! HTTP, decoding binary bodies the way an API gateway would.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::blob::BlobStore;
use super::store::{CounterStore, StorageError};

/// Shared tracker state, built once at startup and cloned into every request.
#[derive(Clone)]
pub struct TrackerState {
    counter: Arc<dyn CounterStore>,
    blobs: Arc<dyn BlobStore>,
    counter_key: Arc<str>,
    pixel_key: Arc<str>,
}

impl TrackerState {
    pub fn new(
        counter: Arc<dyn CounterStore>,
        blobs: Arc<dyn BlobStore>,
        counter_key: impl Into<Arc<str>>,
        pixel_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            counter,
            blobs,
            counter_key: counter_key.into(),
            pixel_key: pixel_key.into(),
        }
    }
}

/// Handler response in the serverless proxy-integration shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl TrackerResponse {
    fn new(status: StatusCode, content_type: &str, body: String, is_base64_encoded: bool) -> Self {
        let headers = [
            (header::CONTENT_TYPE.as_str().to_string(), content_type.to_string()),
            (header::CACHE_CONTROL.as_str().to_string(), "no-store".to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            status_code: status.as_u16(),
            headers,
            body,
            is_base64_encoded,
        }
    }

    fn storage_failure(error: &StorageError) -> Self {
        error!(error = %error, "tracker_storage_failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            "storage unavailable".to_string(),
            false,
        )
    }

    /// Raw body bytes, with base64 bodies decoded.
    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body)
        } else {
            Ok(self.body.clone().into_bytes())
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Count one open and return the tracking pixel.
///
/// The increment is a single atomic store operation. A storage failure
/// (counter or pixel) produces a 500, never a pixel.
pub async fn record_open(state: &TrackerState) -> TrackerResponse {
    let count = match state.counter.increment(&state.counter_key).await {
        Ok(count) => count,
        Err(e) => return TrackerResponse::storage_failure(&e),
    };

    let pixel = match state.blobs.fetch(&state.pixel_key).await {
        Ok(pixel) => pixel,
        Err(e) => return TrackerResponse::storage_failure(&e),
    };

    info!(
        counter_key = %state.counter_key,
        open_count = count,
        pixel_bytes = pixel.len(),
        "open_recorded"
    );

    TrackerResponse::new(StatusCode::OK, "image/png", STANDARD.encode(pixel), true)
}

/// Return the current open count without changing it.
pub async fn get_open_count(state: &TrackerState) -> TrackerResponse {
    match state.counter.get(&state.counter_key).await {
        Ok(count) => {
            info!(counter_key = %state.counter_key, open_count = count, "open_count_read");
            TrackerResponse::new(StatusCode::OK, "text/plain", count.to_string(), false)
        }
        Err(e) => TrackerResponse::storage_failure(&e),
    }
}

// =============================================================================
// HTTP Surface
// =============================================================================

impl IntoResponse for TrackerResponse {
    fn into_response(self) -> Response {
        let body = match self.body_bytes() {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "tracker_body_decode_failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, body).into_response();

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        response
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn open_endpoint(State(state): State<TrackerState>) -> TrackerResponse {
    record_open(&state).await
}

async fn count_endpoint(State(state): State<TrackerState>) -> TrackerResponse {
    get_open_count(&state).await
}

/// Build the tracker router.
pub fn router(state: TrackerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/open", get(open_endpoint))
        .route("/open.png", get(open_endpoint))
        .route("/count", get(count_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::blob::{BuiltinPixelStore, TRANSPARENT_PIXEL_PNG};
    use crate::tracker::store::MemoryCounterStore;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct UnavailableStore;

    #[async_trait]
    impl CounterStore for UnavailableStore {
        async fn increment(&self, _key: &str) -> Result<u64, StorageError> {
            Err(StorageError::Poisoned)
        }

        async fn get(&self, _key: &str) -> Result<u64, StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    fn memory_state() -> TrackerState {
        TrackerState::new(
            Arc::new(MemoryCounterStore::new()),
            Arc::new(BuiltinPixelStore),
            "open_count",
            "invisible.png",
        )
    }

    async fn get_path(app: Router, path: &str) -> Response {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_open_returns_base64_pixel() {
        let state = memory_state();
        let response = record_open(&state).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers.get("content-type").map(String::as_str), Some("image/png"));
        assert!(response.is_base64_encoded);
        assert_eq!(response.body_bytes().unwrap(), TRANSPARENT_PIXEL_PNG);
        assert_eq!(get_open_count(&state).await.body, "1");
    }

    #[tokio::test]
    async fn test_get_open_count_does_not_mutate() {
        let state = memory_state();
        record_open(&state).await;
        record_open(&state).await;

        for _ in 0..3 {
            let response = get_open_count(&state).await;
            assert_eq!(response.status_code, 200);
            assert_eq!(response.body, "2");
            assert!(!response.is_base64_encoded);
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let state = TrackerState::new(
            Arc::new(UnavailableStore),
            Arc::new(BuiltinPixelStore),
            "open_count",
            "invisible.png",
        );

        assert_eq!(record_open(&state).await.status_code, 500);
        assert_eq!(get_open_count(&state).await.status_code, 500);
    }

    #[tokio::test]
    async fn test_missing_pixel_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let state = TrackerState::new(
            Arc::new(MemoryCounterStore::new()),
            Arc::new(crate::tracker::blob::DirBlobStore::new(dir.path())),
            "open_count",
            "invisible.png",
        );

        let response = record_open(&state).await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, "storage unavailable");
    }

    #[tokio::test]
    async fn test_proxy_shape_serialization() {
        let response = get_open_count(&memory_state()).await;
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["body"], "0");
        assert_eq!(json["isBase64Encoded"], false);
        assert_eq!(json["headers"]["content-type"], "text/plain");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_are_all_counted() {
        let state = memory_state();

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { record_open(&state).await.status_code })
            })
            .collect();

        for status in futures::future::join_all(tasks).await {
            assert_eq!(status.unwrap(), 200);
        }

        assert_eq!(get_open_count(&state).await.body, "200");
    }

    #[tokio::test]
    async fn test_http_open_serves_raw_png() {
        let app = router(memory_state());
        let response = get_path(app, "/open.png").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], TRANSPARENT_PIXEL_PNG);
    }

    #[tokio::test]
    async fn test_http_count_after_opens() {
        let state = memory_state();
        get_path(router(state.clone()), "/open").await;
        get_path(router(state.clone()), "/open.png").await;

        let response = get_path(router(state), "/count").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"2");
    }

    #[tokio::test]
    async fn test_http_health() {
        let response = get_path(router(memory_state()), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }
}
