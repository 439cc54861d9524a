//! HTTP client for a running tracker.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::info;
use url::Url;

/// Path of the pixel endpoint, relative to the tracker base URL.
pub const OPEN_PATH: &str = "open.png";

/// Path of the count endpoint, relative to the tracker base URL.
pub const COUNT_PATH: &str = "count";

/// Failures while querying the tracker.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid tracker url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to tracker failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker answered with status {0}")]
    Status(u16),

    #[error("tracker returned a non-numeric count: {0:?}")]
    Body(String),
}

/// Resolve `path` against the tracker base URL.
///
/// The base is treated as a directory even without a trailing slash, so
/// `https://host/default` + `count` gives `https://host/default/count`.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path)
}

/// URL of the tracking pixel for a tracker at `base`.
pub fn pixel_url(base: &Url) -> Result<Url, url::ParseError> {
    endpoint_url(base, OPEN_PATH)
}

/// Read-side client for the open counter.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: Client,
    count_url: Url,
}

impl TrackerClient {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        let count_url = endpoint_url(base, COUNT_PATH)?;
        Ok(Self { http, count_url })
    }

    /// Fetch the current number of recorded opens.
    pub async fn open_count(&self) -> Result<u64, ClientError> {
        info!(url = %self.count_url, "open_count_fetch_starting");

        let response = self.http.get(self.count_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let count = body
            .trim()
            .parse::<u64>()
            .map_err(|_| ClientError::Body(body.clone()))?;

        info!(open_count = count, "open_count_fetch_complete");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::blob::BuiltinPixelStore;
    use crate::tracker::handlers::{router, TrackerState};
    use crate::tracker::store::{CounterStore, MemoryCounterStore, StorageError};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn serve(state: TrackerState) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        Url::parse(&format!("http://{}/", addr)).unwrap()
    }

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

    #[test]
    fn test_endpoint_url_without_trailing_slash() {
        let base = Url::parse("https://abc.execute-api.us-east-2.amazonaws.com/default").unwrap();
        assert_eq!(
            endpoint_url(&base, COUNT_PATH).unwrap().as_str(),
            "https://abc.execute-api.us-east-2.amazonaws.com/default/count"
        );
    }

    #[test]
    fn test_pixel_url_with_trailing_slash() {
        let base = Url::parse("https://track.example.com/").unwrap();
        assert_eq!(pixel_url(&base).unwrap().as_str(), "https://track.example.com/open.png");
    }

    #[tokio::test]
    async fn test_open_count_against_live_tracker() {
        let state = TrackerState::new(
            Arc::new(MemoryCounterStore::new()),
            Arc::new(BuiltinPixelStore),
            "open_count",
            "invisible.png",
        );
        let base = serve(state).await;
        let client = TrackerClient::new(&base, Duration::from_secs(5)).unwrap();

        assert_eq!(client.open_count().await.unwrap(), 0);

        let pixel = pixel_url(&base).unwrap();
        for _ in 0..3 {
            let response = reqwest::get(pixel.clone()).await.unwrap();
            assert_eq!(response.status().as_u16(), 200);
        }

        assert_eq!(client.open_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_open_count_surfaces_server_error() {
        let state = TrackerState::new(
            Arc::new(UnavailableStore),
            Arc::new(BuiltinPixelStore),
            "open_count",
            "invisible.png",
        );
        let base = serve(state).await;
        let client = TrackerClient::new(&base, Duration::from_secs(5)).unwrap();

        assert!(matches!(client.open_count().await, Err(ClientError::Status(500))));
    }
}
