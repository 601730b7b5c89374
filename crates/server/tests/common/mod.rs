//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock collaborators injected, so the HTTP surface can be tested
//! without yt-dlp, ffmpeg or the network. The engine is a shell script
//! written into a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediabroker_core::{
    testing::{MemoryFetcher, MockExtractor},
    Broker, Catalog, Config, EngineConfig, Supervisor,
};
use mediabroker_server::state::AppState;

/// Re-export fixtures for test convenience
pub use mediabroker_core::testing::fixtures;

/// Engine script that copies its first input to its output.
pub const PASSTHROUGH_ENGINE: &str = "exec cat";

/// Prober script that drains its input and reports a fixed mp3 stream.
const FAKE_PROBER: &str = r#"cat > /dev/null
echo '{"format":{"format_name":"mp3","duration":"2.5","tags":{"TITLE":"tone"}},"streams":[{"index":0,"codec_type":"audio","codec_name":"mp3"}]}'"#;

/// Test fixture for API testing with mock collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download() {
///     let fixture = TestFixture::new();
///     fixture.extractor.set_info(fixtures::extract_info("Clip", sources)).await;
///
///     let response = fixture.get_raw("/api/v1/download?url=...&format=mp3").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared application state (shutdown token, broker)
    pub state: Arc<AppState>,
    /// Mock extractor - configure extraction results
    pub extractor: MockExtractor,
    /// In-memory fetcher - configure source bytes
    pub fetcher: MemoryFetcher,
    /// Temporary directory holding the engine and prober scripts
    pub temp_dir: TempDir,
}

/// Response from a JSON request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response with the body kept as bytes
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Set when the body ended with an error instead of completing.
    pub body_error: Option<String>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a fixture whose engine copies stdin to stdout.
    pub fn new() -> Self {
        Self::with_engine(PASSTHROUGH_ENGINE)
    }

    /// Create a fixture whose engine runs `engine_body` as a shell script.
    pub fn with_engine(engine_body: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let engine = write_script(&temp_dir, "ffmpeg", engine_body);
        let prober = write_script(&temp_dir, "ffprobe", FAKE_PROBER);

        let config = Config {
            engine: EngineConfig::with_paths(engine, prober)
                .with_terminate_grace_ms(300),
            ..Default::default()
        };

        let extractor = MockExtractor::new();
        let fetcher = MemoryFetcher::new();
        let broker = Broker::new(
            Arc::new(Catalog::builtin().expect("Built-in catalog loads")),
            Arc::new(extractor.clone()),
            Arc::new(fetcher.clone()),
            Supervisor::new(config.engine.clone()),
        );

        let state = Arc::new(AppState::new(config, Arc::new(broker)));
        let router = mediabroker_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            extractor,
            fetcher,
            temp_dir,
        }
    }

    /// Send a GET request and parse the body as JSON.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.json_request(request).await
    }

    /// Send a POST request with a raw byte body and parse the reply as JSON.
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/octet-stream")
            .body(Body::from(body))
            .unwrap();
        self.json_request(request).await
    }

    /// Send a GET request and keep the body as bytes.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let mut body = response.into_body();
        let mut bytes = Vec::new();
        let mut body_error = None;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Some(data) = frame.data_ref() {
                        bytes.extend_from_slice(data);
                    }
                }
                Err(e) => {
                    body_error = Some(e.to_string());
                    break;
                }
            }
        }

        RawResponse {
            status,
            headers,
            body: bytes,
            body_error,
        }
    }

    async fn json_request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod script");
    }
    path
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
