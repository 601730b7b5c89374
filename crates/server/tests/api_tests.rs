//! API tests with mocked collaborators.
//!
//! These tests run the full router in-process with an in-memory extractor
//! and fetcher and shell scripts standing in for ffmpeg and ffprobe.

#![cfg(unix)]

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::{sleep, timeout};

use mediabroker_core::extractor::ExtractError;

use common::{fixtures, TestFixture};

const SONG_URL: &str = "https://example.com/watch%3Fv%3D1";

async fn fixture_with_song(engine: &str) -> TestFixture {
    let fixture = TestFixture::with_engine(engine);
    fixture
        .extractor
        .set_info(fixtures::extract_info(
            "Test Song",
            vec![fixtures::opus_audio("251")],
        ))
        .await;
    fixture
        .fetcher
        .insert("251", b"ENCODED-AUDIO".to_vec())
        .await;
    fixture
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["engine"]["terminate_grace_ms"], 300);
    assert!(response.body["formats"].is_array());
}

// =============================================================================
// Format Catalog Tests
// =============================================================================

#[tokio::test]
async fn test_list_formats() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/formats").await;

    assert_status!(response, StatusCode::OK);
    let formats = response.body["formats"].as_array().unwrap();
    assert_eq!(response.body["count"], formats.len());

    let mp3 = formats
        .iter()
        .find(|f| f["name"] == "mp3")
        .expect("mp3 listed");
    assert_eq!(mp3["mime_type"], "audio/mpeg");
    assert_eq!(mp3["extension"], "mp3");
    assert_eq!(mp3["prepend"], "id3v2");
    assert_eq!(mp3["streams"][0]["media"], "audio");
}

#[tokio::test]
async fn test_get_format() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/formats/mp4").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["mime_type"], "video/mp4");
    assert_eq!(response.body["streams"].as_array().unwrap().len(), 2);

    let response = fixture.get("/api/v1/formats/wav9").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("wav9"));
}

// =============================================================================
// Download Tests
// =============================================================================

#[tokio::test]
async fn test_download_mp3_streams_tagged_output() {
    let fixture = fixture_with_song(common::PASSTHROUGH_ENGINE).await;

    let response = fixture
        .get_raw(&format!("/api/v1/download?url={}&format=mp3", SONG_URL))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("audio/mpeg"));
    let disposition = response.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"Test Song.mp3\""));

    assert!(response.body_error.is_none(), "{:?}", response.body_error);
    assert_eq!(&response.body[..3], b"ID3");
    assert!(response.body.ends_with(b"ENCODED-AUDIO"));
    assert_eq!(
        fixture.extractor.extracted_urls().await,
        vec!["https://example.com/watch?v=1".to_string()]
    );
}

#[tokio::test]
async fn test_raw_download_passes_source_through() {
    let fixture = fixture_with_song(common::PASSTHROUGH_ENGINE).await;

    let response = fixture
        .get_raw(&format!("/api/v1/download?url={}", SONG_URL))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body_error.is_none());
    assert_eq!(response.body, b"ENCODED-AUDIO");
    assert!(response.header("content-type").is_some());
}

#[tokio::test]
async fn test_unknown_format_is_bad_request() {
    let fixture = fixture_with_song(common::PASSTHROUGH_ENGINE).await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}&format=wav9", SONG_URL))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("wav9"));
    // Rejected before the extractor runs.
    assert!(fixture.extractor.extracted_urls().await.is_empty());
}

#[tokio::test]
async fn test_bad_range_is_bad_request() {
    let fixture = fixture_with_song(common::PASSTHROUGH_ENGINE).await;

    let response = fixture
        .get(&format!(
            "/api/v1/download?url={}&format=mp3&range=20s-10s",
            SONG_URL
        ))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .get(&format!(
            "/api/v1/download?url={}&format=mp3&range=soon",
            SONG_URL
        ))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    for range in ["1e30", "inf:00", "nan:1", "99999999999999999999999h"] {
        let response = fixture
            .get(&format!(
                "/api/v1/download?url={}&format=mp3&range={}",
                SONG_URL, range
            ))
            .await;
        assert_status!(response, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_empty_url_is_bad_request() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/download?url=&format=mp3").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extractor_failure_is_bad_gateway() {
    let fixture = fixture_with_song(common::PASSTHROUGH_ENGINE).await;
    fixture
        .extractor
        .set_error(ExtractError::Failed {
            message: "ERROR: Video unavailable".to_string(),
            stderr: String::new(),
        })
        .await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}&format=mp3", SONG_URL))
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("Video unavailable"));
}

#[tokio::test]
async fn test_no_source_streams_is_unprocessable() {
    let fixture = TestFixture::new();
    fixture
        .extractor
        .set_info(fixtures::extract_info("Empty", vec![]))
        .await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}&format=mp3", SONG_URL))
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_engine_failure_aborts_body() {
    let fixture = fixture_with_song("cat > /dev/null\necho 'Unknown encoder' >&2\nexit 1").await;

    let response = fixture
        .get_raw(&format!("/api/v1/download?url={}&format=mp3", SONG_URL))
        .await;

    // The head was already sent; the failure surfaces as a body error.
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert!(response.body_error.is_some());
}

#[tokio::test]
async fn test_shutdown_ends_stalled_download() {
    let fixture = TestFixture::new();
    fixture
        .extractor
        .set_info(fixtures::extract_info(
            "Stalled",
            vec![fixtures::opus_audio("251")],
        ))
        .await;
    fixture.fetcher.stall("251").await;

    let shutdown = fixture.state.shutdown_token().clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
    });

    let response = timeout(
        Duration::from_secs(5),
        fixture.get_raw(&format!("/api/v1/download?url={}&format=mp3", SONG_URL)),
    )
    .await
    .expect("download ended after shutdown");

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert!(response.body_error.is_some());
}

// =============================================================================
// Probe Tests
// =============================================================================

#[tokio::test]
async fn test_probe_reports_container_and_streams() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/probe", b"ID3\x04fake mp3 bytes".to_vec())
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["container"], "mp3");
    assert_eq!(response.body["streams"][0]["codec_name"], "mp3");
    assert_eq!(response.body["streams"][0]["media"], "audio");
    assert_eq!(response.body["tags"]["title"], "tone");
}

#[tokio::test]
async fn test_probe_empty_body_is_unprocessable() {
    let fixture = TestFixture::new();
    let response = fixture.post_bytes("/api/v1/probe", Vec::new()).await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Metrics Tests
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get_raw("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);

    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("mediabroker_http_requests_total"));
    assert!(text.contains("path=\"/api/v1/health\""));
}
