//! Tests against a real yt-dlp and the network.
//!
//! Run with:
//! ```sh
//! TEST_NETWORK=1 TEST_YOUTUBEDL=1 cargo test -p mediabroker-core --test youtubedl_network
//! ```
//!
//! `YOUTUBEDL_PATH` overrides the program found on `PATH`; `TEST_VIDEO_URL`
//! overrides the video used.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use mediabroker_core::extractor::{ExtractError, Extractor, ExtractorConfig, YoutubeDlExtractor};

const DEFAULT_VIDEO_URL: &str = "https://www.youtube.com/watch?v=jNQXAC9IVRw";

fn should_run() -> bool {
    if std::env::var("TEST_NETWORK").is_err() || std::env::var("TEST_YOUTUBEDL").is_err() {
        eprintln!("Skipping: TEST_NETWORK and TEST_YOUTUBEDL not set");
        return false;
    }
    true
}

fn extractor() -> YoutubeDlExtractor {
    let mut config = ExtractorConfig::default();
    if let Ok(path) = std::env::var("YOUTUBEDL_PATH") {
        config = config.with_program(PathBuf::from(path));
    }
    YoutubeDlExtractor::new(config)
}

#[tokio::test]
async fn test_extract_real_video() {
    if !should_run() {
        return;
    }
    let url = std::env::var("TEST_VIDEO_URL").unwrap_or_else(|_| DEFAULT_VIDEO_URL.to_string());

    let info = extractor()
        .extract(&CancellationToken::new(), &url)
        .await
        .expect("extraction succeeds");

    assert!(!info.title.is_empty());
    assert!(!info.formats.is_empty());
    assert!(info.formats.iter().any(|f| f.is_progressive()));
    assert!(info
        .formats
        .iter()
        .any(|f| f.normalized_audio_codec().is_some()));
}

#[tokio::test]
async fn test_extract_cancelled() {
    if !should_run() {
        return;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = extractor()
        .extract(&cancel, DEFAULT_VIDEO_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Cancelled));
}
