//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the broker's external
//! collaborators, so the download flow can be tested without yt-dlp or the
//! network. The transcode engine is not mocked: tests either use a real
//! ffmpeg (gated by `TEST_FFMPEG`) or a small script standing in for it.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediabroker_core::testing::{fixtures, MemoryFetcher, MockExtractor};
//!
//! let extractor = MockExtractor::new();
//! extractor.set_info(fixtures::extract_info("Clip", vec![fixtures::opus_audio("251")])).await;
//!
//! let fetcher = MemoryFetcher::new();
//! fetcher.insert("251", bytes).await;
//!
//! let broker = Broker::new(catalog, Arc::new(extractor), Arc::new(fetcher), supervisor);
//! ```

mod memory_fetcher;
mod mock_extractor;

pub use memory_fetcher::MemoryFetcher;
pub use mock_extractor::MockExtractor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::extractor::{ExtractInfo, SourceStreamDescriptor};

    /// Create extractor output with the given title and sources.
    pub fn extract_info(title: &str, formats: Vec<SourceStreamDescriptor>) -> ExtractInfo {
        ExtractInfo {
            title: title.to_string(),
            uploader: Some("Test Uploader".to_string()),
            formats,
            ..Default::default()
        }
    }

    /// An opus-in-webm audio rendition, like youtube's format 251.
    pub fn opus_audio(format_id: &str) -> SourceStreamDescriptor {
        SourceStreamDescriptor::audio(
            format_id,
            &format!("https://cdn.example.com/{}", format_id),
            "opus",
            "webm",
            160.0,
        )
    }

    /// An AAC-in-mp4 audio rendition, like youtube's format 140.
    pub fn aac_audio(format_id: &str) -> SourceStreamDescriptor {
        SourceStreamDescriptor::audio(
            format_id,
            &format!("https://cdn.example.com/{}", format_id),
            "mp4a.40.2",
            "m4a",
            128.0,
        )
    }

    /// An H.264 video-only rendition.
    pub fn h264_video(format_id: &str) -> SourceStreamDescriptor {
        SourceStreamDescriptor::video(
            format_id,
            &format!("https://cdn.example.com/{}", format_id),
            "avc1.64001F",
            "mp4",
            1500.0,
        )
    }

    /// A 1x1 JPEG usable as cover art.
    pub fn cover_jpeg() -> Vec<u8> {
        let mut jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        jpeg.extend_from_slice(b"JFIF\0");
        jpeg.extend_from_slice(&[0xff, 0xd9]);
        jpeg
    }
}
