//! Types reported by an extractor.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::MediaKind;

/// One downloadable rendition of a source, as reported by the extractor.
///
/// The normalized fields are derived once at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStreamDescriptor {
    pub format_id: String,
    pub url: String,
    /// Headers the source expects on the request for `url`.
    pub http_headers: BTreeMap<String, String>,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    /// Audio bitrate in kbit/s.
    pub abr: Option<f64>,
    /// Video bitrate in kbit/s.
    pub vbr: Option<f64>,
    /// Total bitrate in kbit/s.
    pub tbr: Option<f64>,
    pub extension: Option<String>,
    /// Transfer protocol, e.g. "https" or "m3u8_native".
    pub protocol: Option<String>,
    normalized_audio_codec: Option<String>,
    normalized_video_codec: Option<String>,
    normalized_bitrate: f64,
}

impl SourceStreamDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        format_id: impl Into<String>,
        url: impl Into<String>,
        audio_codec: Option<String>,
        video_codec: Option<String>,
        abr: Option<f64>,
        vbr: Option<f64>,
        tbr: Option<f64>,
        extension: Option<String>,
    ) -> Self {
        let mut descriptor = Self {
            format_id: format_id.into(),
            url: url.into(),
            http_headers: BTreeMap::new(),
            audio_codec,
            video_codec,
            abr,
            vbr,
            tbr,
            extension,
            protocol: None,
            normalized_audio_codec: None,
            normalized_video_codec: None,
            normalized_bitrate: 0.0,
        };
        descriptor.normalize();
        descriptor
    }

    /// Audio-only descriptor, handy for fixtures.
    pub fn audio(format_id: &str, url: &str, codec: &str, ext: &str, abr: f64) -> Self {
        Self::new(
            format_id,
            url,
            Some(codec.to_string()),
            Some("none".to_string()),
            Some(abr),
            None,
            None,
            Some(ext.to_string()),
        )
    }

    /// Video-only descriptor, handy for fixtures.
    pub fn video(format_id: &str, url: &str, codec: &str, ext: &str, vbr: f64) -> Self {
        Self::new(
            format_id,
            url,
            Some("none".to_string()),
            Some(codec.to_string()),
            None,
            Some(vbr),
            None,
            Some(ext.to_string()),
        )
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.http_headers = headers;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    fn normalize(&mut self) {
        self.normalized_audio_codec = self.audio_codec.as_deref().and_then(normalize_codec);
        self.normalized_video_codec = self.video_codec.as_deref().and_then(normalize_codec);

        // Some sources only report the file extension.
        if self.normalized_audio_codec.is_none()
            && self.normalized_video_codec.is_none()
            && self.audio_codec.is_none()
            && self.video_codec.is_none()
        {
            self.normalized_audio_codec = self
                .extension
                .as_deref()
                .and_then(audio_codec_from_extension)
                .map(str::to_string);
        }

        let positive = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
        self.normalized_bitrate = positive(self.tbr).unwrap_or_else(|| {
            positive(self.abr).unwrap_or(0.0) + positive(self.vbr).unwrap_or(0.0)
        });
    }

    pub fn normalized_audio_codec(&self) -> Option<&str> {
        self.normalized_audio_codec.as_deref()
    }

    pub fn normalized_video_codec(&self) -> Option<&str> {
        self.normalized_video_codec.as_deref()
    }

    /// Normalized codec carried for `media`.
    pub fn codec(&self, media: MediaKind) -> Option<&str> {
        match media {
            MediaKind::Audio => self.normalized_audio_codec(),
            MediaKind::Video => self.normalized_video_codec(),
        }
    }

    pub fn has_media(&self, media: MediaKind) -> bool {
        self.codec(media).is_some()
    }

    /// Number of media kinds carried.
    pub fn media_count(&self) -> usize {
        [MediaKind::Audio, MediaKind::Video]
            .into_iter()
            .filter(|m| self.has_media(*m))
            .count()
    }

    /// Total bitrate, or audio plus video bitrate when no total is known.
    pub fn normalized_bitrate(&self) -> f64 {
        self.normalized_bitrate
    }

    /// Whether the source is a single fetchable resource rather than a
    /// playlist or fragment manifest.
    pub fn is_progressive(&self) -> bool {
        if self.url.is_empty() {
            return false;
        }
        match self.protocol.as_deref() {
            None => true,
            Some(p) => matches!(p, "http" | "https"),
        }
    }
}

/// Maps extractor codec strings (RFC 6381 style) to catalog codec names.
///
/// Returns `None` for empty strings and the "none" sentinel.
pub fn normalize_codec(codec: &str) -> Option<String> {
    let codec = codec.trim().to_ascii_lowercase();
    if codec.is_empty() || codec == "none" {
        return None;
    }

    let base = codec.split('.').next().unwrap_or_default();
    let name = match base {
        "mp4a" => match codec.as_str() {
            "mp4a.40.34" | "mp4a.6b" | "mp4a.69" => "mp3",
            _ => "aac",
        },
        "avc1" | "avc3" | "h264" => "h264",
        "hev1" | "hvc1" | "hevc" | "h265" => "hevc",
        "vp8" => "vp8",
        "vp9" | "vp09" => "vp9",
        "av01" | "av1" => "av1",
        "ac-3" | "ac3" => "ac3",
        "ec-3" | "eac3" => "eac3",
        "mp3" | "aac" | "opus" | "vorbis" | "flac" | "alac" => base,
        _ => codec.as_str(),
    };

    Some(name.to_string())
}

fn audio_codec_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "mp3" => Some("mp3"),
        "m4a" | "aac" => Some("aac"),
        "ogg" | "oga" => Some("vorbis"),
        "opus" => Some("opus"),
        "flac" => Some("flac"),
        _ => None,
    }
}

/// Container name the engine uses for a file extension.
pub fn container_for_extension(ext: &str) -> &str {
    match ext {
        "mp4" | "m4a" | "m4v" => "mp4",
        "mov" => "mov",
        "mkv" => "matroska",
        "webm" => "webm",
        "ts" | "m2ts" => "mpegts",
        "oga" | "opus" => "ogg",
        other => other,
    }
}

/// Everything the extractor reported about one URL.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractInfo {
    /// Source title; empty when the extractor reported none.
    pub title: String,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Thumbnail image, when it was downloaded.
    #[serde(skip)]
    pub thumbnail_bytes: Option<Vec<u8>>,
    /// Available renditions.
    pub formats: Vec<SourceStreamDescriptor>,
    /// The extractor's document as received.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_codec() {
        for (input, expected) in [
            ("mp4a.40.2", Some("aac")),
            ("mp4a.40.5", Some("aac")),
            ("mp4a.40.34", Some("mp3")),
            ("avc1.64001F", Some("h264")),
            ("avc1.4d401e", Some("h264")),
            ("vp8.0", Some("vp8")),
            ("vp9", Some("vp9")),
            ("vp09.00.10.08", Some("vp9")),
            ("av01.0.05M.08", Some("av1")),
            ("hev1.1.6.L93.B0", Some("hevc")),
            ("hvc1", Some("hevc")),
            ("opus", Some("opus")),
            ("vorbis", Some("vorbis")),
            ("mp3", Some("mp3")),
            ("MP3", Some("mp3")),
            ("none", None),
            ("", None),
        ] {
            assert_eq!(normalize_codec(input).as_deref(), expected, "{}", input);
        }
    }

    #[test]
    fn test_descriptor_normalization() {
        let d = SourceStreamDescriptor::new(
            "18",
            "https://example.com/18",
            Some("mp4a.40.2".to_string()),
            Some("avc1.42001E".to_string()),
            Some(96.0),
            Some(500.0),
            None,
            Some("mp4".to_string()),
        );
        assert_eq!(d.normalized_audio_codec(), Some("aac"));
        assert_eq!(d.normalized_video_codec(), Some("h264"));
        assert_eq!(d.normalized_bitrate(), 596.0);
        assert_eq!(d.media_count(), 2);
    }

    #[test]
    fn test_descriptor_prefers_total_bitrate() {
        let mut d = SourceStreamDescriptor::audio("251", "u", "opus", "webm", 160.0);
        assert_eq!(d.normalized_bitrate(), 160.0);
        assert!(!d.has_media(MediaKind::Video));

        d = SourceStreamDescriptor::new(
            "x",
            "u",
            Some("opus".to_string()),
            None,
            Some(100.0),
            None,
            Some(130.0),
            None,
        );
        assert_eq!(d.normalized_bitrate(), 130.0);
    }

    #[test]
    fn test_descriptor_missing_fields_are_empty() {
        let d = SourceStreamDescriptor::new("x", "u", None, None, None, None, None, None);
        assert_eq!(d.normalized_audio_codec(), None);
        assert_eq!(d.normalized_video_codec(), None);
        assert_eq!(d.normalized_bitrate(), 0.0);
        assert_eq!(d.media_count(), 0);
    }

    #[test]
    fn test_descriptor_codec_from_extension() {
        let d = SourceStreamDescriptor::new(
            "http_mp3_128",
            "u",
            None,
            None,
            None,
            None,
            None,
            Some("mp3".to_string()),
        );
        assert_eq!(d.normalized_audio_codec(), Some("mp3"));
    }

    #[test]
    fn test_progressive_protocols() {
        let d = SourceStreamDescriptor::audio("a", "https://example.com/a", "opus", "webm", 1.0);
        assert!(d.is_progressive());
        assert!(d.clone().with_protocol("https").is_progressive());
        assert!(!d.clone().with_protocol("m3u8_native").is_progressive());
        assert!(!SourceStreamDescriptor::audio("a", "", "opus", "webm", 1.0).is_progressive());
    }

    #[test]
    fn test_container_for_extension() {
        assert_eq!(container_for_extension("m4a"), "mp4");
        assert_eq!(container_for_extension("mkv"), "matroska");
        assert_eq!(container_for_extension("mp3"), "mp3");
    }
}
