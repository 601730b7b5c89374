//! Extractor backed by a youtube-dl compatible program.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::ExtractorConfig;
use super::error::ExtractError;
use super::traits::Extractor;
use super::types::{ExtractInfo, SourceStreamDescriptor};

const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `yt-dlp -J` (or a compatible program) and parses its JSON report.
pub struct YoutubeDlExtractor {
    config: ExtractorConfig,
    http: Client,
}

impl YoutubeDlExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let http = Client::builder()
            .timeout(THUMBNAIL_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, http }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExtractorConfig::default())
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn command(&self, url: &str) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(["-J", "--no-playlist", "--skip-download", "--no-warnings"])
            .args(&self.config.extra_args)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn fetch_thumbnail(&self, cancel: &CancellationToken, url: &str) -> Option<Vec<u8>> {
        let fetch = async {
            let response = self.http.get(url).send().await?.error_for_status()?;
            response.bytes().await
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = fetch => result,
        };

        match result {
            Ok(bytes) if !bytes.is_empty() => Some(bytes.to_vec()),
            Ok(_) => None,
            Err(e) => {
                warn!(url, error = %e, "Failed to fetch thumbnail");
                None
            }
        }
    }
}

#[async_trait]
impl Extractor for YoutubeDlExtractor {
    fn name(&self) -> &str {
        "youtube-dl"
    }

    async fn extract(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<ExtractInfo, ExtractError> {
        debug!(url, program = %self.config.program.display(), "Running extractor");

        let child = self.command(url).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractError::NotFound {
                    path: self.config.program.clone(),
                }
            } else {
                ExtractError::Io(e)
            }
        })?;

        // Dropping the child on cancellation or timeout kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            output = timeout(self.config.timeout(), child.wait_with_output()) => match output {
                Ok(output) => output?,
                Err(_) => {
                    return Err(ExtractError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    })
                }
            },
        };

        if !output.status.success() {
            let err = ExtractError::from_stderr(&String::from_utf8_lossy(&output.stderr));
            debug!(url, status = ?output.status.code(), error = %err, "Extractor failed");
            return Err(err);
        }

        let mut info = parse_info(&output.stdout)?;
        debug!(url, formats = info.formats.len(), title = %info.title, "Extracted");

        if self.config.fetch_thumbnail {
            if let Some(thumbnail) = info.thumbnail.clone() {
                info.thumbnail_bytes = self.fetch_thumbnail(cancel, &thumbnail).await;
            }
        }

        Ok(info)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    url: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    vbr: Option<f64>,
    tbr: Option<f64>,
    ext: Option<String>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

impl RawFormat {
    fn into_descriptor(self) -> Option<SourceStreamDescriptor> {
        let url = self.url?;
        let mut descriptor = SourceStreamDescriptor::new(
            self.format_id.unwrap_or_default(),
            url,
            self.acodec,
            self.vcodec,
            self.abr,
            self.vbr,
            self.tbr,
            self.ext,
        )
        .with_headers(self.http_headers);
        descriptor.protocol = self.protocol;
        Some(descriptor)
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    /// Single format sources carry the format fields at the top level.
    #[serde(flatten)]
    top: RawFormat,
}

/// Parses a youtube-dl JSON report.
pub fn parse_info(json: &[u8]) -> Result<ExtractInfo, ExtractError> {
    let raw: serde_json::Value =
        serde_json::from_slice(json).map_err(|e| ExtractError::ParseError {
            reason: e.to_string(),
        })?;
    let info: RawInfo =
        serde_json::from_value(raw.clone()).map_err(|e| ExtractError::ParseError {
            reason: e.to_string(),
        })?;

    let mut formats: Vec<SourceStreamDescriptor> = info
        .formats
        .into_iter()
        .filter_map(RawFormat::into_descriptor)
        .collect();
    if formats.is_empty() {
        formats.extend(info.top.into_descriptor());
    }

    Ok(ExtractInfo {
        title: info.title.unwrap_or_default(),
        uploader: info.uploader.filter(|u| !u.is_empty()),
        thumbnail: info.thumbnail.filter(|t| !t.is_empty()),
        thumbnail_bytes: None,
        formats,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_formats() {
        let json = br#"{
            "title": "A Radiolab Producer on the Making of a Podcast",
            "uploader": "Radiolab",
            "thumbnail": "https://i.ytimg.com/vi/uVYWQJ5BB_w/hqdefault.jpg",
            "formats": [
                {"format_id": "140", "url": "https://cdn.example/140", "ext": "m4a",
                 "acodec": "mp4a.40.2", "vcodec": "none", "abr": 129.5, "protocol": "https",
                 "http_headers": {"User-Agent": "Mozilla/5.0"}},
                {"format_id": "251", "url": "https://cdn.example/251", "ext": "webm",
                 "acodec": "opus", "vcodec": "none", "abr": 140.1, "protocol": "https"},
                {"format_id": "137", "url": "https://cdn.example/137", "ext": "mp4",
                 "acodec": "none", "vcodec": "avc1.640028", "vbr": 4400.0, "tbr": 4400.0},
                {"format_id": "sb0", "ext": "mhtml", "acodec": "none", "vcodec": "none"}
            ]
        }"#;

        let info = parse_info(json).unwrap();
        assert_eq!(info.title, "A Radiolab Producer on the Making of a Podcast");
        assert_eq!(info.uploader.as_deref(), Some("Radiolab"));
        assert_eq!(info.formats.len(), 3);

        let m4a = &info.formats[0];
        assert_eq!(m4a.format_id, "140");
        assert_eq!(m4a.normalized_audio_codec(), Some("aac"));
        assert_eq!(m4a.normalized_video_codec(), None);
        assert_eq!(m4a.http_headers["User-Agent"], "Mozilla/5.0");

        assert_eq!(info.formats[2].normalized_video_codec(), Some("h264"));
        assert_eq!(info.formats[2].normalized_bitrate(), 4400.0);
        assert!(info.raw.get("formats").is_some());
    }

    #[test]
    fn test_parse_info_single_format() {
        let json = br#"{
            "title": "BIS Radio Show",
            "url": "https://cf-media.example/stream.mp3",
            "ext": "mp3",
            "format_id": "http_mp3_128",
            "abr": 128
        }"#;

        let info = parse_info(json).unwrap();
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].format_id, "http_mp3_128");
        assert_eq!(info.formats[0].normalized_audio_codec(), Some("mp3"));
        assert!(info.thumbnail.is_none());
    }

    #[test]
    fn test_parse_info_missing_title() {
        let info = parse_info(br#"{"formats": []}"#).unwrap();
        assert_eq!(info.title, "");
        assert!(info.formats.is_empty());
    }

    #[test]
    fn test_parse_info_invalid() {
        let err = parse_info(b"<html>").unwrap_err();
        assert!(matches!(err, ExtractError::ParseError { .. }));
    }

    #[test]
    fn test_command_line() {
        let mut config = ExtractorConfig::default();
        config.extra_args = vec!["--format-sort".to_string(), "res".to_string()];
        let extractor = YoutubeDlExtractor::new(config);

        let command = extractor.command("https://example.com/watch?v=1");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-J",
                "--no-playlist",
                "--skip-download",
                "--no-warnings",
                "--format-sort",
                "res",
                "--",
                "https://example.com/watch?v=1"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let extractor = YoutubeDlExtractor::new(
            ExtractorConfig::default().with_program("/nonexistent/yt-dlp".into()),
        );
        let err = extractor
            .extract(&CancellationToken::new(), "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
    }
}
