use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::DownloadError;
use super::fetch::FetchError;
use super::progress::StreamEnd;
use crate::engine::{Completion, EngineError, EngineProgress};
use crate::metrics;
use crate::timerange::TimeRange;

/// What to download and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub url: String,
    /// Catalog format name; empty for the best source untouched.
    pub format: String,
    pub time_range: TimeRange,
}

impl DownloadOptions {
    pub fn new(url: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
            time_range: TimeRange::default(),
        }
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// Whether the best source is streamed without the engine.
    pub fn is_raw(&self) -> bool {
        self.format.is_empty()
    }
}

/// Stage and byte-count events of a download.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadProgress {
    Extracting,
    Extracted { title: String, formats: usize },
    /// Source renditions picked; `format` is empty in raw mode.
    Started { format: String, sources: Vec<String> },
    Transcoding(EngineProgress),
    /// Total bytes handed to the caller so far.
    Bytes(u64),
}

/// Output stream of a download. Dropping it before EOF cancels the run.
pub type MediaStream = Box<dyn AsyncRead + Send + Unpin>;

/// A started download.
pub struct DownloadResult {
    pub media: MediaStream,
    pub filename: String,
    pub mime_type: String,
    /// Catalog format the output is in, when known.
    pub format: Option<String>,
    completion: DownloadCompletion,
}

impl std::fmt::Debug for DownloadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResult")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl DownloadResult {
    pub(crate) fn new(
        media: MediaStream,
        filename: String,
        mime_type: String,
        format: Option<String>,
        completion: DownloadCompletion,
    ) -> Self {
        Self {
            media,
            filename,
            mime_type,
            format,
            completion,
        }
    }

    /// Splits off the media stream so it can be handed to a consumer while
    /// the completion is awaited elsewhere.
    pub fn into_parts(self) -> (MediaStream, DownloadCompletion) {
        (self.media, self.completion)
    }

    /// Drops the media stream and waits for the download to end.
    pub async fn wait(self) -> Result<(), DownloadError> {
        let (media, completion) = self.into_parts();
        drop(media);
        completion.wait().await
    }
}

/// Resolves when every process and task behind a download has finished.
#[derive(Debug)]
pub struct DownloadCompletion {
    url: String,
    kind: CompletionKind,
}

#[derive(Debug)]
enum CompletionKind {
    Passthrough {
        format_id: String,
        done: oneshot::Receiver<StreamEnd>,
        cancel: CancellationToken,
    },
    Engine {
        format: String,
        completion: Completion,
    },
}

impl DownloadCompletion {
    pub(crate) fn passthrough(
        url: String,
        format_id: String,
        done: oneshot::Receiver<StreamEnd>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            kind: CompletionKind::Passthrough {
                format_id,
                done,
                cancel,
            },
        }
    }

    pub(crate) fn engine(url: String, format: String, completion: Completion) -> Self {
        Self {
            url,
            kind: CompletionKind::Engine { format, completion },
        }
    }

    pub async fn wait(self) -> Result<(), DownloadError> {
        let url = self.url;
        let result = match self.kind {
            CompletionKind::Passthrough {
                format_id,
                done,
                cancel,
            } => {
                // The stream may still be held unread, so cancellation
                // resolves the wait on its own.
                let end = tokio::select! {
                    biased;
                    end = done => end,
                    _ = cancel.cancelled() => Ok(StreamEnd::Dropped),
                };
                match end {
                    Ok(StreamEnd::Eof) => Ok(()),
                    Ok(StreamEnd::Failed(e)) => Err(DownloadError::Fetch {
                        format_id,
                        source: FetchError::Read(e),
                    }),
                    Ok(StreamEnd::Dropped) | Err(_) => Err(DownloadError::Cancelled),
                }
            }
            CompletionKind::Engine { format, completion } => {
                completion.wait().await.map_err(|e| match e {
                    EngineError::Cancelled => DownloadError::Cancelled,
                    source => DownloadError::Transcode {
                        url: url.clone(),
                        format,
                        source,
                    },
                })
            }
        };

        match &result {
            Ok(()) => {
                metrics::DOWNLOADS_COMPLETED.inc();
                info!(url = %url, "Download finished");
            }
            Err(e) => {
                metrics::DOWNLOADS_FAILED
                    .with_label_values(&[e.stage()])
                    .inc();
                if e.is_cancelled() {
                    info!(url = %url, "Download cancelled");
                } else {
                    warn!(url = %url, error = %e, "Download failed");
                }
            }
        }
        result
    }
}

/// Builds a file name from a title, replacing characters that are unsafe
/// in file names or HTTP headers.
pub fn output_filename(title: &str, extension: &str) -> String {
    let mut stem: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    stem = stem.trim().trim_matches('.').to_string();
    if stem.is_empty() {
        stem = "download".to_string();
    }
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_download_options() {
        let options = DownloadOptions::new("https://example.com/v", "mp3")
            .with_time_range(TimeRange::until(Duration::from_secs(10)));
        assert!(!options.is_raw());
        assert_eq!(options.time_range.duration(), Some(Duration::from_secs(10)));
        assert!(DownloadOptions::new("https://example.com/v", "").is_raw());
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("My Song", "mp3"), "My Song.mp3");
        assert_eq!(output_filename("AC/DC: Live?", "m4a"), "AC_DC_ Live_.m4a");
        assert_eq!(output_filename("  ..  ", "webm"), "download.webm");
        assert_eq!(output_filename("line\nbreak", ""), "line_break");
    }

    #[tokio::test]
    async fn test_passthrough_completion() {
        let (tx, rx) = oneshot::channel();
        let completion = DownloadCompletion::passthrough("u".into(), "18".into(), rx, CancellationToken::new());
        tx.send(StreamEnd::Eof).unwrap();
        completion.wait().await.unwrap();

        let (tx, rx) = oneshot::channel();
        let completion = DownloadCompletion::passthrough("u".into(), "18".into(), rx, CancellationToken::new());
        drop(tx);
        assert!(matches!(
            completion.wait().await,
            Err(DownloadError::Cancelled)
        ));
    }
}
