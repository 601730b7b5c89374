use thiserror::Error;

use super::fetch::FetchError;
use crate::engine::EngineError;
use crate::extractor::ExtractError;
use crate::pipeline::SelectError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Extraction of {url} failed: {source}")]
    Extract {
        url: String,
        #[source]
        source: ExtractError,
    },

    #[error("No source stream of {url} fits format {format}: {source}")]
    NoSuitableStream {
        url: String,
        format: String,
        #[source]
        source: SelectError,
    },

    #[error("{url} has no downloadable source streams")]
    NoSourceStreams { url: String },

    #[error("Failed to open source {format_id}: {source}")]
    Fetch {
        format_id: String,
        #[source]
        source: FetchError,
    },

    #[error("Transcoding {url} to {format} failed: {source}")]
    Transcode {
        url: String,
        format: String,
        #[source]
        source: EngineError,
    },

    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            DownloadError::Cancelled => true,
            DownloadError::Extract { source, .. } => source.is_cancelled(),
            DownloadError::Fetch { source, .. } => matches!(source, FetchError::Cancelled),
            DownloadError::Transcode { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether the request itself was at fault rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DownloadError::UnknownFormat(_))
    }

    /// Stage label used for metrics.
    pub fn stage(&self) -> &'static str {
        if self.is_cancelled() {
            return "cancelled";
        }
        match self {
            DownloadError::UnknownFormat(_) => "format",
            DownloadError::Extract { .. } => "extract",
            DownloadError::NoSuitableStream { .. } | DownloadError::NoSourceStreams { .. } => {
                "select"
            }
            DownloadError::Fetch { .. } => "fetch",
            DownloadError::Transcode { .. } => "transcode",
            DownloadError::Cancelled => "cancelled",
        }
    }
}
