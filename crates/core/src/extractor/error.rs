//! Error types for the extractor module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while extracting source information.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Extractor program not found.
    #[error("Extractor not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Extractor reported a failure. `message` is its last error line.
    #[error("{message}")]
    Failed { message: String, stderr: String },

    /// Extractor output could not be parsed.
    #[error("Failed to parse extractor output: {reason}")]
    ParseError { reason: String },

    /// Extraction took longer than the configured timeout.
    #[error("Extraction timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Extraction was cancelled.
    #[error("Extraction cancelled")]
    Cancelled,

    /// I/O error while running the extractor.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Builds a failure from extractor stderr, keeping its last error line.
    pub fn from_stderr(stderr: &str) -> Self {
        let line = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| l.starts_with("ERROR:"))
            .or_else(|| stderr.lines().map(str::trim).rfind(|l| !l.is_empty()))
            .unwrap_or("extractor failed");

        Self::Failed {
            message: line.trim_start_matches("ERROR:").trim().to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stderr_keeps_error_line() {
        let stderr = "WARNING: something odd\n\
            ERROR: [youtube] aaaaaaaaaaa: Video unavailable\n";
        let err = ExtractError::from_stderr(stderr);
        assert_eq!(err.to_string(), "[youtube] aaaaaaaaaaa: Video unavailable");
        assert!(matches!(err, ExtractError::Failed { ref stderr, .. } if stderr.contains("WARNING")));
    }

    #[test]
    fn test_from_stderr_without_error_prefix() {
        let err = ExtractError::from_stderr("usage: yt-dlp [OPTIONS] URL\n\n");
        assert_eq!(err.to_string(), "usage: yt-dlp [OPTIONS] URL");

        let err = ExtractError::from_stderr("");
        assert_eq!(err.to_string(), "extractor failed");
    }
}
