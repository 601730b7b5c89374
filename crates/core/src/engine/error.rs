//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while starting, running or probing the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("Engine not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// Engine process could not be spawned.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline description is structurally invalid.
    #[error("Invalid pipeline: {reason}")]
    InvalidSpec { reason: String },

    /// Requested pipeline cannot run on this platform.
    #[error("Unsupported pipeline: {reason}")]
    Unsupported { reason: String },

    /// Engine exited unsuccessfully.
    #[error("Engine exited with {}", describe_status(.status))]
    Failed {
        /// Exit code, `None` when killed by a signal.
        status: Option<i32>,
        stderr: String,
    },

    /// Run was cancelled before the engine finished.
    #[error("Engine run cancelled")]
    Cancelled,

    /// A source reader failed while feeding the engine.
    #[error("Failed to read input {index}: {source}")]
    Input {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Probe could not identify the input.
    #[error("Failed to probe stream: {reason}")]
    ProbeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Probe reached its byte limit without identifying a container.
    #[error("Probe read {limit} bytes without identifying a container")]
    ProbeLimitExceeded { limit: u64 },

    /// Probe input was empty.
    #[error("Probe input is empty")]
    EmptyInput,

    /// Failed to parse ffprobe output.
    #[error("Failed to parse probe output: {reason}")]
    ParseError { reason: String },

    /// I/O error while supervising the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

impl EngineError {
    /// Creates a new invalid spec error.
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether the engine never started.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            Self::EngineNotFound { .. }
                | Self::Spawn { .. }
                | Self::InvalidSpec { .. }
                | Self::Unsupported { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Captured engine diagnostics, when the error carries them.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } => Some(stderr),
            Self::ProbeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
