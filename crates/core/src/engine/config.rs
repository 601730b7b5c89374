//! Configuration for the transcode engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the ffmpeg based engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Time between SIGTERM and SIGKILL when a run is cancelled.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    /// Bytes of engine stderr kept for error reports.
    #[serde(default = "default_stderr_capture_bytes")]
    pub stderr_capture_bytes: usize,

    /// Default number of bytes a probe may read before giving up.
    #[serde(default = "default_probe_limit_bytes")]
    pub probe_limit_bytes: u64,

    /// Additional ffmpeg output arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_terminate_grace_ms() -> u64 {
    2000
}

fn default_stderr_capture_bytes() -> usize {
    64 * 1024
}

fn default_probe_limit_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            terminate_grace_ms: default_terminate_grace_ms(),
            stderr_capture_bytes: default_stderr_capture_bytes(),
            probe_limit_bytes: default_probe_limit_bytes(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the termination grace period in milliseconds.
    pub fn with_terminate_grace_ms(mut self, grace_ms: u64) -> Self {
        self.terminate_grace_ms = grace_ms;
        self
    }

    /// Sets how much stderr is kept.
    pub fn with_stderr_capture_bytes(mut self, bytes: usize) -> Self {
        self.stderr_capture_bytes = bytes;
        self
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}
