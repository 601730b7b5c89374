//! Configuration for the extractor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the youtube-dl compatible extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Extractor program.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Extra arguments passed before the URL.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Whether to download the thumbnail for cover art.
    #[serde(default = "default_fetch_thumbnail")]
    pub fetch_thumbnail: bool,

    /// Timeout for one extraction in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_fetch_thumbnail() -> bool {
    true
}

fn default_timeout() -> u64 {
    120
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            extra_args: Vec::new(),
            fetch_thumbnail: default_fetch_thumbnail(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
