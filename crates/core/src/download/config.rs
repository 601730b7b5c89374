use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for fetching source streams over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent for source requests without their own.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum bytes read from one source; unlimited when unset.
    #[serde(default)]
    pub max_source_bytes: Option<u64>,
}

fn default_user_agent() -> String {
    concat!("mediabroker/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            max_source_bytes: None,
        }
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
