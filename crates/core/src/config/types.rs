use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::catalog::{builtin_document, Catalog, CatalogError, CodecAliasMap, Format};
use crate::download::FetchConfig;
use crate::engine::EngineConfig;
use crate::extractor::ExtractorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Codec alias overrides, merged over the built-in aliases.
    #[serde(default)]
    pub codecs: CodecAliasMap,
    /// Output formats. When empty the built-in catalog is used.
    #[serde(default)]
    pub formats: Vec<Format>,
}

impl Config {
    /// Builds the format catalog described by this configuration.
    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        let builtin = builtin_document()?;
        let aliases = builtin.codecs.merged(&self.codecs);
        let formats = if self.formats.is_empty() {
            builtin.formats
        } else {
            self.formats.clone()
        };

        Ok(Catalog::new(formats, aliases)?
            .with_strict_stream_order(self.matching.strict_stream_order))
    }

    /// Returns a copy safe to expose over the API.
    pub fn sanitized(&self) -> SanitizedConfig {
        SanitizedConfig::from(self)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Format matching behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Only accept sources whose codecs appear in the order the format
    /// declares its streams.
    #[serde(default)]
    pub strict_stream_order: bool,
}

/// Extractor options whose value is a credential.
const SECRET_EXTRACTOR_OPTIONS: &[&str] = &[
    "--password",
    "-p",
    "--video-password",
    "--ap-password",
    "--twofactor",
    "-2",
    "--cookies",
];

const REDACTED: &str = "[REDACTED]";

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub extractor: ExtractorConfig,
    pub fetch: FetchConfig,
    pub matching: MatchingConfig,
    /// Names of configured formats; empty when the built-in catalog is used.
    pub formats: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let mut extractor = config.extractor.clone();
        extractor.extra_args = redact_args(&extractor.extra_args);

        Self {
            server: config.server.clone(),
            engine: config.engine.clone(),
            extractor,
            fetch: config.fetch.clone(),
            matching: config.matching.clone(),
            formats: config.formats.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

fn redact_args(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        if hide_next {
            redacted.push(REDACTED.to_string());
            hide_next = false;
            continue;
        }
        match arg.split_once('=') {
            Some((option, _)) if SECRET_EXTRACTOR_OPTIONS.contains(&option) => {
                redacted.push(format!("{}={}", option, REDACTED));
            }
            _ => {
                hide_next = SECRET_EXTRACTOR_OPTIONS.contains(&arg.as_str());
                redacted.push(arg.clone());
            }
        }
    }

    redacted
}
