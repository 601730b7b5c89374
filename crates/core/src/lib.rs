pub mod catalog;
pub mod config;
pub mod download;
pub mod engine;
pub mod extractor;
pub mod metrics;
pub mod pipeline;
pub mod testing;
pub mod timerange;

pub use catalog::{Catalog, CatalogError, CodecAliasMap, Format, MediaKind, Prepend, StreamSpec};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use download::{
    Broker, DownloadCompletion, DownloadError, DownloadOptions, DownloadProgress, DownloadResult,
    MediaStream,
};
pub use engine::{
    probe, EngineConfig, EngineError, ProbeHints, ProbeResult, Supervisor,
};
pub use extractor::{ExtractError, ExtractInfo, Extractor, SourceStreamDescriptor};
pub use timerange::{TimeRange, TimeRangeError};
