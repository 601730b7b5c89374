//! Extractor module for discovering source streams behind a URL.
//!
//! Site specific extraction is delegated to a youtube-dl compatible program;
//! this module runs it, parses its JSON report into [`ExtractInfo`] and
//! normalizes the reported codecs to catalog names.

mod config;
mod error;
mod traits;
mod types;
mod youtubedl;

pub use config::ExtractorConfig;
pub use error::ExtractError;
pub use traits::Extractor;
pub use types::{
    container_for_extension, normalize_codec, ExtractInfo, SourceStreamDescriptor,
};
pub use youtubedl::{parse_info, YoutubeDlExtractor};
