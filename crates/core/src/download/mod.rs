//! Download broker.
//!
//! Ties the other modules together: a [`Broker`] asks its [`Extractor`]
//! which sources exist behind a URL, picks the ones a catalog format needs,
//! opens them through a [`SourceFetcher`] and hands them to the engine
//! supervisor. The caller gets the output stream back as soon as the engine
//! runs; tags are written in front of it when the format asks for them.
//!
//! [`Extractor`]: crate::extractor::Extractor

mod broker;
mod config;
mod error;
mod fetch;
mod id3;
mod progress;
mod types;

pub use broker::Broker;
pub use config::FetchConfig;
pub use error::DownloadError;
pub use fetch::{FetchError, HttpFetcher, SourceFetcher};
pub use id3::{encode_id3v2, sniff_image_mime, PrependReader};
pub use types::{
    output_filename, DownloadCompletion, DownloadOptions, DownloadProgress, DownloadResult,
    MediaStream,
};
