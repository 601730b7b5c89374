//! Output format catalog.
//!
//! The catalog is an ordered, read-only table of the formats the broker can
//! produce. It is built once from configuration and shared behind an `Arc`;
//! reloading means building a new catalog, never editing one in place.

mod matcher;
mod types;

pub use types::*;

use std::collections::HashSet;
use thiserror::Error;

/// Built-in catalog document shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../../formats.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to parse format catalog: {0}")]
    ParseError(String),

    #[error("Format catalog is empty")]
    Empty,

    #[error("Duplicate format name: {0}")]
    DuplicateName(String),

    #[error("Format {0} declares no containers")]
    NoContainers(String),

    #[error("Format {0} declares no streams")]
    NoStreams(String),

    #[error("Format {format} stream {index} declares no codecs")]
    NoCodecs { format: String, index: usize },
}

/// Ordered set of output formats plus the codec alias map used to compare them.
#[derive(Debug, Clone)]
pub struct Catalog {
    formats: Vec<Format>,
    aliases: CodecAliasMap,
    strict_stream_order: bool,
}

impl Catalog {
    /// Builds a catalog, checking the invariants every format must hold.
    pub fn new(formats: Vec<Format>, aliases: CodecAliasMap) -> Result<Self, CatalogError> {
        if formats.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for format in &formats {
            if !seen.insert(format.name.as_str()) {
                return Err(CatalogError::DuplicateName(format.name.clone()));
            }
            if format.containers.is_empty() {
                return Err(CatalogError::NoContainers(format.name.clone()));
            }
            if format.streams.is_empty() {
                return Err(CatalogError::NoStreams(format.name.clone()));
            }
            if let Some(index) = format.streams.iter().position(|s| s.codecs.is_empty()) {
                return Err(CatalogError::NoCodecs {
                    format: format.name.clone(),
                    index,
                });
            }
        }

        Ok(Self {
            formats,
            aliases,
            strict_stream_order: false,
        })
    }

    /// Builds a catalog from a parsed document.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        Self::new(document.formats, document.codecs)
    }

    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_document(builtin_document()?)
    }

    /// Only match sources whose codecs are listed in stream declaration order.
    pub fn with_strict_stream_order(mut self, strict: bool) -> Self {
        self.strict_stream_order = strict;
        self
    }

    pub fn strict_stream_order(&self) -> bool {
        self.strict_stream_order
    }

    /// Formats in declaration order.
    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn get(&self, name: &str) -> Option<&Format> {
        self.formats.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|f| f.name.as_str())
    }

    pub fn aliases(&self) -> &CodecAliasMap {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Parses the built-in catalog document.
pub fn builtin_document() -> Result<CatalogDocument, CatalogError> {
    toml::from_str(BUILTIN_CATALOG).map_err(|e| CatalogError::ParseError(e.to_string()))
}
