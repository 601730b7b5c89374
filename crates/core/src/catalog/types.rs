//! Types for the output format catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Engine stream specifier prefix ("a" or "v").
    pub fn specifier(&self) -> &'static str {
        match self {
            Self::Audio => "a",
            Self::Video => "v",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Post-processing applied to the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prepend {
    /// Write an ID3v2 tag in front of the engine output.
    Id3v2,
}

/// Maps short codec names to the encoder identifiers the engine expects.
///
/// Names without an entry resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecAliasMap(BTreeMap<String, String>);

impl CodecAliasMap {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Resolves a codec name through the map.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Returns a map where entries of `overrides` replace entries of `self`.
    pub fn merged(&self, overrides: &CodecAliasMap) -> CodecAliasMap {
        let mut entries = self.0.clone();
        entries.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        CodecAliasMap(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One audio or video slot of a format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub media: MediaKind,
    /// Acceptable codec names, in order of preference.
    pub codecs: Vec<String>,
}

impl StreamSpec {
    /// Whether `codec` is acceptable for this slot once both sides are
    /// resolved through `aliases`.
    pub fn accepts(&self, codec: &str, aliases: &CodecAliasMap) -> bool {
        let wanted = aliases.resolve(codec);
        self.codecs.iter().any(|c| aliases.resolve(c) == wanted)
    }

    /// Encoder used when the source codec has to be transcoded.
    pub fn preferred_encoder<'a>(&'a self, aliases: &'a CodecAliasMap) -> Option<&'a str> {
        self.codecs.first().map(|c| aliases.resolve(c))
    }
}

/// A named output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub name: String,
    /// Container names the engine may report for this format. The first
    /// entry is the container the engine is asked to produce.
    pub containers: Vec<String>,
    pub mime_type: String,
    /// Filename extension; defaults to the format name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepend: Option<Prepend>,
    /// Extra engine output options for this format.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_flags: Vec<String>,
    pub streams: Vec<StreamSpec>,
}

impl Format {
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(&self.name)
    }

    /// Container the engine is asked to produce.
    pub fn output_container(&self) -> &str {
        self.containers.first().map(String::as_str).unwrap_or_default()
    }

    pub fn accepts_container(&self, container: &str) -> bool {
        self.containers.iter().any(|c| c == container)
    }

    pub fn has_media(&self, media: MediaKind) -> bool {
        self.streams.iter().any(|s| s.media == media)
    }
}

/// Catalog as it appears in a configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub codecs: CodecAliasMap,
    #[serde(default)]
    pub formats: Vec<Format>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> CodecAliasMap {
        CodecAliasMap::new(BTreeMap::from([
            ("mp3".to_string(), "libmp3lame".to_string()),
            ("vorbis".to_string(), "libvorbis".to_string()),
        ]))
    }

    #[test]
    fn test_resolve_passes_unknown_through() {
        let map = aliases();
        assert_eq!(map.resolve("mp3"), "libmp3lame");
        assert_eq!(map.resolve("flac"), "flac");
    }

    #[test]
    fn test_merged_overrides_entries() {
        let overrides =
            CodecAliasMap::new(BTreeMap::from([("mp3".to_string(), "mp3_mf".to_string())]));
        let merged = aliases().merged(&overrides);
        assert_eq!(merged.resolve("mp3"), "mp3_mf");
        assert_eq!(merged.resolve("vorbis"), "libvorbis");
    }

    #[test]
    fn test_stream_spec_accepts_aliased_names() {
        let spec = StreamSpec {
            media: MediaKind::Audio,
            codecs: vec!["mp3".to_string()],
        };
        let map = aliases();
        assert!(spec.accepts("mp3", &map));
        assert!(spec.accepts("libmp3lame", &map));
        assert!(!spec.accepts("aac", &map));
        assert_eq!(spec.preferred_encoder(&map), Some("libmp3lame"));
    }

    #[test]
    fn test_format_defaults() {
        let toml = r#"
name = "mkv"
containers = ["matroska"]
mime_type = "video/x-matroska"
streams = [
    { media = "audio", codecs = ["vorbis"] },
    { media = "video", codecs = ["vp8"] },
]
"#;
        let format: Format = toml::from_str(toml).unwrap();
        assert_eq!(format.extension(), "mkv");
        assert_eq!(format.output_container(), "matroska");
        assert!(format.prepend.is_none());
        assert!(format.output_flags.is_empty());
        assert!(format.has_media(MediaKind::Video));
        assert_eq!(format.streams[0].media, MediaKind::Audio);
    }

    #[test]
    fn test_prepend_deserializes() {
        let toml = r#"
name = "mp3"
containers = ["mp3"]
mime_type = "audio/mpeg"
prepend = "id3v2"
streams = [{ media = "audio", codecs = ["mp3"] }]
"#;
        let format: Format = toml::from_str(toml).unwrap();
        assert_eq!(format.prepend, Some(Prepend::Id3v2));
    }
}
