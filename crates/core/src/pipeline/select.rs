//! Choosing which source renditions feed a format's stream slots.

use std::cmp::Ordering;
use thiserror::Error;

use super::types::{StreamMap, TargetCodec};
use crate::catalog::{CodecAliasMap, Format, MediaKind, StreamSpec};
use crate::extractor::SourceStreamDescriptor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("No source stream carries {media}")]
    NoStream { media: MediaKind },
}

/// Selected sources and the stream map for every slot of a format.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    /// Distinct sources, in input order.
    pub sources: Vec<SourceStreamDescriptor>,
    /// One map per format stream slot, in slot order.
    pub maps: Vec<StreamMap>,
}

impl SourcePlan {
    /// Whether every slot is remuxed without re-encoding.
    pub fn is_remux(&self) -> bool {
        self.maps.iter().all(|m| m.codec.is_copy())
    }
}

/// Picks a source for every stream slot of `format`.
///
/// For each slot, a rendition whose codec the slot already accepts is
/// preferred, then one carrying only that media, then the higher bitrate.
/// Renditions chosen for more than one slot become a single input.
pub fn plan_sources(
    format: &Format,
    descriptors: &[SourceStreamDescriptor],
    aliases: &CodecAliasMap,
) -> Result<SourcePlan, SelectError> {
    let usable: Vec<&SourceStreamDescriptor> =
        descriptors.iter().filter(|d| d.is_progressive()).collect();

    let mut chosen: Vec<&SourceStreamDescriptor> = Vec::new();
    let mut maps = Vec::with_capacity(format.streams.len());

    for slot in &format.streams {
        let best = usable
            .iter()
            .copied()
            .filter(|d| d.has_media(slot.media))
            .max_by(|a, b| compare_for_slot(slot, aliases, a, b))
            .ok_or(SelectError::NoStream { media: slot.media })?;

        let input = match chosen.iter().position(|d| std::ptr::eq(*d, best)) {
            Some(input) => input,
            None => {
                chosen.push(best);
                chosen.len() - 1
            }
        };

        maps.push(StreamMap {
            input,
            media: slot.media,
            codec: target_codec(slot, best.codec(slot.media).unwrap_or_default(), aliases),
        });
    }

    Ok(SourcePlan {
        sources: chosen.into_iter().cloned().collect(),
        maps,
    })
}

/// `copy` when the slot accepts the source codec, otherwise the slot's
/// preferred encoder.
pub fn target_codec(slot: &StreamSpec, source_codec: &str, aliases: &CodecAliasMap) -> TargetCodec {
    if slot.accepts(source_codec, aliases) {
        return TargetCodec::Copy;
    }
    slot.preferred_encoder(aliases)
        .map(|encoder| TargetCodec::Encode(encoder.to_string()))
        .unwrap_or(TargetCodec::Copy)
}

fn compare_for_slot(
    slot: &StreamSpec,
    aliases: &CodecAliasMap,
    a: &SourceStreamDescriptor,
    b: &SourceStreamDescriptor,
) -> Ordering {
    let accepted =
        |d: &SourceStreamDescriptor| d.codec(slot.media).is_some_and(|c| slot.accepts(c, aliases));
    let single = |d: &SourceStreamDescriptor| d.media_count() == 1;

    accepted(a)
        .cmp(&accepted(b))
        .then_with(|| single(a).cmp(&single(b)))
        .then_with(|| a.normalized_bitrate().total_cmp(&b.normalized_bitrate()))
}

/// Best rendition to pass through untouched: prefers renditions carrying
/// both audio and video, then the higher bitrate.
pub fn best_passthrough(descriptors: &[SourceStreamDescriptor]) -> Option<&SourceStreamDescriptor> {
    descriptors
        .iter()
        .filter(|d| d.is_progressive())
        .max_by(|a, b| {
            a.media_count()
                .cmp(&b.media_count())
                .then_with(|| a.normalized_bitrate().total_cmp(&b.normalized_bitrate()))
        })
}
