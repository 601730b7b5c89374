//! Matching source container/codec combinations against the catalog.

use super::{Catalog, CodecAliasMap, Format, StreamSpec};

impl Catalog {
    /// Finds the first format, in declaration order, that can hold a source
    /// with the given container and codecs.
    ///
    /// A format matches when it lists `container` and its streams pair up
    /// one-to-one with `codecs`. Codecs are first compared position by
    /// position across the whole catalog; unless strict stream order is
    /// enabled, a second pass then accepts any one-to-one pairing.
    ///
    /// Returns `None` when nothing matches, including for an empty container
    /// or codec list.
    pub fn find_by_format_codecs<S: AsRef<str>>(
        &self,
        container: &str,
        codecs: &[S],
    ) -> Option<&Format> {
        if container.is_empty() || codecs.is_empty() {
            return None;
        }

        let codecs: Vec<&str> = codecs.iter().map(AsRef::as_ref).collect();
        let count = codecs.len();
        let candidates = move || {
            self.formats
                .iter()
                .filter(move |f| f.accepts_container(container) && f.streams.len() == count)
        };

        if let Some(format) =
            candidates().find(|f| aligned_in_order(&f.streams, &codecs, &self.aliases))
        {
            return Some(format);
        }

        if self.strict_stream_order {
            return None;
        }

        candidates().find(|f| {
            let mut used = vec![false; codecs.len()];
            aligned_any_order(&f.streams, &codecs, &self.aliases, &mut used)
        })
    }
}

fn aligned_in_order(streams: &[StreamSpec], codecs: &[&str], aliases: &CodecAliasMap) -> bool {
    streams
        .iter()
        .zip(codecs)
        .all(|(stream, codec)| stream.accepts(codec, aliases))
}

fn aligned_any_order(
    streams: &[StreamSpec],
    codecs: &[&str],
    aliases: &CodecAliasMap,
    used: &mut [bool],
) -> bool {
    let Some((stream, rest)) = streams.split_first() else {
        return true;
    };

    for (i, codec) in codecs.iter().enumerate() {
        if used[i] || !stream.accepts(codec, aliases) {
            continue;
        }
        used[i] = true;
        if aligned_any_order(rest, codecs, aliases, used) {
            return true;
        }
        used[i] = false;
    }

    false
}
