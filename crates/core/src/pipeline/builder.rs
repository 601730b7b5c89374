//! Assembling a [`PipelineSpec`] for a format.

use super::select::SourcePlan;
use super::types::{OutputMetadata, PipelineSpec};
use crate::catalog::Format;
use crate::engine::{EngineError, InputReader};
use crate::timerange::TimeRange;

/// Builds the pipeline producing `format` from the planned sources.
///
/// `inputs` holds one reader per entry of `plan.sources`, in the same order.
pub fn build_pipeline(
    format: &Format,
    plan: &SourcePlan,
    inputs: Vec<InputReader>,
    time_range: TimeRange,
    metadata: &OutputMetadata,
) -> Result<PipelineSpec, EngineError> {
    if inputs.len() != plan.sources.len() {
        return Err(EngineError::invalid_spec(format!(
            "{} readers for {} sources",
            inputs.len(),
            plan.sources.len()
        )));
    }
    if plan.maps.len() != format.streams.len() {
        return Err(EngineError::invalid_spec(format!(
            "format {} has {} streams but {} maps were planned",
            format.name,
            format.streams.len(),
            plan.maps.len()
        )));
    }

    let sources: Vec<&str> = plan.sources.iter().map(|s| s.format_id.as_str()).collect();

    Ok(PipelineSpec {
        inputs,
        maps: plan.maps.clone(),
        container: format.output_container().to_string(),
        trim: time_range,
        metadata: metadata.tags(),
        output_flags: format.output_flags.clone(),
        label: format!("{} [{}]", format.name, sources.join("+")),
    })
}

/// Title used when the source has none: the last path segment of the URL,
/// else its host, else the URL itself.
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, MediaKind};
    use crate::pipeline::{plan_sources, TargetCodec};
    use crate::extractor::SourceStreamDescriptor;
    use std::time::Duration;

    fn reader() -> InputReader {
        Box::new(tokio::io::empty())
    }

    #[test]
    fn test_build_mp3_pipeline() {
        let catalog = Catalog::builtin().unwrap();
        let format = catalog.get("mp3").unwrap();
        let sources = vec![SourceStreamDescriptor::audio(
            "251",
            "https://cdn.example/251",
            "opus",
            "webm",
            160.0,
        )];
        let plan = plan_sources(format, &sources, catalog.aliases()).unwrap();
        let metadata = OutputMetadata {
            title: Some("Title".to_string()),
            artist: None,
            cover: None,
        };

        let spec = build_pipeline(
            format,
            &plan,
            vec![reader()],
            TimeRange::until(Duration::from_secs(30)),
            &metadata,
        )
        .unwrap();

        assert_eq!(spec.container, "mp3");
        assert_eq!(spec.maps.len(), 1);
        assert_eq!(spec.maps[0].media, MediaKind::Audio);
        assert_eq!(
            spec.maps[0].codec,
            TargetCodec::Encode("libmp3lame".to_string())
        );
        assert_eq!(spec.trim.duration(), Some(Duration::from_secs(30)));
        assert_eq!(spec.metadata, vec![("title".to_string(), "Title".to_string())]);
        assert!(spec.output_flags.contains(&"-id3v2_version".to_string()));
        assert_eq!(spec.label, "mp3 [251]");
        spec.validate().unwrap();
    }

    #[test]
    fn test_build_rejects_reader_count_mismatch() {
        let catalog = Catalog::builtin().unwrap();
        let format = catalog.get("mp3").unwrap();
        let sources = vec![SourceStreamDescriptor::audio("a", "https://x/a", "mp3", "mp3", 1.0)];
        let plan = plan_sources(format, &sources, catalog.aliases()).unwrap();

        let err = build_pipeline(
            format,
            &plan,
            Vec::new(),
            TimeRange::default(),
            &OutputMetadata::default(),
        )
        .unwrap_err();
        assert!(err.is_start_failure());
    }

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url("https://cdn.example.com/media/episode-12.mp3"),
            "episode-12.mp3"
        );
        assert_eq!(title_from_url("https://cdn.example.com/dir/"), "dir");
        assert_eq!(title_from_url("https://cdn.example.com"), "cdn.example.com");
        assert_eq!(title_from_url("not a url"), "not a url");
    }
}
