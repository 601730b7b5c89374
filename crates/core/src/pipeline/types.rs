//! Declarative description of one engine run.

use std::fmt;

use crate::catalog::MediaKind;
use crate::engine::{input_url, EngineConfig, EngineError, EngineInvocation, InputReader};
use crate::timerange::{format_seconds, TimeRange};

/// Codec an output stream is produced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCodec {
    /// Remux without re-encoding.
    Copy,
    /// Encode with the named engine encoder.
    Encode(String),
}

impl TargetCodec {
    pub fn as_engine_arg(&self) -> &str {
        match self {
            Self::Copy => "copy",
            Self::Encode(encoder) => encoder,
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Copy)
    }
}

impl fmt::Display for TargetCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_engine_arg())
    }
}

/// One output stream: which input stream feeds it and how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMap {
    pub input: usize,
    pub media: MediaKind,
    pub codec: TargetCodec,
}

impl StreamMap {
    /// Engine stream specifier within the input, e.g. "a:0".
    pub fn specifier(&self) -> String {
        format!("{}:0", self.media.specifier())
    }
}

/// Tags written to the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Cover image bytes.
    pub cover: Option<Vec<u8>>,
}

impl OutputMetadata {
    /// Text tags as engine `key=value` pairs.
    pub fn tags(&self) -> Vec<(String, String)> {
        [("title", &self.title), ("artist", &self.artist)]
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect()
    }
}

/// Everything the engine needs for one run. Output stream `i` is produced
/// from `maps[i]`, which keeps the output aligned with the format's streams.
pub struct PipelineSpec {
    pub inputs: Vec<InputReader>,
    pub maps: Vec<StreamMap>,
    /// Engine muxer name.
    pub container: String,
    pub trim: TimeRange,
    pub metadata: Vec<(String, String)>,
    pub output_flags: Vec<String>,
    /// Short description used in log lines.
    pub label: String,
}

impl fmt::Debug for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSpec")
            .field("inputs", &self.inputs.len())
            .field("maps", &self.maps)
            .field("container", &self.container)
            .field("trim", &self.trim)
            .field("metadata", &self.metadata)
            .field("output_flags", &self.output_flags)
            .finish()
    }
}

impl PipelineSpec {
    /// Checks the spec is structurally runnable.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.inputs.is_empty() {
            return Err(EngineError::invalid_spec("pipeline has no inputs"));
        }
        if self.maps.is_empty() {
            return Err(EngineError::invalid_spec("pipeline has no stream maps"));
        }
        if self.container.is_empty() {
            return Err(EngineError::invalid_spec("pipeline has no output container"));
        }
        if let Some((i, map)) = self
            .maps
            .iter()
            .enumerate()
            .find(|(_, m)| m.input >= self.inputs.len())
        {
            return Err(EngineError::invalid_spec(format!(
                "stream map {} refers to missing input {}",
                i, map.input
            )));
        }
        // An unread input would stall its feeder until teardown.
        if let Some(unused) = (0..self.inputs.len()).find(|i| !self.maps.iter().any(|m| m.input == *i))
        {
            return Err(EngineError::invalid_spec(format!(
                "input {} is not used by any stream map",
                unused
            )));
        }
        Ok(())
    }

    /// ffmpeg command line for this spec, without the program name.
    pub fn engine_args(&self, config: &EngineConfig) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            config.log_level.clone(),
            "-progress".into(),
            "pipe:2".into(),
            "-nostats".into(),
        ];

        for index in 0..self.inputs.len() {
            args.push("-i".into());
            args.push(input_url(index));
        }

        for map in &self.maps {
            args.push("-map".into());
            args.push(format!("{}:{}", map.input, map.specifier()));
        }

        for (i, map) in self.maps.iter().enumerate() {
            args.push(format!("-codec:{}", i));
            args.push(map.codec.as_engine_arg().to_string());
        }

        if !self.trim.start.is_zero() {
            args.push("-ss".into());
            args.push(format_seconds(self.trim.start));
        }
        if let Some(duration) = self.trim.duration() {
            args.push("-t".into());
            args.push(format_seconds(duration));
        }

        for (key, value) in &self.metadata {
            args.push("-metadata".into());
            args.push(format!("{}={}", key, value));
        }

        args.extend(self.output_flags.iter().cloned());
        args.extend(config.extra_ffmpeg_args.iter().cloned());

        args.push("-f".into());
        args.push(self.container.clone());
        args.push("pipe:1".into());
        args
    }

    /// Validates the spec and lowers it to an ffmpeg invocation.
    pub fn into_invocation(self, config: &EngineConfig) -> Result<EngineInvocation, EngineError> {
        self.validate()?;
        let args = self.engine_args(config);

        Ok(EngineInvocation {
            program: config.ffmpeg_path.clone(),
            args,
            inputs: self.inputs,
            label: self.label,
            progress: None,
        })
    }
}
