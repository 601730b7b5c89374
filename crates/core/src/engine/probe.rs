//! Stream inspection through ffprobe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::EngineError;
use super::supervisor::Supervisor;
use super::types::{input_url, EngineInvocation};
use crate::catalog::MediaKind;
use crate::metrics;

/// Optional knowledge about the probed input.
#[derive(Debug, Clone, Default)]
pub struct ProbeHints {
    /// Container to force instead of letting the engine guess.
    pub container: Option<String>,
}

impl ProbeHints {
    pub fn container(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
        }
    }
}

/// One stream reported by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStream {
    pub index: usize,
    /// `None` for data, subtitle and attachment streams.
    pub media: Option<MediaKind>,
    pub codec_name: String,
}

/// What the probe learned about a byte stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Primary container name, e.g. "mov" for "mov,mp4,m4a,3gp,3g2,mj2".
    pub container: String,
    /// Every container name the engine reported.
    pub containers: Vec<String>,
    /// Streams in output order.
    pub streams: Vec<ProbeStream>,
    /// Container level tags, keys lowercased.
    pub tags: BTreeMap<String, String>,
    pub duration: Option<Duration>,
}

impl ProbeResult {
    pub fn title(&self) -> Option<&str> {
        self.tags.get("title").map(String::as_str)
    }

    pub fn artist(&self) -> Option<&str> {
        self.tags.get("artist").map(String::as_str)
    }

    /// Codec names of the audio and video streams, in order.
    pub fn codecs(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|s| s.media.is_some())
            .map(|s| s.codec_name.as_str())
            .collect()
    }
}

/// Builds the ffprobe arguments for a stdin probe.
pub(crate) fn probe_args(hints: &ProbeHints) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
    if let Some(ref container) = hints.container {
        args.extend(["-f".to_string(), container.clone()]);
    }
    args.extend([
        "-i".to_string(),
        input_url(0),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
    ]);
    args
}

/// Parses ffprobe JSON output into a ProbeResult.
pub fn parse_probe_output(output: &str) -> Result<ProbeResult, EngineError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: Option<ProbeFormat>,
        #[serde(default)]
        streams: Vec<RawStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        #[serde(default)]
        format_name: String,
        duration: Option<String>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    }

    #[derive(Deserialize)]
    struct RawStream {
        index: usize,
        #[serde(default)]
        codec_type: String,
        codec_name: Option<String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| EngineError::ParseError {
        reason: format!("Failed to parse ffprobe output: {}", e),
    })?;

    let format = probe
        .format
        .filter(|f| !f.format_name.is_empty())
        .ok_or_else(|| EngineError::probe_failed("no container identified", None))?;

    let containers: Vec<String> = format
        .format_name
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let streams = probe
        .streams
        .into_iter()
        .map(|s| ProbeStream {
            index: s.index,
            media: match s.codec_type.as_str() {
                "audio" => Some(MediaKind::Audio),
                "video" => Some(MediaKind::Video),
                _ => None,
            },
            codec_name: s.codec_name.unwrap_or_default(),
        })
        .collect();

    let duration = format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64);

    Ok(ProbeResult {
        container: containers.first().cloned().unwrap_or_default(),
        containers,
        streams,
        tags: format
            .tags
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect(),
        duration,
    })
}

/// Identifies container, streams and tags of `reader`.
///
/// At most `limit_bytes` are consumed from `reader`; the bytes are gone
/// afterwards, so callers that still need the stream must tee it first.
pub async fn probe<R>(
    supervisor: &Supervisor,
    cancel: &CancellationToken,
    reader: R,
    limit_bytes: u64,
    hints: &ProbeHints,
) -> Result<ProbeResult, EngineError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let result = run_probe(supervisor, cancel, reader, limit_bytes, hints).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(EngineError::Cancelled) => "cancelled",
        Err(_) => "failed",
    };
    metrics::PROBES_TOTAL.with_label_values(&[outcome]).inc();
    result
}

async fn run_probe<R>(
    supervisor: &Supervisor,
    cancel: &CancellationToken,
    reader: R,
    limit_bytes: u64,
    hints: &ProbeHints,
) -> Result<ProbeResult, EngineError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let consumed = Arc::new(AtomicU64::new(0));
    let truncated = Arc::new(AtomicBool::new(false));
    let input = LimitedReader {
        inner: reader.take(limit_bytes),
        checked: false,
        count: consumed.clone(),
        truncated: truncated.clone(),
    };

    let invocation = EngineInvocation::new(&supervisor.config().ffprobe_path, probe_args(hints))
        .with_input(Box::new(input))
        .with_label("probe");

    let (mut output, completion) = supervisor.start(cancel, invocation)?.into_parts();
    let mut json = String::new();
    let read = output.read_to_string(&mut json).await;
    drop(output);
    let waited = completion.wait().await;
    let consumed = consumed.load(Ordering::SeqCst);
    let truncated = truncated.load(Ordering::SeqCst);
    debug!(consumed, limit_bytes, truncated, "Probe finished");

    match waited {
        Ok(()) => {}
        Err(EngineError::Failed { stderr, .. }) => {
            return Err(if consumed == 0 {
                EngineError::EmptyInput
            } else if truncated {
                EngineError::ProbeLimitExceeded { limit: limit_bytes }
            } else {
                let reason = stderr
                    .lines()
                    .rfind(|l| !l.trim().is_empty())
                    .unwrap_or("input not recognized")
                    .to_string();
                EngineError::probe_failed(reason, Some(stderr))
            });
        }
        Err(e) => return Err(e),
    }

    read?;
    if consumed == 0 {
        return Err(EngineError::EmptyInput);
    }

    match parse_probe_output(&json) {
        Err(EngineError::ProbeFailed { .. }) if truncated => {
            Err(EngineError::ProbeLimitExceeded { limit: limit_bytes })
        }
        result => result,
    }
}

/// Hands at most the limit to the engine, counting bytes, and records
/// whether the source had more beyond it.
struct LimitedReader<R> {
    inner: Take<R>,
    checked: bool,
    count: Arc<AtomicU64>,
    truncated: Arc<AtomicBool>,
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = (buf.filled().len() - before) as u64;
        this.count.fetch_add(read, Ordering::SeqCst);

        // At the limit, look one byte past it before reporting EOF.
        if read == 0 && this.inner.limit() == 0 && !this.checked {
            let mut extra = [0u8; 1];
            let mut extra_buf = ReadBuf::new(&mut extra);
            let more = match ready!(Pin::new(this.inner.get_mut()).poll_read(cx, &mut extra_buf)) {
                Ok(()) => !extra_buf.filled().is_empty(),
                // Past the limit a failing source is not the engine's input.
                Err(_) => false,
            };
            this.checked = true;
            this.truncated.store(more, Ordering::SeqCst);
        }
        Poll::Ready(Ok(()))
    }
}
