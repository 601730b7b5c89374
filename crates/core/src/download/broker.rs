//! The download control flow: extract, select, build, run.

use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::fetch::{FetchError, HttpFetcher, SourceFetcher};
use super::id3::{encode_id3v2, PrependReader};
use super::progress::ProgressReader;
use super::types::{
    output_filename, DownloadCompletion, DownloadOptions, DownloadProgress, DownloadResult,
    MediaStream,
};
use crate::catalog::{Catalog, CatalogError, Format, Prepend};
use crate::config::Config;
use crate::engine::{self, EngineError, InputReader, ProbeHints, ProbeResult, Supervisor};
use crate::extractor::{
    container_for_extension, ExtractInfo, Extractor, SourceStreamDescriptor, YoutubeDlExtractor,
};
use crate::metrics;
use crate::pipeline::{
    best_passthrough, build_pipeline, plan_sources, title_from_url, OutputMetadata,
};

const RAW_MIME_TYPE: &str = "application/octet-stream";

/// Engine progress events buffered before being forwarded.
const ENGINE_PROGRESS_BUFFER: usize = 16;

/// Turns a URL and a format name into a stream of output bytes.
///
/// The broker holds no per-download state; any number of downloads may run
/// on one instance concurrently.
pub struct Broker {
    catalog: Arc<Catalog>,
    extractor: Arc<dyn Extractor>,
    fetcher: Arc<dyn SourceFetcher>,
    supervisor: Supervisor,
}

impl Broker {
    pub fn new(
        catalog: Arc<Catalog>,
        extractor: Arc<dyn Extractor>,
        fetcher: Arc<dyn SourceFetcher>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            catalog,
            extractor,
            fetcher,
            supervisor,
        }
    }

    /// Creates a broker with the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        Ok(Self::new(
            Arc::new(config.catalog()?),
            Arc::new(YoutubeDlExtractor::new(config.extractor.clone())),
            Arc::new(HttpFetcher::new(config.fetch.clone())),
            Supervisor::new(config.engine.clone()),
        ))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Starts a download and returns as soon as output can be read.
    ///
    /// The returned media stream carries the output incrementally; the
    /// outcome of the run is reported by [`DownloadResult::wait`]. Cancelling
    /// `cancel` stops the extractor, the fetches and the engine.
    pub async fn download(
        &self,
        cancel: &CancellationToken,
        options: DownloadOptions,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<DownloadResult, DownloadError> {
        let result = self.start(cancel, &options, progress).await;
        if let Err(e) = &result {
            metrics::DOWNLOADS_FAILED
                .with_label_values(&[e.stage()])
                .inc();
            warn!(url = %options.url, format = %options.format, error = %e, "Download failed to start");
        }
        result
    }

    /// Probes the first bytes of `reader`. `limit_bytes` defaults to the
    /// configured probe limit.
    pub async fn probe(
        &self,
        cancel: &CancellationToken,
        reader: InputReader,
        limit_bytes: Option<u64>,
        hints: &ProbeHints,
    ) -> Result<ProbeResult, EngineError> {
        let limit = limit_bytes.unwrap_or(self.supervisor.config().probe_limit_bytes);
        engine::probe(&self.supervisor, cancel, reader, limit, hints).await
    }

    async fn start(
        &self,
        cancel: &CancellationToken,
        options: &DownloadOptions,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<DownloadResult, DownloadError> {
        let format = if options.is_raw() {
            None
        } else {
            Some(
                self.catalog
                    .get(&options.format)
                    .ok_or_else(|| DownloadError::UnknownFormat(options.format.clone()))?,
            )
        };

        let info = self.extract(cancel, &options.url, &progress).await?;
        if !info.formats.iter().any(|d| d.is_progressive()) {
            return Err(DownloadError::NoSourceStreams {
                url: options.url.clone(),
            });
        }

        match format {
            Some(format) => self.start_transcode(cancel, options, format, info, progress).await,
            None => self.start_raw(cancel, options, info, progress).await,
        }
    }

    async fn extract(
        &self,
        cancel: &CancellationToken,
        url: &str,
        progress: &Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<ExtractInfo, DownloadError> {
        notify(progress, DownloadProgress::Extracting);

        let started = Instant::now();
        let result = self.extractor.extract(cancel, url).await;
        let outcome = if result.is_ok() { "success" } else { "failed" };
        metrics::EXTRACT_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        let info = result.map_err(|source| {
            if source.is_cancelled() {
                DownloadError::Cancelled
            } else {
                DownloadError::Extract {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        debug!(
            url,
            extractor = self.extractor.name(),
            title = %info.title,
            formats = info.formats.len(),
            "Sources extracted"
        );
        notify(
            progress,
            DownloadProgress::Extracted {
                title: info.title.clone(),
                formats: info.formats.len(),
            },
        );
        Ok(info)
    }

    async fn start_transcode(
        &self,
        cancel: &CancellationToken,
        options: &DownloadOptions,
        format: &Format,
        info: ExtractInfo,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<DownloadResult, DownloadError> {
        let url = options.url.as_str();
        let plan = plan_sources(format, &info.formats, self.catalog.aliases()).map_err(
            |source| DownloadError::NoSuitableStream {
                url: url.to_string(),
                format: format.name.clone(),
                source,
            },
        )?;
        let source_ids: Vec<String> = plan.sources.iter().map(|s| s.format_id.clone()).collect();
        debug!(
            url,
            format = %format.name,
            sources = ?source_ids,
            remux = plan.is_remux(),
            "Sources selected"
        );

        let inputs = try_join_all(plan.sources.iter().map(|s| self.open(cancel, s))).await?;

        let title = title_or_fallback(&info, url);
        let metadata = OutputMetadata {
            title: Some(title.clone()),
            artist: info.uploader.clone(),
            cover: info.thumbnail_bytes.clone(),
        };

        let transcode_error = |source: EngineError| DownloadError::Transcode {
            url: url.to_string(),
            format: format.name.clone(),
            source,
        };
        let spec = build_pipeline(format, &plan, inputs, options.time_range, &metadata)
            .map_err(transcode_error)?;

        notify(
            &progress,
            DownloadProgress::Started {
                format: format.name.clone(),
                sources: source_ids,
            },
        );
        let handle = self
            .supervisor
            .start_pipeline(cancel, spec, forward_engine_progress(&progress))
            .map_err(transcode_error)?;

        metrics::DOWNLOADS_STARTED
            .with_label_values(&["transcode"])
            .inc();
        info!(url, format = %format.name, pid = ?handle.pid(), "Download started");

        let (output, completion) = handle.into_parts();
        let output: MediaStream = match format.prepend {
            Some(Prepend::Id3v2) => Box::new(PrependReader::new(output, encode_id3v2(&metadata))),
            None => Box::new(output),
        };

        Ok(DownloadResult::new(
            Box::new(ProgressReader::new(output, progress)),
            output_filename(&title, format.extension()),
            format.mime_type.clone(),
            Some(format.name.clone()),
            DownloadCompletion::engine(url.to_string(), format.name.clone(), completion),
        ))
    }

    async fn start_raw(
        &self,
        cancel: &CancellationToken,
        options: &DownloadOptions,
        info: ExtractInfo,
        progress: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<DownloadResult, DownloadError> {
        let url = options.url.as_str();
        let source = best_passthrough(&info.formats).ok_or_else(|| {
            DownloadError::NoSourceStreams {
                url: url.to_string(),
            }
        })?;
        if !options.time_range.is_full() {
            warn!(url, range = %options.time_range, "Time range ignored without a target format");
        }

        let extension = source.extension.as_deref().unwrap_or_default();
        let codecs: Vec<&str> = [source.normalized_audio_codec(), source.normalized_video_codec()]
            .into_iter()
            .flatten()
            .collect();
        let matched = self
            .catalog
            .find_by_format_codecs(container_for_extension(extension), &codecs);
        debug!(
            url,
            source = %source.format_id,
            matched = ?matched.map(|f| f.name.as_str()),
            "Passing source through"
        );

        notify(
            &progress,
            DownloadProgress::Started {
                format: String::new(),
                sources: vec![source.format_id.clone()],
            },
        );
        let reader = self.open(cancel, source).await?;

        metrics::DOWNLOADS_STARTED.with_label_values(&["raw"]).inc();
        info!(url, source = %source.format_id, "Download started");

        let mut media = ProgressReader::new(reader, progress).with_cancel(cancel.clone());
        let done = media.watch();

        let extension = match matched {
            Some(format) => format.extension(),
            None if !extension.is_empty() => extension,
            None => "bin",
        };

        Ok(DownloadResult::new(
            Box::new(media),
            output_filename(&title_or_fallback(&info, url), extension),
            matched
                .map(|f| f.mime_type.clone())
                .unwrap_or_else(|| RAW_MIME_TYPE.to_string()),
            matched.map(|f| f.name.clone()),
            DownloadCompletion::passthrough(
                url.to_string(),
                source.format_id.clone(),
                done,
                cancel.clone(),
            ),
        ))
    }

    async fn open(
        &self,
        cancel: &CancellationToken,
        source: &SourceStreamDescriptor,
    ) -> Result<InputReader, DownloadError> {
        self.fetcher
            .open(cancel, source)
            .await
            .map_err(|source_error| match source_error {
                FetchError::Cancelled => DownloadError::Cancelled,
                e => DownloadError::Fetch {
                    format_id: source.format_id.clone(),
                    source: e,
                },
            })
    }
}

fn title_or_fallback(info: &ExtractInfo, url: &str) -> String {
    if info.title.trim().is_empty() {
        title_from_url(url)
    } else {
        info.title.clone()
    }
}

fn notify(progress: &Option<mpsc::Sender<DownloadProgress>>, event: DownloadProgress) {
    if let Some(tx) = progress {
        let _ = tx.try_send(event);
    }
}

/// Relays engine progress to the download's progress channel, if any.
fn forward_engine_progress(
    progress: &Option<mpsc::Sender<DownloadProgress>>,
) -> Option<mpsc::Sender<engine::EngineProgress>> {
    let tx = progress.clone()?;
    let (engine_tx, mut engine_rx) = mpsc::channel(ENGINE_PROGRESS_BUFFER);
    tokio::spawn(async move {
        while let Some(update) = engine_rx.recv().await {
            let _ = tx.try_send(DownloadProgress::Transcoding(update));
        }
    });
    Some(engine_tx)
}
