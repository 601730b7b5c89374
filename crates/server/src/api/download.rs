//! Streaming download handler.
//!
//! The response head is sent once the broker has started the download. The
//! body streams engine output as it is produced; when the download fails
//! after the head was sent the body ends with an error, which aborts the
//! chunked response instead of completing it.

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{future, stream, StreamExt};
use mediabroker_core::{DownloadError, DownloadOptions, DownloadResult, TimeRange};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, warn};

use super::{api_error, ApiError};
use crate::metrics::{STREAMS_ACTIVE, STREAMS_FINISHED};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a download
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    /// Source page URL handed to the extractor
    pub url: String,
    /// Catalog format name; empty streams the best source as-is
    #[serde(default)]
    pub format: String,
    /// Optional time range, e.g. `10s-1m`
    pub range: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/download - Stream a source in the requested format
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    if params.url.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing url"));
    }

    let mut options = DownloadOptions::new(params.url.clone(), params.format.clone());
    if let Some(range) = params.range.as_deref().filter(|r| !r.trim().is_empty()) {
        let range: TimeRange = range
            .parse()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        options = options.with_time_range(range);
    }

    let cancel = state.shutdown_token().child_token();
    let result = state
        .broker()
        .download(&cancel, options, None)
        .await
        .map_err(|e| api_error(error_status(&e), e))?;

    debug!(
        url = %params.url,
        format = ?result.format,
        filename = %result.filename,
        "Streaming download"
    );

    let content_type = HeaderValue::from_str(&result.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&result.filename);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        stream_body(result, cancel),
    )
        .into_response())
}

/// Builds the response body and takes over waiting for the download.
///
/// The completion is awaited on its own task so the outcome is recorded
/// even when the client goes away. Dropping the body drops the media
/// stream and cancels the download.
fn stream_body(result: DownloadResult, cancel: CancellationToken) -> Body {
    let (media, completion) = result.into_parts();
    let (tx, rx) = oneshot::channel::<Result<(), DownloadError>>();

    STREAMS_ACTIVE.inc();
    tokio::spawn(async move {
        let outcome = completion.wait().await;
        STREAMS_ACTIVE.dec();
        let label = match &outcome {
            Ok(()) => "complete",
            Err(e) if e.is_cancelled() => "cancelled",
            Err(_) => "failed",
        };
        STREAMS_FINISHED.with_label_values(&[label]).inc();
        let _ = tx.send(outcome);
    });

    let guard = cancel.drop_guard();
    let tail = stream::once(async move {
        let _guard = guard;
        match rx.await {
            Ok(Ok(())) | Err(_) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Download failed after streaming started");
                Some(Err::<Bytes, io::Error>(io::Error::other(e.to_string())))
            }
        }
    })
    .filter_map(future::ready);

    Body::from_stream(ReaderStream::new(media).chain(tail))
}

/// Status for a download that failed before any byte was sent.
pub fn error_status(error: &DownloadError) -> StatusCode {
    match error {
        DownloadError::UnknownFormat(_) => StatusCode::BAD_REQUEST,
        DownloadError::NoSuitableStream { .. } | DownloadError::NoSourceStreams { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DownloadError::Transcode { source, .. } if source.is_start_failure() => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        e if e.is_cancelled() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// percent-encoded as `filename*`.
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
