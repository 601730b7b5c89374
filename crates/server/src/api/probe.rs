//! Probe handler: inspects an uploaded media prefix with ffprobe.

use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use mediabroker_core::{engine::ProbeHints, EngineError, ProbeResult};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

use super::{api_error, ApiError};
use crate::state::AppState;

/// Query parameters for a probe
#[derive(Debug, Deserialize)]
pub struct ProbeParams {
    /// Container hint passed to the prober
    pub container: Option<String>,
    /// Maximum number of bytes to inspect
    pub limit: Option<u64>,
}

/// POST /api/v1/probe - Probe the request body
pub async fn probe(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
    body: Body,
) -> Result<Json<ProbeResult>, ApiError> {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let reader = Box::new(StreamReader::new(stream));

    let hints = ProbeHints {
        container: params.container,
    };
    let cancel = state.shutdown_token().child_token();

    state
        .broker()
        .probe(&cancel, reader, params.limit, &hints)
        .await
        .map(Json)
        .map_err(|e| api_error(probe_status(&e), e))
}

fn probe_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::EmptyInput
        | EngineError::ProbeFailed { .. }
        | EngineError::ProbeLimitExceeded { .. }
        | EngineError::ParseError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
