//! Format catalog API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mediabroker_core::{Format, Prepend, StreamSpec};
use serde::Serialize;
use std::sync::Arc;

use super::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// One output format as exposed to clients
#[derive(Debug, Serialize)]
pub struct FormatResponse {
    pub name: String,
    pub mime_type: String,
    pub extension: String,
    pub containers: Vec<String>,
    pub streams: Vec<StreamSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepend: Option<Prepend>,
}

impl From<&Format> for FormatResponse {
    fn from(format: &Format) -> Self {
        Self {
            name: format.name.clone(),
            mime_type: format.mime_type.clone(),
            extension: format.extension().to_string(),
            containers: format.containers.clone(),
            streams: format.streams.clone(),
            prepend: format.prepend,
        }
    }
}

/// Response for listing formats
#[derive(Debug, Serialize)]
pub struct ListFormatsResponse {
    pub formats: Vec<FormatResponse>,
    pub count: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/formats - List the catalog in declaration order
pub async fn list_formats(State(state): State<Arc<AppState>>) -> Json<ListFormatsResponse> {
    let formats: Vec<FormatResponse> = state
        .broker()
        .catalog()
        .formats()
        .iter()
        .map(FormatResponse::from)
        .collect();
    let count = formats.len();
    Json(ListFormatsResponse { formats, count })
}

/// GET /api/v1/formats/{name} - Get a single format
pub async fn get_format(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FormatResponse>, ApiError> {
    state
        .broker()
        .catalog()
        .get(&name)
        .map(|format| Json(FormatResponse::from(format)))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Format not found: {}", name)))
}
