pub mod download;
pub mod formats;
pub mod handlers;
pub mod middleware;
pub mod probe;
pub mod routes;

pub use routes::create_router;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// JSON body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}
