use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use streams_core::{ListError, ResolveError};

#[derive(Debug)]
pub enum ApiError {
    /// The upstream stream server could not produce a listing.
    BadGateway(String),
    /// The stream server has no such stream.
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<ListError> for ApiError {
    fn from(e: ListError) -> Self {
        ApiError::BadGateway(e.to_string())
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match &e {
            ResolveError::Source(source) if source.status_code() == Some(404) => {
                ApiError::NotFound(e.to_string())
            }
            _ => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_kind, message) = match self {
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
        };

        let body = ErrorBody {
            error: error_kind.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
