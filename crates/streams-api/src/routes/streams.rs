use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use streams_core::{render_error_page, render_page, StreamId, StreamRow};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Leave failed streams out of the response.
    #[serde(default)]
    pub skip_failed: bool,
}

#[derive(Serialize)]
pub struct StreamsResponse {
    pub generated_at: String,
    pub count: usize,
    pub failed: usize,
    pub streams: Vec<StreamRow>,
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Response {
    match state.lister.list().await {
        Ok(listing) => Html(render_page(&listing)).into_response(),
        Err(e) => {
            warn!(error = %e, "Stream listing failed");
            (StatusCode::BAD_GATEWAY, Html(render_error_page(&e))).into_response()
        }
    }
}

/// GET /api/v1/streams
pub async fn list_streams(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<StreamsResponse>, ApiError> {
    let listing = state.lister.list().await?;
    let failed = listing.failed_count();

    let streams: Vec<StreamRow> = if query.skip_failed {
        listing.streams.into_iter().filter(|r| !r.is_failed()).collect()
    } else {
        listing.streams
    };

    Ok(Json(StreamsResponse {
        generated_at: listing.generated_at.to_rfc3339(),
        count: streams.len(),
        failed,
        streams,
    }))
}

/// GET /api/v1/streams/{id}
pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamRow>, ApiError> {
    let row = state.lister.lookup(StreamId::new(id)).await.inspect_err(|e| {
        warn!(error = %e, "Stream lookup failed");
    })?;
    Ok(Json(row))
}
