pub mod streams;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/streams", get(streams::list_streams))
        .route("/streams/{id}", get(streams::get_stream))
}
