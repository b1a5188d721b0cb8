pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/trigger", post(handlers::trigger_sync))
        .route("/api/sync/status", get(handlers::get_sync_status))
        .route("/api/sync/runs", get(handlers::list_sync_runs))
}
