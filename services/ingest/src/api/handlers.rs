use axum::extract::{Query, State};
use axum::Json;
use evsync_common::error::EvsyncError;
use evsync_db::sync::models::SyncType;

use crate::api::requests::RunsQuery;
use crate::api::responses::{SyncRunsResponse, SyncStatusResponse};
use crate::error::ApiError;
use crate::trigger::{SyncSummary, TriggerOutcome};
use crate::AppState;

pub async fn trigger_sync(State(state): State<AppState>) -> Result<Json<SyncSummary>, ApiError> {
    match state.trigger.trigger(SyncType::Manual).await {
        TriggerOutcome::Finished(summary) => Ok(Json(summary)),
        TriggerOutcome::AlreadyRunning => Err(EvsyncError::Conflict(
            "a sync is already in progress".to_string(),
        )
        .into()),
    }
}

pub async fn get_sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let data = state.sync_repo.get_state().await?;
    let events_stored = state.event_repo.count().await?;
    Ok(Json(SyncStatusResponse {
        data,
        running: state.trigger.is_running(),
        events_stored,
    }))
}

pub async fn list_sync_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<SyncRunsResponse>, ApiError> {
    let data = state.sync_repo.list_runs(query.effective_limit()).await?;
    let count = data.len();
    Ok(Json(SyncRunsResponse { data, count }))
}
