use evsync_db::sync::models::{SyncRun, Watermark};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub data: Option<Watermark>,
    pub running: bool,
    pub events_stored: i64,
}

#[derive(Debug, Serialize)]
pub struct SyncRunsResponse {
    pub data: Vec<SyncRun>,
    pub count: usize,
}
