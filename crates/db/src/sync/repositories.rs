use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sync::models::{SyncOutcome, SyncRun, Watermark};
use evsync_common::error::EvsyncResult;

#[async_trait]
pub trait SyncWatermarkRepository: Send + Sync {
    /// Create the watermark row at the sentinel floor if it does not exist.
    async fn ensure_watermark(&self) -> EvsyncResult<Watermark>;

    /// Highest `changed_at` known to be fully synced.
    /// Falls back to the sentinel when nothing has been recorded yet.
    async fn get_watermark(&self) -> EvsyncResult<DateTime<Utc>>;

    /// Full watermark record, if one exists.
    async fn get_state(&self) -> EvsyncResult<Option<Watermark>>;

    /// Atomically append a run record and advance the watermark/status.
    /// The stored watermark never moves backwards.
    async fn record_outcome(&self, outcome: &SyncOutcome) -> EvsyncResult<SyncRun>;

    /// Most recent run records first.
    async fn list_runs(&self, limit: i64) -> EvsyncResult<Vec<SyncRun>>;
}
