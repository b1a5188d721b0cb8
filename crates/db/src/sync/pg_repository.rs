use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sync::models::{
    sentinel_watermark, RunStatus, SyncOutcome, SyncRun, SyncStatus, SyncType, Watermark,
    EVENTS_SOURCE,
};
use crate::sync::repositories::SyncWatermarkRepository;
use evsync_common::error::{EvsyncError, EvsyncResult};

const WATERMARK_COLUMNS: &str =
    "source, last_changed_at, last_status, last_message, last_sync_type, updated_at";

const RUN_COLUMNS: &str = "id, source, sync_type, status, message, last_changed_at, \
     events_saved, started_at, finished_at";

#[derive(Clone)]
pub struct PgSyncRepository {
    pool: PgPool,
    source: String,
}

impl PgSyncRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::for_source(pool, EVENTS_SOURCE)
    }

    pub fn for_source(pool: PgPool, source: &str) -> Self {
        Self {
            pool,
            source: source.to_string(),
        }
    }

    fn map_watermark(row: sqlx::postgres::PgRow) -> EvsyncResult<Watermark> {
        let status: String = row.get("last_status");
        let sync_type: Option<String> = row.get("last_sync_type");
        Ok(Watermark {
            source: row.get("source"),
            last_changed_at: row.get("last_changed_at"),
            last_status: status.parse::<SyncStatus>().map_err(EvsyncError::Database)?,
            last_message: row.get("last_message"),
            last_sync_type: sync_type
                .map(|t| t.parse::<SyncType>())
                .transpose()
                .map_err(EvsyncError::Database)?,
            updated_at: row.get("updated_at"),
        })
    }

    fn map_run(row: sqlx::postgres::PgRow) -> EvsyncResult<SyncRun> {
        let sync_type: String = row.get("sync_type");
        let status: String = row.get("status");
        Ok(SyncRun {
            id: row.get("id"),
            source: row.get("source"),
            sync_type: sync_type.parse::<SyncType>().map_err(EvsyncError::Database)?,
            status: status.parse::<RunStatus>().map_err(EvsyncError::Database)?,
            message: row.get("message"),
            last_changed_at: row.get("last_changed_at"),
            events_saved: row.get("events_saved"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        })
    }
}

#[async_trait]
impl SyncWatermarkRepository for PgSyncRepository {
    async fn ensure_watermark(&self) -> EvsyncResult<Watermark> {
        let row = sqlx::query(&format!(
            "insert into sync_watermarks (source, last_changed_at, last_status, last_message, updated_at)
             values ($1, $2, $3, '', $4)
             on conflict (source) do update set source = excluded.source
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(&self.source)
        .bind(sentinel_watermark())
        .bind(SyncStatus::Never.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))?;

        Self::map_watermark(row)
    }

    async fn get_watermark(&self) -> EvsyncResult<DateTime<Utc>> {
        let row = sqlx::query("select last_changed_at from sync_watermarks where source = $1")
            .bind(&self.source)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        Ok(row
            .map(|r| r.get::<DateTime<Utc>, _>("last_changed_at"))
            .unwrap_or_else(sentinel_watermark))
    }

    async fn get_state(&self) -> EvsyncResult<Option<Watermark>> {
        let row = sqlx::query(&format!(
            "select {WATERMARK_COLUMNS} from sync_watermarks where source = $1"
        ))
        .bind(&self.source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))?;

        row.map(Self::map_watermark).transpose()
    }

    async fn record_outcome(&self, outcome: &SyncOutcome) -> EvsyncResult<SyncRun> {
        let events_saved = i64::try_from(outcome.events_saved)
            .map_err(|_| EvsyncError::Validation("events_saved out of range".to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        let row = sqlx::query(&format!(
            "insert into sync_runs
             (id, source, sync_type, status, message, last_changed_at, events_saved, started_at, finished_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             returning {RUN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&self.source)
        .bind(outcome.sync_type.as_str())
        .bind(outcome.status.as_str())
        .bind(&outcome.message)
        .bind(outcome.last_changed_at)
        .bind(events_saved)
        .bind(outcome.started_at)
        .bind(outcome.finished_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))?;

        sqlx::query(
            "insert into sync_watermarks
             (source, last_changed_at, last_status, last_message, last_sync_type, updated_at)
             values ($1, $2, $3, $4, $5, $6)
             on conflict (source) do update set
               last_changed_at = greatest(sync_watermarks.last_changed_at, excluded.last_changed_at),
               last_status = excluded.last_status,
               last_message = excluded.last_message,
               last_sync_type = excluded.last_sync_type,
               updated_at = excluded.updated_at",
        )
        .bind(&self.source)
        .bind(outcome.last_changed_at.max(sentinel_watermark()))
        .bind(SyncStatus::from(outcome.status).as_str())
        .bind(&outcome.message)
        .bind(outcome.sync_type.as_str())
        .bind(outcome.finished_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        Self::map_run(row)
    }

    async fn list_runs(&self, limit: i64) -> EvsyncResult<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs
             where source = $1
             order by finished_at desc
             limit $2"
        ))
        .bind(&self.source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_run).collect()
    }
}
