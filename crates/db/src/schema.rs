use evsync_common::error::{EvsyncError, EvsyncResult};
use sqlx::PgPool;

const SCHEMA: &[&str] = &[
    "create table if not exists events (
       id text primary key,
       name text not null,
       place jsonb not null,
       event_time timestamptz not null,
       registration_deadline timestamptz not null,
       status text not null,
       number_of_visitors integer not null,
       changed_at timestamptz not null,
       created_at timestamptz not null,
       status_changed_at timestamptz not null,
       synced_at timestamptz not null default now()
     )",
    "create index if not exists events_changed_at_idx on events(changed_at)",
    "create table if not exists sync_watermarks (
       source text primary key,
       last_changed_at timestamptz not null,
       last_status text not null default 'never',
       last_message text not null default '',
       last_sync_type text,
       updated_at timestamptz not null default now()
     )",
    "create table if not exists sync_runs (
       id uuid primary key,
       source text not null,
       sync_type text not null,
       status text not null,
       message text not null,
       last_changed_at timestamptz not null,
       events_saved bigint not null default 0,
       started_at timestamptz not null,
       finished_at timestamptz not null
     )",
    "create index if not exists sync_runs_source_finished_idx
       on sync_runs(source, finished_at desc)",
];

/// Create the tables this service owns if they do not exist yet.
///
/// Every statement is idempotent, so this runs on each startup.
pub async fn ensure_schema(pool: &PgPool) -> EvsyncResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;
    }
    tracing::info!(tables = 3, "database schema ready");
    Ok(())
}
