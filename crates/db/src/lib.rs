pub mod events;
pub mod schema;
pub mod sync;

use evsync_common::error::{EvsyncError, EvsyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> EvsyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| EvsyncError::Database(e.to_string()))
}
