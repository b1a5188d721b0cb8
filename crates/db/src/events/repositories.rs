use async_trait::async_trait;

use crate::events::models::Event;
use evsync_common::error::EvsyncResult;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert or update a page of events in a single transaction.
    ///
    /// Existing rows are overwritten only when the incoming `changed_at` is
    /// not older than the stored one. Returns the number of rows written;
    /// stale events skipped by that rule are not counted.
    async fn upsert_batch(&self, events: &[Event]) -> EvsyncResult<u64>;

    async fn get_by_id(&self, id: &str) -> EvsyncResult<Option<Event>>;

    async fn count(&self) -> EvsyncResult<i64>;
}
