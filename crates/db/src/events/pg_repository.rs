use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::events::models::Event;
use crate::events::repositories::EventRepository;
use evsync_common::error::{EvsyncError, EvsyncResult};

const EVENT_COLUMNS: &str = "id, name, place, event_time, registration_deadline, status, \
     number_of_visitors, changed_at, created_at, status_changed_at";

#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> EvsyncResult<Event> {
        Ok(Event {
            id: row.get("id"),
            name: row.get("name"),
            place: row.get("place"),
            event_time: row.get("event_time"),
            registration_deadline: row.get("registration_deadline"),
            status: row.get("status"),
            number_of_visitors: row.get("number_of_visitors"),
            changed_at: row.get("changed_at"),
            created_at: row.get("created_at"),
            status_changed_at: row.get("status_changed_at"),
        })
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn upsert_batch(&self, events: &[Event]) -> EvsyncResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        let mut written = 0u64;
        for event in events {
            let result = sqlx::query(
                "insert into events
                 (id, name, place, event_time, registration_deadline, status,
                  number_of_visitors, changed_at, created_at, status_changed_at)
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 on conflict (id) do update set
                   name = excluded.name,
                   place = excluded.place,
                   event_time = excluded.event_time,
                   registration_deadline = excluded.registration_deadline,
                   status = excluded.status,
                   number_of_visitors = excluded.number_of_visitors,
                   changed_at = excluded.changed_at,
                   created_at = excluded.created_at,
                   status_changed_at = excluded.status_changed_at,
                   synced_at = now()
                 where events.changed_at <= excluded.changed_at",
            )
            .bind(&event.id)
            .bind(&event.name)
            .bind(&event.place)
            .bind(event.event_time)
            .bind(event.registration_deadline)
            .bind(&event.status)
            .bind(event.number_of_visitors)
            .bind(event.changed_at)
            .bind(event.created_at)
            .bind(event.status_changed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| EvsyncError::Database(format!("upsert event {}: {e}", event.id)))?;

            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        tracing::debug!(batch = events.len(), written, "event batch committed");
        Ok(written)
    }

    async fn get_by_id(&self, id: &str) -> EvsyncResult<Option<Event>> {
        let row = sqlx::query(&format!("select {EVENT_COLUMNS} from events where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn count(&self) -> EvsyncResult<i64> {
        let row = sqlx::query("select count(*) as cnt from events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EvsyncError::Database(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use crate::schema::ensure_schema;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    async fn test_repo() -> Option<PgEventRepository> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");
        ensure_schema(&pool).await.ok()?;
        Some(PgEventRepository::new(pool))
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn event(id: &str, name: &str, changed_day: u32) -> Event {
        Event {
            id: id.to_string(),
            name: name.to_string(),
            place: serde_json::json!({ "id": "place-1", "city": "Kazan" }),
            event_time: at(20),
            registration_deadline: at(18),
            status: "new".to_string(),
            number_of_visitors: 10,
            changed_at: at(changed_day),
            created_at: at(1),
            status_changed_at: at(1),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_new_rows() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let id = Uuid::new_v4().to_string();
        let written = repo
            .upsert_batch(&[event(&id, "Concert", 2)])
            .await
            .expect("upsert");
        assert_eq!(written, 1);

        let stored = repo.get_by_id(&id).await.expect("get").expect("row exists");
        assert_eq!(stored.name, "Concert");
        assert_eq!(stored.changed_at, at(2));
        assert_eq!(stored.place["city"], "Kazan");
    }

    #[tokio::test]
    async fn reapplying_same_page_is_idempotent() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let page = vec![
            event(&Uuid::new_v4().to_string(), "A", 2),
            event(&Uuid::new_v4().to_string(), "B", 3),
        ];
        repo.upsert_batch(&page).await.expect("first");
        repo.upsert_batch(&page).await.expect("second");

        for e in &page {
            let stored = repo.get_by_id(&e.id).await.expect("get").expect("row");
            assert_eq!(&stored, e);
        }
    }

    #[tokio::test]
    async fn newer_change_overwrites_all_fields() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let id = Uuid::new_v4().to_string();
        repo.upsert_batch(&[event(&id, "Old name", 2)]).await.expect("first");
        repo.upsert_batch(&[event(&id, "New name", 5)]).await.expect("second");

        let stored = repo.get_by_id(&id).await.expect("get").expect("row");
        assert_eq!(stored.name, "New name");
        assert_eq!(stored.changed_at, at(5));
    }

    #[tokio::test]
    async fn older_change_does_not_regress_row() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let id = Uuid::new_v4().to_string();
        repo.upsert_batch(&[event(&id, "Current", 5)]).await.expect("first");
        let written = repo
            .upsert_batch(&[event(&id, "Stale", 3)])
            .await
            .expect("second");
        assert_eq!(written, 0);

        let stored = repo.get_by_id(&id).await.expect("get").expect("row");
        assert_eq!(stored.name, "Current");
        assert_eq!(stored.changed_at, at(5));
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_rows_behind() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let valid = event(&Uuid::new_v4().to_string(), "Valid", 2);
        let rejected = event(&Uuid::new_v4().to_string(), "bad\0name", 2);

        let result = repo.upsert_batch(&[valid.clone(), rejected.clone()]).await;
        assert!(matches!(result, Err(EvsyncError::Database(_))), "got: {result:?}");

        assert!(repo.get_by_id(&valid.id).await.expect("get").is_none());
        assert!(repo.get_by_id(&rejected.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn count_includes_new_rows() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let before = repo.count().await.expect("count");
        repo.upsert_batch(&[
            event(&Uuid::new_v4().to_string(), "A", 2),
            event(&Uuid::new_v4().to_string(), "B", 2),
        ])
        .await
        .expect("upsert");
        assert!(repo.count().await.expect("count") >= before + 2);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let repo = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        assert_eq!(repo.upsert_batch(&[]).await.expect("upsert"), 0);
    }
}
