use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider event as stored locally. `id` is the merge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub place: serde_json::Value,
    pub event_time: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub status: String,
    pub number_of_visitors: i32,
    pub changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}
