use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evsync_db::events::models::Event;

/// An event as returned by the provider (`GET api/events/`).
///
/// Every field is required; timestamps must carry an explicit UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub name: String,
    pub place: serde_json::Map<String, serde_json::Value>,
    pub event_time: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub status: String,
    pub number_of_visitors: i32,
    pub changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

/// Response envelope of the events endpoint.
#[derive(Debug, Deserialize)]
pub struct EventPageResponse {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub next: Option<String>,
}

impl RawEvent {
    /// Decode one entry of `results`, rejecting records with an empty id.
    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        let event: RawEvent = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if event.id.trim().is_empty() {
            return Err("empty id".to_string());
        }
        Ok(event)
    }
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        Event {
            id: raw.id,
            name: raw.name,
            place: serde_json::Value::Object(raw.place),
            event_time: raw.event_time,
            registration_deadline: raw.registration_deadline,
            status: raw.status,
            number_of_visitors: raw.number_of_visitors,
            changed_at: raw.changed_at,
            created_at: raw.created_at,
            status_changed_at: raw.status_changed_at,
        }
    }
}
