//! In-memory collaborators shared by the engine, trigger and router tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use evsync_common::error::{EvsyncError, EvsyncResult};
use evsync_db::events::models::Event;
use evsync_db::events::repositories::EventRepository;
use evsync_db::sync::models::{
    sentinel_watermark, SyncOutcome, SyncRun, SyncStatus, Watermark, EVENTS_SOURCE,
};
use evsync_db::sync::repositories::SyncWatermarkRepository;

use crate::provider::models::RawEvent;
use crate::provider::{EventSource, Page, PageRequest, ProviderError};

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

pub fn raw_event(id: &str, name: &str, changed_at: DateTime<Utc>) -> RawEvent {
    let mut place = serde_json::Map::new();
    place.insert("id".to_string(), serde_json::json!("place-1"));
    RawEvent {
        id: id.to_string(),
        name: name.to_string(),
        place,
        event_time: day(20),
        registration_deadline: day(19),
        status: "new".to_string(),
        number_of_visitors: 0,
        changed_at,
        created_at: day(1),
        status_changed_at: day(1),
    }
}

pub fn page(events: Vec<RawEvent>, next_cursor: Option<&str>) -> Page {
    Page {
        events,
        next_cursor: next_cursor.map(str::to_string),
    }
}

/// Replays a fixed sequence of responses and records every request.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    responses: Arc<Mutex<VecDeque<Result<Page, ProviderError>>>>,
    requests: Arc<Mutex<Vec<PageRequest>>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Page, ProviderError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }
}

/// Event store keyed by id with the same newest-wins rule as Postgres.
#[derive(Clone, Default)]
pub struct MemoryEventRepo {
    rows: Arc<Mutex<HashMap<String, Event>>>,
    fail_on_call: Arc<Mutex<Option<usize>>>,
    calls: Arc<Mutex<usize>>,
}

impl MemoryEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the n-th (1-based) `upsert_batch` call fail without applying anything.
    pub fn failing_on_call(n: usize) -> Self {
        let repo = Self::default();
        *repo.fail_on_call.lock().unwrap() = Some(n);
        repo
    }

    pub fn snapshot(&self) -> HashMap<String, Event> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepo {
    async fn upsert_batch(&self, events: &[Event]) -> EvsyncResult<u64> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if *self.fail_on_call.lock().unwrap() == Some(call) {
            return Err(EvsyncError::Database("connection reset".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let mut written = 0;
        for event in events {
            let stale = rows
                .get(&event.id)
                .is_some_and(|existing| existing.changed_at > event.changed_at);
            if !stale {
                rows.insert(event.id.clone(), event.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn get_by_id(&self, id: &str) -> EvsyncResult<Option<Event>> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn count(&self) -> EvsyncResult<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

/// Watermark store that keeps the monotonic rule of the Postgres repository.
#[derive(Clone, Default)]
pub struct MemoryWatermarkRepo {
    state: Arc<Mutex<Option<Watermark>>>,
    runs: Arc<Mutex<Vec<SyncRun>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryWatermarkRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(watermark: DateTime<Utc>) -> Self {
        let repo = Self::default();
        *repo.state.lock().unwrap() = Some(Watermark {
            source: EVENTS_SOURCE.to_string(),
            last_changed_at: watermark,
            last_status: SyncStatus::Success,
            last_message: String::new(),
            last_sync_type: None,
            updated_at: Utc::now(),
        });
        repo
    }

    pub fn unavailable() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    /// Readable at `watermark`, but every `record_outcome` fails.
    pub fn failing_writes(watermark: DateTime<Utc>) -> Self {
        Self {
            fail_writes: true,
            ..Self::at(watermark)
        }
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<Watermark> {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncWatermarkRepository for MemoryWatermarkRepo {
    async fn ensure_watermark(&self) -> EvsyncResult<Watermark> {
        let mut state = self.state.lock().unwrap();
        let wm = state.get_or_insert_with(|| Watermark {
            source: EVENTS_SOURCE.to_string(),
            last_changed_at: sentinel_watermark(),
            last_status: SyncStatus::Never,
            last_message: String::new(),
            last_sync_type: None,
            updated_at: Utc::now(),
        });
        Ok(wm.clone())
    }

    async fn get_watermark(&self) -> EvsyncResult<DateTime<Utc>> {
        if self.fail_reads {
            return Err(EvsyncError::Database("pool timed out".to_string()));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .as_ref()
            .map(|wm| wm.last_changed_at)
            .unwrap_or_else(sentinel_watermark))
    }

    async fn get_state(&self) -> EvsyncResult<Option<Watermark>> {
        if self.fail_reads {
            return Err(EvsyncError::Database("pool timed out".to_string()));
        }
        Ok(self.current())
    }

    async fn record_outcome(&self, outcome: &SyncOutcome) -> EvsyncResult<SyncRun> {
        if self.fail_writes {
            return Err(EvsyncError::Database("connection closed".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let previous = state
            .as_ref()
            .map(|wm| wm.last_changed_at)
            .unwrap_or_else(sentinel_watermark);
        *state = Some(Watermark {
            source: EVENTS_SOURCE.to_string(),
            last_changed_at: previous.max(outcome.last_changed_at),
            last_status: SyncStatus::from(outcome.status),
            last_message: outcome.message.clone(),
            last_sync_type: Some(outcome.sync_type),
            updated_at: outcome.finished_at,
        });

        let run = SyncRun {
            id: Uuid::new_v4(),
            source: EVENTS_SOURCE.to_string(),
            sync_type: outcome.sync_type,
            status: outcome.status,
            message: outcome.message.clone(),
            last_changed_at: outcome.last_changed_at,
            events_saved: outcome.events_saved as i64,
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
        };
        self.runs.lock().unwrap().push(run.clone());
        Ok(run)
    }

    async fn list_runs(&self, limit: i64) -> EvsyncResult<Vec<SyncRun>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}
