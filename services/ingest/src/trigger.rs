use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use evsync_db::sync::models::{RunStatus, SyncOutcome, SyncType};

use crate::engine::SyncEngine;

/// Terminal summary handed back to whoever asked for the run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub status: RunStatus,
    pub message: String,
    pub sync_type: SyncType,
    pub last_changed_at: Option<DateTime<Utc>>,
    pub events_saved: u64,
}

impl From<SyncOutcome> for SyncSummary {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            status: outcome.status,
            message: outcome.message,
            sync_type: outcome.sync_type,
            last_changed_at: Some(outcome.last_changed_at),
            events_saved: outcome.events_saved,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Finished(SyncSummary),
    AlreadyRunning,
}

/// Clears the running flag when a run ends or its future is dropped.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single-flight entry point shared by the HTTP route and the scheduler.
pub struct SyncTrigger {
    engine: SyncEngine,
    in_flight: Mutex<()>,
    running: AtomicBool,
}

impl SyncTrigger {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            in_flight: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    /// Run a sync unless one is already in progress.
    pub async fn trigger(&self, sync_type: SyncType) -> TriggerOutcome {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(%sync_type, "sync already running, skipping");
                return TriggerOutcome::AlreadyRunning;
            }
        };
        let _running = RunningFlag::raise(&self.running);

        let summary = match self.engine.run(sync_type).await {
            Ok(outcome) => SyncSummary::from(outcome),
            Err(e) => {
                tracing::error!(error = %e, %sync_type, "sync could not be recorded");
                SyncSummary {
                    status: RunStatus::Failed,
                    message: e.to_string(),
                    sync_type,
                    last_changed_at: None,
                    events_saved: 0,
                }
            }
        };

        TriggerOutcome::Finished(summary)
    }

    /// Reads the flag without touching the single-flight lock.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
