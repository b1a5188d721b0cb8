use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use evsync_common::error::{EvsyncError, EvsyncResult};
use evsync_db::sync::models::SyncType;

use crate::trigger::{SyncTrigger, TriggerOutcome};

/// Fires scheduled syncs according to a six-field cron expression (UTC).
pub struct SyncScheduler {
    expression: String,
    schedule: Schedule,
    trigger: Arc<SyncTrigger>,
}

impl SyncScheduler {
    pub fn new(expression: &str, trigger: Arc<SyncTrigger>) -> EvsyncResult<Self> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            EvsyncError::Config(format!("invalid SYNC_CRON expression '{expression}': {e}"))
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
            trigger,
        })
    }

    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Spawn the scheduler loop. Runs until the task is aborted.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(cron = %self.expression, "sync scheduler started");

            loop {
                let now = Utc::now();
                let Some(next) = self.next_fire_after(now) else {
                    tracing::warn!(cron = %self.expression, "schedule has no future runs, stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tracing::debug!(next_run = %next, "waiting for next scheduled sync");
                tokio::time::sleep(wait).await;

                match self.trigger.trigger(SyncType::Scheduled).await {
                    TriggerOutcome::Finished(summary) => {
                        tracing::info!(
                            status = summary.status.as_str(),
                            message = %summary.message,
                            saved = summary.events_saved,
                            "scheduled sync finished"
                        );
                    }
                    TriggerOutcome::AlreadyRunning => {
                        tracing::warn!("previous sync still running; skipping scheduled run");
                    }
                }
            }
        })
    }
}
