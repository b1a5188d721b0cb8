use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use evsync_common::error::EvsyncError;
use evsync_db::events::models::Event;
use evsync_db::events::repositories::EventRepository;
use evsync_db::sync::models::{RunStatus, SyncOutcome, SyncType};
use evsync_db::sync::repositories::SyncWatermarkRepository;

use crate::provider::{EventSource, PageRequest, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("invalid event: {0}")]
    Parse(String),

    #[error("watermark store failed: {0}")]
    Watermark(#[source] EvsyncError),
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        if matches!(err, ProviderError::InvalidEvent { .. }) {
            Self::Parse(err.to_string())
        } else {
            Self::Fetch(err.to_string())
        }
    }
}

/// Progress of the current run. Only ever reflects pages already merged.
#[derive(Debug, Clone, Copy)]
struct RunProgress {
    current_max: DateTime<Utc>,
    total_saved: u64,
    pages: u32,
}

/// Incremental fetch-merge-advance loop over the provider feed.
///
/// Callers must not run two syncs at once against the same watermark;
/// [`crate::trigger::SyncTrigger`] serializes invocations.
pub struct SyncEngine {
    source: Arc<dyn EventSource>,
    events: Arc<dyn EventRepository>,
    watermarks: Arc<dyn SyncWatermarkRepository>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn EventSource>,
        events: Arc<dyn EventRepository>,
        watermarks: Arc<dyn SyncWatermarkRepository>,
    ) -> Self {
        Self {
            source,
            events,
            watermarks,
        }
    }

    /// Run one sync to a terminal state and record its outcome.
    ///
    /// Fetch, merge and parse failures end the run as [`RunStatus::Failed`]
    /// and are reported through the returned outcome. `Err` is returned only
    /// when the watermark store itself cannot be read or written.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run(&self, sync_type: SyncType) -> Result<SyncOutcome, SyncError> {
        let started_at = Utc::now();
        let watermark = self
            .watermarks
            .get_watermark()
            .await
            .map_err(SyncError::Watermark)?;
        tracing::info!(%watermark, "starting sync from watermark");

        let mut progress = RunProgress {
            current_max: watermark,
            total_saved: 0,
            pages: 0,
        };

        let (status, message) = match self.pull_pages(watermark, &mut progress).await {
            Ok(()) => {
                if progress.current_max > watermark {
                    tracing::info!(last_changed_at = %progress.current_max, "watermark advanced");
                } else {
                    tracing::info!("no new events since last sync");
                }
                (
                    RunStatus::Completed,
                    format!("synced {} events", progress.total_saved),
                )
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    pages = progress.pages,
                    saved = progress.total_saved,
                    "sync aborted"
                );
                (RunStatus::Failed, e.to_string())
            }
        };

        let outcome = SyncOutcome {
            sync_type,
            status,
            message,
            last_changed_at: progress.current_max,
            events_saved: progress.total_saved,
            started_at,
            finished_at: Utc::now(),
        };

        self.watermarks
            .record_outcome(&outcome)
            .await
            .map_err(SyncError::Watermark)?;

        tracing::info!(
            status = outcome.status.as_str(),
            saved = outcome.events_saved,
            pages = progress.pages,
            "sync finished"
        );
        Ok(outcome)
    }

    async fn pull_pages(
        &self,
        watermark: DateTime<Utc>,
        progress: &mut RunProgress,
    ) -> Result<(), SyncError> {
        let mut cursor: Option<String> = None;
        let mut followed: HashSet<String> = HashSet::new();

        loop {
            let request = match cursor.take() {
                Some(c) => PageRequest::Cursor(c),
                None => PageRequest::Since(watermark),
            };

            let page = self.source.fetch_page(&request).await?;
            progress.pages += 1;

            if page.events.is_empty() {
                tracing::debug!(page = progress.pages, "empty page, stopping");
                break;
            }

            let batch_max = page.events.iter().map(|e| e.changed_at).max();
            let events: Vec<Event> = page.events.into_iter().map(Event::from).collect();

            self.events
                .upsert_batch(&events)
                .await
                .map_err(|e| SyncError::Merge(e.to_string()))?;
            progress.total_saved += events.len() as u64;

            if let Some(batch_max) = batch_max {
                progress.current_max = progress.current_max.max(batch_max);
            }

            tracing::info!(
                page = progress.pages,
                count = events.len(),
                total = progress.total_saved,
                "merged page"
            );

            match page.next_cursor {
                Some(next) => {
                    if let PageRequest::Cursor(previous) = request {
                        followed.insert(previous);
                    }
                    if followed.contains(&next) {
                        return Err(SyncError::Fetch(format!(
                            "provider returned an already followed cursor: {next}"
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        Ok(())
    }
}
