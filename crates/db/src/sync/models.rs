use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Watermark key for the provider event feed.
pub const EVENTS_SOURCE: &str = "events";

/// Lower bound used before anything has ever been synced.
pub fn sentinel_watermark() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// What started a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Manual,
    Scheduled,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(format!("unknown sync type: {value}")),
        }
    }
}

/// Terminal state of a single run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    #[serde(rename = "success")]
    Completed,
    #[serde(rename = "error")]
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "success",
            Self::Failed => "error",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Completed),
            "error" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {value}")),
        }
    }
}

/// Last known outcome stored on the watermark row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Never,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl From<RunStatus> for SyncStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => Self::Success,
            RunStatus::Failed => Self::Error,
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "never" => Ok(Self::Never),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown sync status: {value}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
    pub source: String,
    pub last_changed_at: DateTime<Utc>,
    pub last_status: SyncStatus,
    pub last_message: String,
    pub last_sync_type: Option<SyncType>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a run, handed to the watermark store once the run is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub sync_type: SyncType,
    pub status: RunStatus,
    pub message: String,
    pub last_changed_at: DateTime<Utc>,
    pub events_saved: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Append-only audit row, one per recorded outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub source: String,
    pub sync_type: SyncType,
    pub status: RunStatus,
    pub message: String,
    pub last_changed_at: DateTime<Utc>,
    pub events_saved: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
