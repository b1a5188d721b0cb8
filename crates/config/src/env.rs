use evsync_common::error::{EvsyncError, EvsyncResult};
use serde::Deserialize;
use std::env;

/// Daily at 02:00 UTC (sec min hour day-of-month month day-of-week).
pub const DEFAULT_SYNC_CRON: &str = "0 0 2 * * *";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// `None` when scheduled syncs are disabled (`SYNC_CRON=""`).
    pub sync_cron: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> EvsyncResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let sync_cron = get_var_or("SYNC_CRON", DEFAULT_SYNC_CRON);
        let sync_cron = if sync_cron.trim().is_empty() {
            None
        } else {
            Some(sync_cron.trim().to_owned())
        };

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_var_or("PORT", "8000")
                .parse()
                .map_err(|e| EvsyncError::Config(format!("invalid PORT: {e}")))?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            sync_cron,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn get_var(key: &str) -> EvsyncResult<String> {
    env::var(key).map_err(|_| EvsyncError::Config(format!("{key} is required but not set")))
}

pub fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
