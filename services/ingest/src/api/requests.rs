use serde::Deserialize;

pub const DEFAULT_RUNS_LIMIT: i64 = 20;
pub const MAX_RUNS_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

impl RunsQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RUNS_LIMIT)
            .clamp(1, MAX_RUNS_LIMIT)
    }
}
