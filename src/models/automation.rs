//! AutomationRun entity (spec §3): one attempted ingestion tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Started => "started",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(RunStatus::Started),
            "completed" => Ok(RunStatus::Completed),
            "error" => Ok(RunStatus::Error),
            other => anyhow::bail!("unknown automation run status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AutomationRun {
    pub run_timestamp: DateTime<Utc>,
    pub status: String,
    pub files_discovered: i64,
    pub files_downloaded: i64,
    pub profiles_added: i64,
    pub measurements_added: i64,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
}

/// Mutable accumulator used while a tick is in progress (§4.5).
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub files_discovered: i64,
    pub files_downloaded: i64,
    pub profiles_added: i64,
    pub measurements_added: i64,
    pub skipped_duplicates: i64,
    pub soft_errors: i64,
    pub consecutive_write_faults: i64,
}
