//! Profile and Measurement entities (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One vertical cast by one float at one time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Profile {
    pub global_profile_id: i64,
    pub float_id: String,
    pub cycle_number: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<DateTime<Utc>>,
    pub measurement_count: i64,
    pub source_file_fingerprint: String,
}

/// One sample at one depth level of one profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Measurement {
    pub global_profile_id: i64,
    pub level: i64,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    /// Per-level quality flag preserved from the source file (Open Question 2,
    /// see DESIGN.md): never used to drop levels at parse time.
    pub quality_flag: Option<i16>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<DateTime<Utc>>,
}

/// Outcome of a single `upsert_profile` call (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { global_profile_id: i64 },
    SkippedDuplicate { global_profile_id: i64 },
}

impl UpsertOutcome {
    pub fn global_profile_id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted { global_profile_id }
            | UpsertOutcome::SkippedDuplicate { global_profile_id } => *global_profile_id,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted { .. })
    }
}

/// A single parsed profile plus its ordered level measurements (C2 output).
#[derive(Debug, Clone)]
pub struct ParsedProfile {
    pub float_id: String,
    pub cycle_number: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<DateTime<Utc>>,
    pub measurements: Vec<ParsedMeasurement>,
}

#[derive(Debug, Clone)]
pub struct ParsedMeasurement {
    pub level: i64,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    pub quality_flag: Option<i16>,
}

/// Row returned by a radius/bbox float search, shaped per spec §6.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FloatRadiusRow {
    pub float_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
    pub datetime: Option<DateTime<Utc>>,
    pub cycle_number: i64,
    pub measurement_count: i64,
    pub global_profile_id: i64,
}

/// One point of a float trajectory (spec §6, `/floats/trajectories/radius`).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrajectoryPoint {
    #[serde(rename = "floatId")]
    pub float_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub datetime: Option<DateTime<Utc>>,
    pub cycle_number: i64,
    pub global_profile_id: i64,
}

/// Full detail for a single float, windowed by depth (spec §6).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FloatDetail {
    pub profile: Profile,
    pub measurements: Vec<Measurement>,
}
