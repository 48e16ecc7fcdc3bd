//! Query intent, entity, and response shapes (spec §4.6, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Closed set of query intents (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Informational,
    FloatLookup,
    Spatial,
    Temporal,
    ParameterProfile,
    Semantic,
    Hybrid,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Informational => "informational",
            Intent::FloatLookup => "float_lookup",
            Intent::Spatial => "spatial",
            Intent::Temporal => "temporal",
            Intent::ParameterProfile => "parameter_profile",
            Intent::Semantic => "semantic",
            Intent::Hybrid => "hybrid",
        }
    }

    /// Whether this intent should produce a GROUP-BY-depth-band aggregation
    /// rather than raw rows (spec §4.7).
    pub fn is_analytical(&self, entities: &EntityBag) -> bool {
        matches!(self, Intent::Spatial | Intent::Temporal | Intent::ParameterProfile)
            && !entities.parameters.is_empty()
    }

    pub fn is_sql_only(&self) -> bool {
        matches!(
            self,
            Intent::FloatLookup | Intent::Spatial | Intent::Temporal | Intent::ParameterProfile
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Salinity,
    Pressure,
}

impl Parameter {
    pub fn column(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Salinity => "salinity",
            Parameter::Pressure => "pressure",
        }
    }
}

/// Half-open UTC time window `[start, end)` (spec §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Entities extracted from a natural-language query (spec §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EntityBag {
    pub float_ids: Vec<String>,
    pub regions: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub depth_bounds: Option<(f64, f64)>,
    pub time_range: Option<TimeRange>,
    pub institution: Option<String>,
    pub raw_query: String,
}

/// Which relational store a query should execute against (Open Question 1:
/// dev/live are never reconciled, a query always targets exactly one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreSelection {
    Dev,
    Live,
}

/// Incoming `POST /` body (spec §6).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub total_rows: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MapPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MapData {
    pub points: Vec<MapPoint>,
    pub parameter: Option<String>,
    pub region: Option<String>,
}

/// `POST /` response (spec §6).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueryResponse {
    pub status: String,
    pub message: String,
    pub query_type: String,
    pub has_data: bool,
    pub show_map: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_data: Option<MapData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

/// Cache entry keyed by a fingerprint over (normalized query, intent,
/// entities, store) (spec §3, §4.8).
#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    pub sql_text: Option<String>,
    pub table_data: TableData,
    pub map_data: Option<MapData>,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl QueryCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_seconds() >= self.ttl_seconds
    }
}
