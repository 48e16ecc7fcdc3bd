//! VectorRecord entity and search filters (spec §3, §4.4).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Filter metadata attached to every indexed profile embedding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VectorMetadata {
    pub float_id: String,
    pub region: Option<String>,
    pub year: i32,
    pub month: i32,
    pub lat_bucket: i32,
    pub lon_bucket: i32,
    pub depth_band: String,
}

/// Equality/range predicates applied to `VectorMetadata` fields during search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VectorFilters {
    pub float_id: Option<String>,
    pub region: Option<String>,
    pub year_range: Option<(i32, i32)>,
    pub month_range: Option<(i32, i32)>,
    pub depth_band: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VectorSearchHit {
    pub vector_id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// A profile about to be (re-)indexed: `vector_id` is always
/// `global_profile_id.to_string()` per spec §4.4.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub vector_id: String,
    pub embedding: Vec<f32>,
    pub metadata: VectorMetadata,
}
