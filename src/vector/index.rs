//! Vector index (C4, spec §4.4) over Qdrant, a standalone vector database
//! reached via the `qdrant-client` crate.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, Range, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;

use crate::config::VectorConfig;
use crate::error::VectorError;
use crate::models::{VectorFilters, VectorMetadata, VectorRecord, VectorSearchHit};

pub struct VectorIndex {
    client: Qdrant,
    collection_name: String,
}

impl VectorIndex {
    pub fn connect(config: &VectorConfig) -> Result<Self, VectorError> {
        let client = Qdrant::from_url(&config.qdrant_url).build()?;
        Ok(Self { client, collection_name: config.collection_name.clone() })
    }

    pub async fn ensure_collection(&self, embedding_dim: u64) -> Result<(), VectorError> {
        if self.client.collection_exists(&self.collection_name).await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(VectorParamsBuilder::new(embedding_dim, Distance::Cosine)),
            )
            .await?;
        tracing::info!(collection = %self.collection_name, "created vector collection");
        Ok(())
    }

    /// Upsert by `vector_id = str(global_profile_id)` (spec §4.4).
    pub async fn index(&self, record: VectorRecord) -> Result<(), VectorError> {
        let id: u64 = record
            .vector_id
            .parse()
            .map_err(|_| VectorError::DimensionMismatch { expected: 0, got: 0 })?;

        let payload = metadata_to_payload(&record.metadata, &record.vector_id);
        let point = PointStruct::new(id, record.embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, vec![point]))
            .await?;
        Ok(())
    }

    pub async fn search(
        &self,
        query_embedding: Vec<f32>,
        k: u64,
        filters: &VectorFilters,
    ) -> Result<Vec<VectorSearchHit>, VectorError> {
        let mut search = SearchPointsBuilder::new(&self.collection_name, query_embedding, k)
            .with_payload(true);

        if let Some(filter) = build_filter(filters) {
            search = search.filter(filter);
        }

        let response = self.client.search_points(search).await?;

        Ok(response
            .result
            .into_iter()
            .map(|point| VectorSearchHit {
                vector_id: point
                    .payload
                    .get("vector_id")
                    .and_then(|v| v.as_str().map(|s| s.to_string()))
                    .unwrap_or_default(),
                score: point.score,
                metadata: payload_to_metadata(&point.payload),
            })
            .collect())
    }
}

fn metadata_to_payload(metadata: &VectorMetadata, vector_id: &str) -> HashMap<String, qdrant_client::qdrant::Value> {
    let mut payload = HashMap::new();
    payload.insert("vector_id".to_string(), vector_id.into());
    payload.insert("float_id".to_string(), metadata.float_id.clone().into());
    payload.insert("region".to_string(), metadata.region.clone().unwrap_or_default().into());
    payload.insert("year".to_string(), (metadata.year as i64).into());
    payload.insert("month".to_string(), (metadata.month as i64).into());
    payload.insert("lat_bucket".to_string(), (metadata.lat_bucket as i64).into());
    payload.insert("lon_bucket".to_string(), (metadata.lon_bucket as i64).into());
    payload.insert("depth_band".to_string(), metadata.depth_band.clone().into());
    payload
}

fn payload_to_metadata(payload: &HashMap<String, qdrant_client::qdrant::Value>) -> VectorMetadata {
    VectorMetadata {
        float_id: payload.get("float_id").and_then(|v| v.as_str().map(String::from)).unwrap_or_default(),
        region: payload.get("region").and_then(|v| v.as_str().map(String::from)).filter(|s| !s.is_empty()),
        year: payload.get("year").and_then(|v| v.as_integer()).unwrap_or_default() as i32,
        month: payload.get("month").and_then(|v| v.as_integer()).unwrap_or_default() as i32,
        lat_bucket: payload.get("lat_bucket").and_then(|v| v.as_integer()).unwrap_or_default() as i32,
        lon_bucket: payload.get("lon_bucket").and_then(|v| v.as_integer()).unwrap_or_default() as i32,
        depth_band: payload.get("depth_band").and_then(|v| v.as_str().map(String::from)).unwrap_or_default(),
    }
}

/// Translate equality/range predicates into Qdrant `must` conditions (spec §4.4).
fn build_filter(filters: &VectorFilters) -> Option<Filter> {
    let mut must = Vec::new();

    if let Some(float_id) = &filters.float_id {
        must.push(Condition::matches("float_id", float_id.clone()));
    }
    if let Some(region) = &filters.region {
        must.push(Condition::matches("region", region.clone()));
    }
    if let Some(depth_band) = &filters.depth_band {
        must.push(Condition::matches("depth_band", depth_band.clone()));
    }
    if let Some((lo, hi)) = filters.year_range {
        must.push(Condition::range(
            "year",
            Range { gte: Some(lo as f64), lte: Some(hi as f64), ..Default::default() },
        ));
    }
    if let Some((lo, hi)) = filters.month_range {
        must.push(Condition::range(
            "month",
            Range { gte: Some(lo as f64), lte: Some(hi as f64), ..Default::default() },
        ));
    }

    if must.is_empty() { None } else { Some(Filter::must(must)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filters_produces_no_filter() {
        assert!(build_filter(&VectorFilters::default()).is_none());
    }

    #[test]
    fn float_id_filter_produces_a_must_condition() {
        let filters = VectorFilters { float_id: Some("1902482".to_string()), ..Default::default() };
        assert!(build_filter(&filters).is_some());
    }
}
