//! Retrieval executor (C8, spec §4.8). Dispatches SQL-only, vector-only, or
//! hybrid intents and caches canonicalized results by query fingerprint.

use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::{QueryConfig, VectorConfig};
use crate::error::QueryError;
use crate::models::{
    EntityBag, Intent, MapData, MapPoint, QueryCacheEntry, StoreSelection, TableData, VectorFilters,
};
use crate::query::gazetteer::Gazetteer;
use crate::query::synthesizer;
use crate::store::relational::RelationalStore;
use crate::vector::{Embedder, VectorIndex};

pub struct QueryExecutor {
    store: Arc<RelationalStore>,
    vector_index: Option<Arc<VectorIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    gazetteer: Gazetteer,
    query_config: QueryConfig,
    vector_config: VectorConfig,
    cache: DashMap<String, QueryCacheEntry>,
    insertion_order: std::sync::Mutex<Vec<String>>,
}

pub struct ExecutionOutcome {
    pub table_data: Option<TableData>,
    pub map_data: Option<MapData>,
    pub sql_text: Option<String>,
    pub from_cache: bool,
}

impl QueryExecutor {
    pub fn new(
        store: Arc<RelationalStore>,
        vector_index: Option<Arc<VectorIndex>>,
        embedder: Option<Arc<dyn Embedder>>,
        gazetteer: Gazetteer,
        query_config: QueryConfig,
        vector_config: VectorConfig,
    ) -> Self {
        Self {
            store,
            vector_index,
            embedder,
            gazetteer,
            query_config,
            vector_config,
            cache: DashMap::new(),
            insertion_order: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn execute(
        &self,
        intent: Intent,
        entities: &EntityBag,
        store_selection: StoreSelection,
    ) -> Result<ExecutionOutcome, QueryError> {
        let fingerprint = fingerprint_for(&entities.raw_query, intent, entities, store_selection);

        if let Some(entry) = self.cache.get(&fingerprint) {
            if !entry.is_expired(Utc::now()) {
                return Ok(ExecutionOutcome {
                    table_data: Some(entry.table_data.clone()),
                    map_data: entry.map_data.clone(),
                    sql_text: entry.sql_text.clone(),
                    from_cache: true,
                });
            }
        }

        let outcome = match intent {
            Intent::Informational => {
                ExecutionOutcome { table_data: None, map_data: None, sql_text: None, from_cache: false }
            },
            Intent::Semantic => self.execute_vector(entities).await?,
            Intent::Hybrid => self.execute_hybrid(intent, entities).await?,
            _ => self.execute_sql(intent, entities, None).await?,
        };

        if let Some(table_data) = &outcome.table_data {
            self.insert_cache_entry(
                fingerprint,
                QueryCacheEntry {
                    sql_text: outcome.sql_text.clone(),
                    table_data: table_data.clone(),
                    map_data: outcome.map_data.clone(),
                    created_at: Utc::now(),
                    ttl_seconds: self.query_config.cache_ttl_s as i64,
                },
            );
        }

        Ok(outcome)
    }

    async fn execute_sql(
        &self,
        intent: Intent,
        entities: &EntityBag,
        refine_ids: Option<&[i64]>,
    ) -> Result<ExecutionOutcome, QueryError> {
        let synthesized = synthesizer::synthesize(intent, entities, &self.query_config, &self.gazetteer, refine_ids);

        let (columns, rows) = self.store.query(&synthesized.sql, &synthesized.params).await?;
        let rows = rows.into_iter().map(canonicalize_row).collect::<Vec<_>>();
        let total_rows = rows.len() as i64;

        let map_data = build_map_data(&rows, entities);

        Ok(ExecutionOutcome {
            table_data: Some(TableData { columns, rows, total_rows }),
            map_data,
            sql_text: Some(synthesized.sql),
            from_cache: false,
        })
    }

    async fn execute_vector(&self, entities: &EntityBag) -> Result<ExecutionOutcome, QueryError> {
        let hits = self.vector_search(entities).await?;

        let rows: Vec<serde_json::Value> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "vector_id": hit.vector_id,
                    "score": hit.score,
                    "float_id": hit.metadata.float_id,
                    "region": hit.metadata.region,
                    "depth_band": hit.metadata.depth_band,
                })
            })
            .collect();

        let total_rows = rows.len() as i64;
        Ok(ExecutionOutcome {
            table_data: Some(TableData {
                columns: vec![
                    "vector_id".into(),
                    "score".into(),
                    "float_id".into(),
                    "region".into(),
                    "depth_band".into(),
                ],
                rows,
                total_rows,
            }),
            map_data: None,
            sql_text: None,
            from_cache: false,
        })
    }

    /// Vector search yields candidate IDs, then SQL refines with precise
    /// spatial/temporal filters (spec §4.8).
    async fn execute_hybrid(&self, intent: Intent, entities: &EntityBag) -> Result<ExecutionOutcome, QueryError> {
        let hits = self.vector_search(entities).await?;
        let candidate_ids: Vec<i64> =
            hits.iter().filter_map(|h| h.vector_id.parse().ok()).collect();

        self.execute_sql(intent, entities, Some(&candidate_ids)).await
    }

    async fn vector_search(
        &self,
        entities: &EntityBag,
    ) -> Result<Vec<crate::models::VectorSearchHit>, QueryError> {
        let index = self.vector_index.as_ref().ok_or_else(|| {
            QueryError::RejectedSql("vector search unavailable: no index configured".to_string())
        })?;
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            QueryError::RejectedSql("vector search unavailable: no embedder configured".to_string())
        })?;

        let embedding = embedder.embed(&entities.raw_query).await?;
        let filters = VectorFilters {
            float_id: entities.float_ids.first().cloned(),
            region: entities.regions.first().cloned(),
            year_range: None,
            month_range: None,
            depth_band: None,
        };

        Ok(index.search(embedding, self.vector_config.top_k_default, &filters).await?)
    }

    fn insert_cache_entry(&self, fingerprint: String, entry: QueryCacheEntry) {
        self.cache.insert(fingerprint.clone(), entry);
        let mut order = self.insertion_order.lock().unwrap();
        order.push(fingerprint);
        while order.len() > self.query_config.cache_max_entries {
            let evict = order.remove(0);
            self.cache.remove(&evict);
        }
    }
}

fn fingerprint_for(raw_query: &str, intent: Intent, entities: &EntityBag, store: StoreSelection) -> String {
    let normalized = raw_query.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(intent.as_str().as_bytes());
    hasher.update(format!("{:?}", entities.regions).as_bytes());
    hasher.update(format!("{:?}", entities.float_ids).as_bytes());
    hasher.update(format!("{:?}", entities.parameters).as_bytes());
    hasher.update(format!("{store:?}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable column order, 6-significant-digit display precision for floats
/// with the raw value preserved alongside it, stable null representation
/// (spec §4.8). Float columns become `{"display": .., "raw": ..}`; every
/// other value passes through unchanged.
fn canonicalize_row(row: serde_json::Value) -> serde_json::Value {
    match row {
        serde_json::Value::Object(map) => {
            let canonicalized = map
                .into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        serde_json::Value::Number(n) if n.is_f64() => {
                            let raw = n.as_f64().unwrap();
                            let display = round_to_significant_digits(raw, 6);
                            serde_json::json!({ "display": display, "raw": raw })
                        },
                        other => other,
                    };
                    (k, v)
                })
                .collect();
            serde_json::Value::Object(canonicalized)
        },
        other => other,
    }
}

/// Reads a canonicalized numeric field, preferring the display value;
/// falls back to a plain number for columns `canonicalize_row` left alone.
pub(crate) fn display_value(row: &serde_json::Value, key: &str) -> Option<f64> {
    let value = row.get(key)?;
    value.get("display").and_then(serde_json::Value::as_f64).or_else(|| value.as_f64())
}

fn round_to_significant_digits(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - 1 - magnitude);
    (value * factor).round() / factor
}

fn build_map_data(rows: &[serde_json::Value], entities: &EntityBag) -> Option<MapData> {
    let points: Vec<MapPoint> = rows
        .iter()
        .filter_map(|row| {
            let lat = display_value(row, "latitude")?;
            let lng = display_value(row, "longitude")?;
            Some(MapPoint { lat, lng, extra: serde_json::Map::new() })
        })
        .collect();

    if points.is_empty() {
        return None;
    }

    Some(MapData {
        points,
        parameter: entities.parameters.first().map(|p| p.column().to_string()),
        region: entities.regions.first().cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_preserves_six_significant_digits() {
        assert_eq!(round_to_significant_digits(28.123456789, 6), 28.1235);
        assert_eq!(round_to_significant_digits(0.0001234567, 6), 0.000123457);
    }

    #[test]
    fn fingerprint_is_stable_for_equal_inputs() {
        let entities = EntityBag { raw_query: "Show me the Arabian Sea".to_string(), ..Default::default() };
        let a = fingerprint_for(&entities.raw_query, Intent::Spatial, &entities, StoreSelection::Dev);
        let b = fingerprint_for(&entities.raw_query, Intent::Spatial, &entities, StoreSelection::Dev);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_across_stores() {
        let entities = EntityBag { raw_query: "Show me the Arabian Sea".to_string(), ..Default::default() };
        let a = fingerprint_for(&entities.raw_query, Intent::Spatial, &entities, StoreSelection::Dev);
        let b = fingerprint_for(&entities.raw_query, Intent::Spatial, &entities, StoreSelection::Live);
        assert_ne!(a, b);
    }
}
