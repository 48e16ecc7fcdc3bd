//! SQL synthesizer (C7, spec §4.7). Fixed templates only; all user input
//! travels as bound parameters, never interpolated into the SQL text
//! (testable property 5).

use crate::config::QueryConfig;
use crate::models::{EntityBag, Intent, Parameter};
use crate::query::gazetteer::Gazetteer;
use crate::store::relational::SqlParam;

pub struct SynthesizedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub is_analytical: bool,
}

/// Translate intent + entities + store selection into one parameterized
/// SELECT. Global-profile-id refinement (`refine_ids`) is used by the
/// hybrid path (spec §4.8): vector search first, then SQL refines.
pub fn synthesize(
    intent: Intent,
    entities: &EntityBag,
    config: &QueryConfig,
    gazetteer: &Gazetteer,
    refine_ids: Option<&[i64]>,
) -> SynthesizedQuery {
    if intent.is_analytical(entities) {
        synthesize_analytical(entities, config, gazetteer, refine_ids)
    } else {
        synthesize_raw(intent, entities, config, gazetteer, refine_ids)
    }
}

fn synthesize_analytical(
    entities: &EntityBag,
    config: &QueryConfig,
    gazetteer: &Gazetteer,
    refine_ids: Option<&[i64]>,
) -> SynthesizedQuery {
    let parameter = entities.parameters.first().copied().unwrap_or(Parameter::Temperature);
    let column = parameter.column();
    let bin_width = config.depth_bin_width_m;

    let mut where_clauses = vec!["p.latitude IS NOT NULL".to_string(), "p.longitude IS NOT NULL".to_string()];
    let mut params = Vec::new();

    apply_spatial_predicate(entities, gazetteer, &mut where_clauses, &mut params);
    apply_temporal_predicate(entities, &mut where_clauses, &mut params);
    apply_float_id_predicate(entities, &mut where_clauses, &mut params);
    apply_refine_predicate(refine_ids, &mut where_clauses, &mut params);
    apply_depth_predicate(config, &mut where_clauses, &mut params);

    let where_sql = where_clauses.join(" AND ");

    // No LIMIT on analytical queries (spec §4.7): bands are bounded by the
    // depth domain, not by row count.
    let sql = format!(
        "SELECT (CAST(m.pressure / ? AS INTEGER) * ?) AS depth_range, \
                AVG(m.{column}) AS avg_{column}, MIN(m.{column}) AS min_{column}, \
                MAX(m.{column}) AS max_{column}, COUNT(*) AS measurement_count \
         FROM argo_measurements m \
         JOIN argo_profiles p ON p.global_profile_id = m.global_profile_id \
         WHERE {where_sql} AND m.{column} IS NOT NULL AND m.pressure IS NOT NULL \
         GROUP BY depth_range ORDER BY depth_range ASC"
    );

    let mut full_params = vec![SqlParam::Float(bin_width), SqlParam::Float(bin_width)];
    full_params.extend(params);

    SynthesizedQuery { sql, params: full_params, is_analytical: true }
}

fn synthesize_raw(
    intent: Intent,
    entities: &EntityBag,
    config: &QueryConfig,
    gazetteer: &Gazetteer,
    refine_ids: Option<&[i64]>,
) -> SynthesizedQuery {
    let mut where_clauses = Vec::new();
    let mut params = Vec::new();

    match intent {
        Intent::FloatLookup => apply_float_id_predicate(entities, &mut where_clauses, &mut params),
        Intent::Spatial => apply_spatial_predicate(entities, gazetteer, &mut where_clauses, &mut params),
        Intent::Temporal => apply_temporal_predicate(entities, &mut where_clauses, &mut params),
        _ => {},
    }
    apply_refine_predicate(refine_ids, &mut where_clauses, &mut params);

    let where_sql = if where_clauses.is_empty() { "1 = 1".to_string() } else { where_clauses.join(" AND ") };

    // Point-lookup form: raw rows with a safety LIMIT (spec §4.7).
    let sql = format!(
        "SELECT global_profile_id, float_id, cycle_number, latitude, longitude, datetime, \
                measurement_count, source_file_fingerprint \
         FROM argo_profiles p WHERE {where_sql} ORDER BY datetime DESC LIMIT ?"
    );
    params.push(SqlParam::Int(config.row_cap));

    SynthesizedQuery { sql, params, is_analytical: false }
}

fn apply_spatial_predicate(
    entities: &EntityBag,
    gazetteer: &Gazetteer,
    where_clauses: &mut Vec<String>,
    params: &mut Vec<SqlParam>,
) {
    let Some(region_name) = entities.regions.first() else { return };
    let Some(bbox) = gazetteer.lookup(region_name) else { return };

    where_clauses.push("p.latitude BETWEEN ? AND ? AND p.longitude BETWEEN ? AND ?".to_string());
    params.push(SqlParam::Float(bbox.lat_min));
    params.push(SqlParam::Float(bbox.lat_max));
    params.push(SqlParam::Float(bbox.lon_min));
    params.push(SqlParam::Float(bbox.lon_max));
}

fn apply_temporal_predicate(entities: &EntityBag, where_clauses: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    let Some(range) = entities.time_range else { return };
    // Half-open [start, end) (spec §4.7).
    where_clauses.push("p.datetime >= ? AND p.datetime < ?".to_string());
    params.push(SqlParam::Text(range.start.to_rfc3339()));
    params.push(SqlParam::Text(range.end.to_rfc3339()));
}

fn apply_float_id_predicate(entities: &EntityBag, where_clauses: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    let Some(float_id) = entities.float_ids.first() else { return };
    where_clauses.push("p.float_id = ?".to_string());
    params.push(SqlParam::Text(float_id.clone()));
}

/// Bounds depth-binned aggregation to the configured maximum depth
/// (spec §6 query parameters).
fn apply_depth_predicate(config: &QueryConfig, where_clauses: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    where_clauses.push("m.pressure <= ?".to_string());
    params.push(SqlParam::Float(config.max_depth_m));
}

fn apply_refine_predicate(refine_ids: Option<&[i64]>, where_clauses: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    let Some(ids) = refine_ids else { return };
    if ids.is_empty() {
        where_clauses.push("1 = 0".to_string());
        return;
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    where_clauses.push(format!("p.global_profile_id IN ({placeholders})"));
    for id in ids {
        params.push(SqlParam::Int(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeRange;
    use chrono::{TimeZone, Utc};

    fn test_config() -> QueryConfig {
        QueryConfig {
            row_cap: 500,
            sql_timeout_s: 10,
            cache_ttl_s: 300,
            cache_max_entries: 1000,
            depth_bin_width_m: 50.0,
            max_depth_m: 2000.0,
        }
    }

    #[test]
    fn raw_query_carries_no_user_text_in_sql() {
        let gazetteer = Gazetteer::default();
        let entities = EntityBag { float_ids: vec!["1902482".to_string()], ..Default::default() };
        let synthesized = synthesize(Intent::FloatLookup, &entities, &test_config(), &gazetteer, None);
        assert!(!synthesized.sql.contains("1902482"));
        assert!(synthesized.sql.contains("LIMIT ?"));
    }

    #[test]
    fn analytical_query_has_no_limit_and_groups_by_depth() {
        let gazetteer = Gazetteer::default();
        let entities = EntityBag {
            regions: vec!["arabian sea".to_string()],
            parameters: vec![Parameter::Temperature],
            ..Default::default()
        };
        let synthesized = synthesize(Intent::Spatial, &entities, &test_config(), &gazetteer, None);
        assert!(synthesized.is_analytical);
        assert!(synthesized.sql.contains("GROUP BY"));
        assert!(!synthesized.sql.to_uppercase().contains("LIMIT"));
    }

    #[test]
    fn temporal_predicate_is_half_open() {
        let gazetteer = Gazetteer::default();
        let entities = EntityBag {
            time_range: Some(TimeRange {
                start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            }),
            ..Default::default()
        };
        let synthesized = synthesize(Intent::Temporal, &entities, &test_config(), &gazetteer, None);
        assert!(synthesized.sql.contains(">= ? AND p.datetime < ?"));
    }

    #[test]
    fn refine_with_empty_ids_returns_no_rows() {
        let gazetteer = Gazetteer::default();
        let entities = EntityBag::default();
        let synthesized = synthesize(Intent::Semantic, &entities, &test_config(), &gazetteer, Some(&[]));
        assert!(synthesized.sql.contains("1 = 0"));
    }
}
