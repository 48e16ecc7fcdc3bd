//! Relational store (C3, spec §4.3). One schema, two independent SQLite
//! files ("dev", "live"), opened through `sqlx::SqlitePool`.

use chrono::{DateTime, Utc};
use sqlx::{Column, Row, SqlitePool};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{FloatDetail, FloatRadiusRow, Measurement, Profile, TrajectoryPoint, UpsertOutcome};
use crate::store::id_allocator::IdAllocator;
use crate::utils::haversine::{bounding_box_for_radius, distance_km};

/// Identifiers a synthesized or hand-written `query()` call may reference.
/// Anything outside this set is rejected before the statement is bound.
const WHITELISTED_IDENTIFIERS: &[&str] = &[
    "argo_profiles",
    "argo_measurements",
    "automation_log",
    "global_profile_id",
    "float_id",
    "cycle_number",
    "latitude",
    "longitude",
    "datetime",
    "measurement_count",
    "source_file_fingerprint",
    "level",
    "pressure",
    "temperature",
    "salinity",
    "quality_flag",
    "run_timestamp",
    "status",
    "files_discovered",
    "files_downloaded",
    "profiles_added",
    "measurements_added",
    "duration_seconds",
    "error_message",
    "depth_range",
    "avg_temperature",
    "min_temperature",
    "max_temperature",
    "avg_salinity",
    "min_salinity",
    "max_salinity",
    "avg_pressure",
    "min_pressure",
    "max_pressure",
    // table aliases used by the synthesizer's fixed templates
    "p",
    "m",
];

pub struct RelationalStore {
    pool: SqlitePool,
    allocator: IdAllocator,
    row_cap: i64,
    sql_timeout: Duration,
}

impl RelationalStore {
    pub async fn new(
        store_name: impl Into<String>,
        pool: SqlitePool,
        id_range: (i64, i64),
        row_cap: i64,
        sql_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store_name = store_name.into();
        let high_water: Option<i64> =
            sqlx::query_scalar("SELECT MAX(global_profile_id) FROM argo_profiles").fetch_one(&pool).await?;
        let allocator = IdAllocator::new(store_name, id_range, high_water.unwrap_or(id_range.0 - 1));
        Ok(Self { pool, allocator, row_cap, sql_timeout })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a profile and its measurements as one logical unit (spec §5:
    /// profile + measurements + vector upsert commit atomically per file).
    /// On natural-key conflict, does nothing and returns the existing ID.
    pub async fn upsert_profile(
        &self,
        float_id: &str,
        cycle_number: i64,
        latitude: Option<f64>,
        longitude: Option<f64>,
        datetime: Option<DateTime<Utc>>,
        source_file_fingerprint: &str,
        measurements: &[(i64, Option<f64>, Option<f64>, Option<f64>, Option<i16>)],
    ) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT global_profile_id FROM argo_profiles \
             WHERE float_id = ? AND cycle_number = ? AND source_file_fingerprint = ?",
        )
        .bind(float_id)
        .bind(cycle_number)
        .bind(source_file_fingerprint)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(global_profile_id) = existing {
            tx.commit().await?;
            return Ok(UpsertOutcome::SkippedDuplicate { global_profile_id });
        }

        let global_profile_id = self.allocator.allocate()?;

        sqlx::query(
            "INSERT INTO argo_profiles \
             (global_profile_id, float_id, cycle_number, latitude, longitude, datetime, \
              measurement_count, source_file_fingerprint) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(global_profile_id)
        .bind(float_id)
        .bind(cycle_number)
        .bind(latitude)
        .bind(longitude)
        .bind(datetime)
        .bind(measurements.len() as i64)
        .bind(source_file_fingerprint)
        .execute(&mut *tx)
        .await?;

        for (level, pressure, temperature, salinity, quality_flag) in measurements {
            sqlx::query(
                "INSERT INTO argo_measurements \
                 (global_profile_id, level, pressure, temperature, salinity, quality_flag, \
                  latitude, longitude, datetime) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(global_profile_id)
            .bind(level)
            .bind(pressure)
            .bind(temperature)
            .bind(salinity)
            .bind(quality_flag)
            .bind(latitude)
            .bind(longitude)
            .bind(datetime)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(UpsertOutcome::Inserted { global_profile_id })
    }

    /// Validated read-only query: single top-level SELECT, no stacked
    /// statements, every bare identifier whitelisted (spec §4.3, §7).
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<(Vec<String>, Vec<serde_json::Value>), StoreError> {
        validate_read_only_select(sql)?;

        let mut q = sqlx::query(sql);
        for p in params {
            q = match p {
                SqlParam::Text(s) => q.bind(s.clone()),
                SqlParam::Int(i) => q.bind(*i),
                SqlParam::Float(f) => q.bind(*f),
            };
        }

        let rows = tokio::time::timeout(self.sql_timeout, q.fetch_all(&self.pool))
            .await
            .map_err(|_| StoreError::Sqlite(sqlx::Error::PoolTimedOut))??;

        let columns: Vec<String> =
            rows.first().map(|r| r.columns().iter().map(|c| c.name().to_string()).collect()).unwrap_or_default();

        let capped: Vec<_> = rows.into_iter().take(self.row_cap as usize).collect();
        let json_rows = capped.iter().map(row_to_json).collect();

        Ok((columns, json_rows))
    }

    pub async fn profiles_in_bbox(
        &self,
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
        limit: i64,
    ) -> Result<Vec<Profile>, StoreError> {
        let rows = sqlx::query_as::<_, Profile>(
            "SELECT global_profile_id, float_id, cycle_number, latitude, longitude, datetime, \
                    measurement_count, source_file_fingerprint \
             FROM argo_profiles \
             WHERE latitude BETWEEN ? AND ? AND longitude BETWEEN ? AND ? \
             ORDER BY datetime DESC LIMIT ?",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Latest position per float within `radius_km` of `(lat, lon)` (spec §6
    /// `/floats/radius`). Pre-filters with a bounding box in SQL, then
    /// applies the exact Haversine check in-process.
    pub async fn profiles_within_radius(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        limit: i64,
    ) -> Result<Vec<FloatRadiusRow>, StoreError> {
        let (lat_min, lat_max, lon_min, lon_max) = bounding_box_for_radius(lat, lon, radius_km);

        let candidates = sqlx::query_as::<_, Profile>(
            "SELECT p.global_profile_id, p.float_id, p.cycle_number, p.latitude, p.longitude, \
                    p.datetime, p.measurement_count, p.source_file_fingerprint \
             FROM argo_profiles p \
             INNER JOIN ( \
                 SELECT float_id, MAX(datetime) AS latest \
                 FROM argo_profiles WHERE latitude IS NOT NULL AND longitude IS NOT NULL \
                 GROUP BY float_id \
             ) latest ON latest.float_id = p.float_id AND latest.latest IS p.datetime \
             WHERE p.latitude BETWEEN ? AND ? AND p.longitude BETWEEN ? AND ?",
        )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .fetch_all(&self.pool)
        .await?;

        let mut rows: Vec<FloatRadiusRow> = candidates
            .into_iter()
            .filter_map(|p| {
                let (plat, plon) = (p.latitude?, p.longitude?);
                let distance_km = distance_km(lat, lon, plat, plon);
                (distance_km <= radius_km).then_some(FloatRadiusRow {
                    float_id: p.float_id,
                    latitude: plat,
                    longitude: plon,
                    distance_km,
                    datetime: p.datetime,
                    cycle_number: p.cycle_number,
                    measurement_count: p.measurement_count,
                    global_profile_id: p.global_profile_id,
                })
            })
            .collect();

        rows.sort_by(|a, b| a.distance_km.partial_cmp(&b.distance_km).unwrap());
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    /// Every position for every float whose latest position is within
    /// `radius_km`, chronologically ordered per float (spec §6 `/floats/
    /// trajectories/radius`).
    pub async fn trajectories_within_radius(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        limit: i64,
    ) -> Result<Vec<TrajectoryPoint>, StoreError> {
        let latest = self.profiles_within_radius(lat, lon, radius_km, i64::MAX).await?;
        let float_ids: HashSet<String> = latest.into_iter().map(|r| r.float_id).collect();
        if float_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = float_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT float_id, latitude, longitude, datetime, cycle_number, global_profile_id \
             FROM argo_profiles \
             WHERE float_id IN ({placeholders}) AND latitude IS NOT NULL AND longitude IS NOT NULL \
             ORDER BY float_id, datetime ASC LIMIT ?"
        );

        let mut q = sqlx::query_as::<_, TrajectoryPoint>(&sql);
        for id in &float_ids {
            q = q.bind(id);
        }
        q = q.bind(limit);

        Ok(q.fetch_all(&self.pool).await?)
    }

    pub async fn float_detail(
        &self,
        float_id: &str,
        min_depth: Option<f64>,
        max_depth: Option<f64>,
    ) -> Result<Option<FloatDetail>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT global_profile_id, float_id, cycle_number, latitude, longitude, datetime, \
                    measurement_count, source_file_fingerprint \
             FROM argo_profiles WHERE float_id = ? ORDER BY datetime DESC LIMIT 1",
        )
        .bind(float_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(profile) = profile else { return Ok(None) };

        let min_depth = min_depth.unwrap_or(0.0);
        let max_depth = max_depth.unwrap_or(f64::MAX);

        let measurements = sqlx::query_as::<_, Measurement>(
            "SELECT global_profile_id, level, pressure, temperature, salinity, quality_flag, \
                    latitude, longitude, datetime \
             FROM argo_measurements \
             WHERE global_profile_id = ? AND COALESCE(pressure, 0) BETWEEN ? AND ? \
             ORDER BY level ASC",
        )
        .bind(profile.global_profile_id)
        .bind(min_depth)
        .bind(max_depth)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(FloatDetail { profile, measurements }))
    }
}

#[derive(Debug, Clone)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
}

fn row_to_json(row: &sqlx::sqlite::SqliteRow) -> serde_json::Value {
    use sqlx::ValueRef;
    let mut map = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name();
        let value: serde_json::Value = row
            .try_get_raw(column.ordinal())
            .ok()
            .and_then(|raw| {
                if raw.is_null() {
                    return Some(serde_json::Value::Null);
                }
                row.try_get::<f64, _>(column.ordinal())
                    .map(|v| serde_json::json!(v))
                    .or_else(|_| row.try_get::<i64, _>(column.ordinal()).map(|v| serde_json::json!(v)))
                    .or_else(|_| row.try_get::<String, _>(column.ordinal()).map(|v| serde_json::json!(v)))
                    .ok()
            })
            .unwrap_or(serde_json::Value::Null);
        map.insert(name.to_string(), value);
    }
    serde_json::Value::Object(map)
}

/// Single top-level SELECT, no semicolons, identifiers whitelisted.
fn validate_read_only_select(sql: &str) -> Result<(), StoreError> {
    let trimmed = sql.trim();
    let normalized = trimmed.to_lowercase();

    if !normalized.starts_with("select") {
        return Err(StoreError::UnknownStore(format!("rejected non-SELECT statement: {sql}")));
    }
    if trimmed.trim_end_matches(';').contains(';') {
        return Err(StoreError::UnknownStore("rejected multi-statement SQL".to_string()));
    }

    for word in tokenize_identifiers(trimmed) {
        if !WHITELISTED_IDENTIFIERS.contains(&word.as_str()) {
            return Err(StoreError::UnknownStore(format!("identifier not whitelisted: {word}")));
        }
    }

    Ok(())
}

fn tokenize_identifiers(sql: &str) -> Vec<String> {
    const SQL_KEYWORDS: &[&str] = &[
        "select", "from", "where", "and", "or", "not", "in", "is", "null", "as", "group", "by", "order",
        "asc", "desc", "limit", "between", "avg", "min", "max", "count", "sum", "like", "case", "when",
        "then", "else", "end", "coalesce", "round", "having", "distinct", "on", "join", "inner", "left",
        "cast", "integer", "real", "text",
    ];

    sql.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .filter(|w| w.parse::<f64>().is_err())
        .map(|w| w.to_lowercase())
        .filter(|w| !SQL_KEYWORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_test_db;

    #[tokio::test]
    async fn upsert_then_reupsert_is_a_no_op() {
        let pool = create_test_db().await;
        let store =
            RelationalStore::new("dev", pool, (1, 1_000_000), 500, Duration::from_secs(5)).await.unwrap();

        let outcome1 = store
            .upsert_profile("1902482", 1, Some(15.0), Some(70.0), None, "fp-1", &[(0, Some(10.0), None, None, None)])
            .await
            .unwrap();
        assert!(outcome1.was_inserted());

        let outcome2 = store
            .upsert_profile("1902482", 1, Some(15.0), Some(70.0), None, "fp-1", &[(0, Some(10.0), None, None, None)])
            .await
            .unwrap();
        assert!(!outcome2.was_inserted());
        assert_eq!(outcome1.global_profile_id(), outcome2.global_profile_id());
    }

    #[tokio::test]
    async fn measurement_count_matches_inserted_measurements() {
        let pool = create_test_db().await;
        let store =
            RelationalStore::new("dev", pool, (1, 1_000_000), 500, Duration::from_secs(5)).await.unwrap();

        store
            .upsert_profile(
                "1902482",
                1,
                Some(15.0),
                Some(70.0),
                None,
                "fp-1",
                &[(0, Some(10.0), None, None, None), (1, Some(20.0), None, None, None)],
            )
            .await
            .unwrap();

        let (_, rows) = store
            .query("SELECT measurement_count FROM argo_profiles WHERE float_id = ?", &[SqlParam::Text("1902482".into())])
            .await
            .unwrap();
        assert_eq!(rows[0]["measurement_count"], serde_json::json!(2));
    }

    #[test]
    fn rejects_non_select_statements() {
        assert!(validate_read_only_select("DROP TABLE argo_profiles").is_err());
    }

    #[test]
    fn rejects_stacked_statements() {
        assert!(validate_read_only_select("SELECT float_id FROM argo_profiles; DROP TABLE argo_profiles").is_err());
    }

    #[test]
    fn rejects_unknown_identifiers() {
        assert!(validate_read_only_select("SELECT secret_column FROM argo_profiles").is_err());
    }

    #[test]
    fn accepts_whitelisted_select() {
        assert!(validate_read_only_select(
            "SELECT float_id, AVG(temperature) FROM argo_profiles JOIN argo_measurements \
             ON argo_profiles.global_profile_id = argo_measurements.global_profile_id \
             GROUP BY float_id"
        )
        .is_ok());
    }
}
