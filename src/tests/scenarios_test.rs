//! End-to-end scenarios over the relational store, classifier, synthesizer,
//! executor, and narrator together. Fixtures are seeded directly through
//! `RelationalStore::upsert_profile` rather than the crawler/parser, which
//! have their own colocated tests.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{QueryConfig, VectorConfig};
use crate::models::StoreSelection;
use crate::query::narrator::{Narrator, TemplateNarrator};
use crate::query::{classify, Gazetteer, QueryExecutor};
use crate::store::RelationalStore;
use crate::tests::common::{seed_radius_fixture, test_store, RADIUS_CENTER_LAT, RADIUS_CENTER_LON};

fn answer_config() -> crate::config::AnswerConfig {
    crate::config::AnswerConfig { max_sentences_informational: 4, max_sentences_data: 4 }
}

async fn seeded_executor() -> (Arc<RelationalStore>, Arc<QueryExecutor>) {
    let store = Arc::new(test_store().await);
    seed_radius_fixture(&store).await;
    let executor = Arc::new(QueryExecutor::new(
        Arc::clone(&store),
        None,
        None,
        Gazetteer::default(),
        QueryConfig::default(),
        VectorConfig::default(),
    ));
    (store, executor)
}

/// S1 — radius small: 2 or 3 floats within 100km, all within the bound.
#[tokio::test]
async fn s1_radius_small() {
    let (store, _executor) = seeded_executor().await;
    let rows = store.profiles_within_radius(RADIUS_CENTER_LAT, RADIUS_CENTER_LON, 100.0, 100).await.unwrap();

    assert!((2..=3).contains(&rows.len()), "expected 2-3 floats, got {}", rows.len());
    for row in &rows {
        assert!(row.distance_km <= 100.0, "float {} at {}km exceeds radius", row.float_id, row.distance_km);
    }
}

/// S2 — radius large: at least 100 floats, and widening the radius never
/// drops a float that a smaller radius already returned.
#[tokio::test]
async fn s2_radius_large_is_monotonic() {
    let (store, _executor) = seeded_executor().await;

    let small = store.profiles_within_radius(RADIUS_CENTER_LAT, RADIUS_CENTER_LON, 100.0, 10_000).await.unwrap();
    let large = store.profiles_within_radius(RADIUS_CENTER_LAT, RADIUS_CENTER_LON, 5000.0, 10_000).await.unwrap();

    assert!(large.len() >= 100, "expected >= 100 floats at 5000km, got {}", large.len());

    let large_ids: std::collections::HashSet<_> = large.iter().map(|r| r.float_id.clone()).collect();
    for row in &small {
        assert!(large_ids.contains(&row.float_id), "widening radius dropped float {}", row.float_id);
    }
}

/// S3 — informational: no data, no table, a short fixed-length summary.
#[tokio::test]
async fn s3_informational_has_no_data() {
    let (_store, executor) = seeded_executor().await;
    let gazetteer = Gazetteer::default();
    let narrator = TemplateNarrator { config: answer_config() };

    let (intent, entities) = classify("What are Argo floats?", &gazetteer);
    let outcome = executor.execute(intent, &entities, StoreSelection::Dev).await.unwrap();
    assert!(outcome.table_data.is_none());

    let message = narrator.narrate(intent, &entities, outcome.table_data.as_ref()).await;
    let sentence_count = message.matches('.').count();
    assert!((2..=4).contains(&sentence_count), "got {sentence_count} sentences: {message}");
}

/// S4 — aggregated spatial: depth-binned averages, no LIMIT, row count
/// equal to the number of depth bins rather than a raw row count.
#[tokio::test]
async fn s4_aggregated_spatial_groups_by_depth() {
    let (_store, executor) = seeded_executor().await;
    let gazetteer = Gazetteer::default();

    let (intent, entities) = classify("Show me temperature in the Arabian Sea", &gazetteer);
    let outcome = executor.execute(intent, &entities, StoreSelection::Dev).await.unwrap();

    let table = outcome.table_data.expect("aggregated query should return rows");
    for expected in ["depth_range", "avg_temperature", "min_temperature", "max_temperature", "measurement_count"] {
        assert!(table.columns.contains(&expected.to_string()), "missing column {expected}");
    }
    assert!(table.total_rows > 0);
    assert!(table.total_rows < 100, "depth-bin count should not look like a raw row cap");

    let sql = outcome.sql_text.expect("analytical query carries its SQL");
    assert!(sql.contains("GROUP BY"));
    assert!(!sql.to_uppercase().contains("LIMIT"));
}

/// S5 — float lookup: every row belongs to the requested float, bounded by
/// the configured raw row cap.
#[tokio::test]
async fn s5_float_lookup_is_scoped_to_one_float() {
    let (_store, executor) = seeded_executor().await;
    let gazetteer = Gazetteer::default();

    let (intent, entities) = classify("Get data from float 1902482", &gazetteer);
    let outcome = executor.execute(intent, &entities, StoreSelection::Dev).await.unwrap();

    let table = outcome.table_data.expect("float lookup should return rows");
    assert!(table.total_rows > 0);
    assert!(table.total_rows as i64 <= QueryConfig::default().row_cap);
    for row in &table.rows {
        assert_eq!(row["float_id"], serde_json::json!("1902482"));
    }
}

/// S6 — trajectory grouping: every float's returned points are non-empty
/// and chronologically non-decreasing.
#[tokio::test]
async fn s6_trajectories_are_sorted_per_float() {
    let (store, _executor) = seeded_executor().await;

    let points =
        store.trajectories_within_radius(RADIUS_CENTER_LAT, RADIUS_CENTER_LON, 500.0, 1000).await.unwrap();
    assert!(!points.is_empty());

    let mut by_float: std::collections::HashMap<String, Vec<_>> = std::collections::HashMap::new();
    for point in points {
        by_float.entry(point.float_id.clone()).or_default().push(point);
    }

    for (float_id, group) in &by_float {
        assert!(!group.is_empty(), "float {float_id} has an empty trajectory group");
        for pair in group.windows(2) {
            assert!(pair[0].datetime <= pair[1].datetime, "trajectory for {float_id} is out of order");
        }
    }
}

/// Universal property 2 — dev and live stores never allocate the same
/// `global_profile_id`, even when both start from an empty table.
#[tokio::test]
async fn id_space_disjointness_across_stores() {
    let dev_pool = crate::db::test_support::create_test_db().await;
    let live_pool = crate::db::test_support::create_test_db().await;

    let dev = RelationalStore::new("dev", dev_pool, (1, 1_000_000), 500, Duration::from_secs(5)).await.unwrap();
    let live =
        RelationalStore::new("live", live_pool, (1_000_001, 2_000_000), 500, Duration::from_secs(5)).await.unwrap();

    let dev_outcome = dev.upsert_profile("1902482", 1, Some(15.0), Some(70.0), None, "fp-dev", &[]).await.unwrap();
    let live_outcome = live.upsert_profile("1902482", 1, Some(15.0), Some(70.0), None, "fp-live", &[]).await.unwrap();

    assert_ne!(dev_outcome.global_profile_id(), live_outcome.global_profile_id());
    assert!(dev_outcome.global_profile_id() < 1_000_001);
    assert!(live_outcome.global_profile_id() >= 1_000_001);
}

/// Universal property 7 — two invocations of the same normalized query
/// within the cache TTL return byte-identical table data.
#[tokio::test]
async fn cache_hit_returns_identical_table_data() {
    let (_store, executor) = seeded_executor().await;
    let gazetteer = Gazetteer::default();

    let (intent, entities) = classify("Get data from float 1902482", &gazetteer);
    let first = executor.execute(intent, &entities, StoreSelection::Dev).await.unwrap();
    assert!(!first.from_cache);

    let second = executor.execute(intent, &entities, StoreSelection::Dev).await.unwrap();
    assert!(second.from_cache);

    let first_json = serde_json::to_string(&first.table_data).unwrap();
    let second_json = serde_json::to_string(&second.table_data).unwrap();
    assert_eq!(first_json, second_json);
}
