// Common test utilities and fixtures

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

use crate::db::test_support::create_test_db;
use crate::store::RelationalStore;

pub const RADIUS_CENTER_LAT: f64 = 15.0;
pub const RADIUS_CENTER_LON: f64 = 70.0;

/// A fresh in-memory relational store with the Argo schema applied.
pub async fn test_store() -> RelationalStore {
    let pool = create_test_db().await;
    RelationalStore::new("dev", pool, (1, 50_000_000), 500, Duration::from_secs(5)).await.unwrap()
}

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
}

/// Seeds a radius/trajectory fixture around `(RADIUS_CENTER_LAT,
/// RADIUS_CENTER_LON)`:
///
/// - 2 floats within 100km of the center (single cycle each, with a
///   temperature/pressure measurement so they also satisfy the Arabian Sea
///   aggregation scenario).
/// - 1 float just outside 100km but well inside 5000km.
/// - 1 float with 3 chronologically-ordered cycles near the center (its
///   latest position is also within 100km), to exercise per-float
///   trajectory grouping. Together with the two floats above this gives
///   exactly 3 floats inside the 100km ring.
/// - 120 floats scattered up to ~5 degrees away (each degree is ~111km),
///   pushing the wide-radius count past 100 without landing inside the
///   100km ring.
/// - One named float ("1902482") with 3 measurement levels, for the
///   float-lookup scenario.
pub async fn seed_radius_fixture(store: &RelationalStore) {
    let near_deltas = [0.3, 0.6];
    for (i, delta) in near_deltas.iter().enumerate() {
        let float_id = format!("100000{}", i + 1);
        store
            .upsert_profile(
                &float_id,
                1,
                Some(RADIUS_CENTER_LAT + delta),
                Some(RADIUS_CENTER_LON),
                Some(ts(1, 0)),
                &format!("fp-near-{i}"),
                &[(0, Some(10.0), Some(27.5), Some(35.2), Some(1))],
            )
            .await
            .unwrap();
    }

    store
        .upsert_profile(
            "1000004",
            1,
            Some(RADIUS_CENTER_LAT + 1.2),
            Some(RADIUS_CENTER_LON),
            Some(ts(1, 0)),
            "fp-far",
            &[(0, Some(10.0), Some(27.0), Some(35.0), Some(1))],
        )
        .await
        .unwrap();

    let trajectory_positions = [(15.05, 1), (15.08, 2), (15.10, 3)];
    for (lat, cycle) in trajectory_positions {
        store
            .upsert_profile(
                "1000005",
                cycle,
                Some(lat),
                Some(RADIUS_CENTER_LON),
                Some(ts(cycle as u32, 0)),
                &format!("fp-traj-{cycle}"),
                &[(0, Some(5.0), Some(28.0), Some(35.0), Some(1))],
            )
            .await
            .unwrap();
    }

    let mut next_id = 2_000_000;
    for i in -5..=5i32 {
        for j in -5..=5i32 {
            if i == 0 && j == 0 {
                continue;
            }
            next_id += 1;
            store
                .upsert_profile(
                    &next_id.to_string(),
                    1,
                    Some(RADIUS_CENTER_LAT + i as f64),
                    Some(RADIUS_CENTER_LON + j as f64),
                    Some(ts(1, 0)),
                    &format!("fp-grid-{next_id}"),
                    &[],
                )
                .await
                .unwrap();
        }
    }

    store
        .upsert_profile(
            "1902482",
            1,
            Some(RADIUS_CENTER_LAT + 0.2),
            Some(RADIUS_CENTER_LON + 0.1),
            Some(ts(1, 0)),
            "fp-1902482",
            &[
                (0, Some(10.0), Some(28.0), Some(35.1), Some(1)),
                (1, Some(300.0), Some(20.0), Some(35.4), Some(1)),
                (2, Some(800.0), Some(8.0), Some(34.9), Some(1)),
            ],
        )
        .await
        .unwrap();
}
