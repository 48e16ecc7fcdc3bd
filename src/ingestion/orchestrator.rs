//! Ingestion orchestrator (C5, spec §4.5). Implemented as a `ScheduledTask`
//! so the same periodic-task executor that would drive any backend job
//! drives ingestion, guarded by a one-writer-per-store lock file.

use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{IngestionConfig, VectorConfig};
use crate::error::{IngestError, StoreError};
use crate::ingestion::crawler::Crawler;
use crate::ingestion::fingerprint::FingerprintMap;
use crate::ingestion::parser::parse_profile_file;
use crate::models::{RunStats, UpsertOutcome, VectorMetadata, VectorRecord};
use crate::store::RelationalStore;
use crate::utils::LiveLock;
use crate::utils::ScheduledTask;
use crate::vector::{Embedder, VectorIndex};

pub struct IngestionOrchestrator {
    config: IngestionConfig,
    #[allow(dead_code)]
    vector_config: VectorConfig,
    crawler: Crawler,
    live_store: Arc<RelationalStore>,
    live_lock_path: String,
    vector_index: Option<Arc<VectorIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl IngestionOrchestrator {
    pub fn new(
        config: IngestionConfig,
        vector_config: VectorConfig,
        live_store: Arc<RelationalStore>,
        live_lock_path: String,
        vector_index: Option<Arc<VectorIndex>>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, IngestError> {
        let crawler = Crawler::new(&config)?;
        Ok(Self { config, vector_config, crawler, live_store, live_lock_path, vector_index, embedder })
    }

    async fn run_tick(&self) -> Result<(), anyhow::Error> {
        let run_timestamp = Utc::now();

        let lock = match LiveLock::acquire(&self.live_lock_path).await {
            Ok(lock) => lock,
            Err(_) => {
                tracing::warn!("ingestion tick skipped: live store locked by another writer");
                return Ok(());
            },
        };

        self.insert_run_started(run_timestamp).await?;

        let mut stats = RunStats::default();
        let mut fingerprints = FingerprintMap::load(&self.config.fingerprint_map_path).await?;

        let candidates = self
            .crawler
            .discover(&self.config.remote_root_url, &fingerprints, self.config.file_budget_per_tick)
            .await?;
        stats.files_discovered = candidates.len() as i64;

        for candidate in candidates {
            if stats.consecutive_write_faults >= self.config.max_consecutive_write_faults {
                tracing::error!("aborting tick: too many consecutive write faults");
                break;
            }

            match self.process_one_file(candidate.clone()).await {
                Ok(file_stats) => {
                    stats.files_downloaded += 1;
                    stats.profiles_added += file_stats.profiles_added;
                    stats.measurements_added += file_stats.measurements_added;
                    stats.skipped_duplicates += file_stats.skipped_duplicates;
                    stats.consecutive_write_faults = 0;

                    fingerprints.record(
                        candidate.remote_path,
                        candidate.size,
                        candidate.last_modified,
                        file_stats.content_hash,
                    );
                },
                Err(e) => {
                    tracing::warn!(remote_path = %candidate.remote_path, error = %e, "file ingestion failed");
                    stats.soft_errors += 1;

                    // Only an actual write fault counts toward the abort
                    // threshold (spec §7); transient/permanent remote errors
                    // and parse errors just count against error-rate tolerance.
                    if e.downcast_ref::<StoreError>().is_some() {
                        stats.consecutive_write_faults += 1;
                    }
                },
            }
        }

        fingerprints.persist().await?;

        let duration = (Utc::now() - run_timestamp).num_milliseconds() as f64 / 1000.0;
        let attempted = stats.files_discovered.max(1) as f64;
        let error_rate = stats.soft_errors as f64 / attempted;

        if error_rate > self.config.error_rate_tolerance {
            self.close_run_error(run_timestamp, &stats, duration, "error rate exceeded tolerance").await?;
        } else {
            self.close_run_completed(run_timestamp, &stats, duration).await?;
        }

        drop(lock);
        Ok(())
    }

    async fn process_one_file(&self, candidate: crate::ingestion::crawler::RemoteCandidate) -> Result<FileStats, anyhow::Error> {
        let downloaded = self.crawler.download(candidate).await?;
        let (profiles, diagnostics) = parse_profile_file(&downloaded.bytes)?;

        for warning in &diagnostics.warnings {
            tracing::debug!(warning);
        }

        let mut file_stats = FileStats { content_hash: downloaded.content_hash, ..Default::default() };

        for profile in profiles {
            let measurements: Vec<_> = profile
                .measurements
                .iter()
                .map(|m| (m.level, m.pressure, m.temperature, m.salinity, m.quality_flag))
                .collect();

            let outcome = self
                .live_store
                .upsert_profile(
                    &profile.float_id,
                    profile.cycle_number,
                    profile.latitude,
                    profile.longitude,
                    profile.datetime,
                    &file_stats.content_hash,
                    &measurements,
                )
                .await?;

            match outcome {
                UpsertOutcome::SkippedDuplicate { .. } => file_stats.skipped_duplicates += 1,
                UpsertOutcome::Inserted { global_profile_id } => {
                    file_stats.profiles_added += 1;
                    file_stats.measurements_added += profile.measurements.len() as i64;

                    if let (Some(index), Some(embedder)) = (&self.vector_index, &self.embedder) {
                        let embedding_input = build_embedding_input(&profile);
                        match embedder.embed(&embedding_input).await {
                            Ok(embedding) => {
                                let metadata = VectorMetadata {
                                    float_id: profile.float_id.clone(),
                                    region: None,
                                    year: profile.datetime.map(|d| d.format("%Y").to_string().parse().unwrap_or(0)).unwrap_or(0),
                                    month: profile.datetime.map(|d| d.format("%m").to_string().parse().unwrap_or(0)).unwrap_or(0),
                                    lat_bucket: profile.latitude.map(|l| l.floor() as i32).unwrap_or(0),
                                    lon_bucket: profile.longitude.map(|l| l.floor() as i32).unwrap_or(0),
                                    depth_band: depth_band_for(&profile.measurements),
                                };
                                let record = VectorRecord {
                                    vector_id: global_profile_id.to_string(),
                                    embedding,
                                    metadata,
                                };
                                if let Err(e) = index.index(record).await {
                                    tracing::warn!(error = %e, "vector index upsert failed, profile remains relational-only");
                                }
                            },
                            Err(e) => {
                                tracing::warn!(error = %e, "embedding request failed, profile remains relational-only");
                            },
                        }
                    }
                },
            }
        }

        Ok(file_stats)
    }

    async fn insert_run_started(&self, run_timestamp: chrono::DateTime<Utc>) -> Result<(), anyhow::Error> {
        sqlx::query(
            "INSERT INTO automation_log (run_timestamp, status, files_discovered, files_downloaded, \
             profiles_added, measurements_added, duration_seconds, error_message) \
             VALUES (?, 'started', 0, 0, 0, 0, 0, NULL)",
        )
        .bind(run_timestamp)
        .execute(self.live_store.pool())
        .await?;
        Ok(())
    }

    async fn close_run_completed(
        &self,
        run_timestamp: chrono::DateTime<Utc>,
        stats: &RunStats,
        duration: f64,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE automation_log SET status = 'completed', files_discovered = ?, files_downloaded = ?, \
             profiles_added = ?, measurements_added = ?, duration_seconds = ? WHERE run_timestamp = ?",
        )
        .bind(stats.files_discovered)
        .bind(stats.files_downloaded)
        .bind(stats.profiles_added)
        .bind(stats.measurements_added)
        .bind(duration)
        .bind(run_timestamp)
        .execute(self.live_store.pool())
        .await?;
        Ok(())
    }

    async fn close_run_error(
        &self,
        run_timestamp: chrono::DateTime<Utc>,
        stats: &RunStats,
        duration: f64,
        message: &str,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE automation_log SET status = 'error', files_discovered = ?, files_downloaded = ?, \
             profiles_added = ?, measurements_added = ?, duration_seconds = ?, error_message = ? \
             WHERE run_timestamp = ?",
        )
        .bind(stats.files_discovered)
        .bind(stats.files_downloaded)
        .bind(stats.profiles_added)
        .bind(stats.measurements_added)
        .bind(duration)
        .bind(message)
        .bind(run_timestamp)
        .execute(self.live_store.pool())
        .await?;
        Ok(())
    }
}

#[derive(Default)]
struct FileStats {
    content_hash: String,
    profiles_added: i64,
    measurements_added: i64,
    skipped_duplicates: i64,
}

/// Deterministic, human-readable serialization of metadata plus a coarse
/// measurement-range description — never the raw measurements (spec §4.4).
fn build_embedding_input(profile: &crate::models::ParsedProfile) -> String {
    let (depth_min, depth_max) = pressure_range(&profile.measurements);
    let (temp_min, temp_max) = value_range(&profile.measurements, |m| m.temperature);
    let (sal_min, sal_max) = value_range(&profile.measurements, |m| m.salinity);

    format!(
        "float_id={} cycle={} lat={:?} lon={:?} datetime={:?} depth_range=[{depth_min:.1},{depth_max:.1}] \
         temperature_range=[{temp_min:.2},{temp_max:.2}] salinity_range=[{sal_min:.2},{sal_max:.2}] levels={}",
        profile.float_id,
        profile.cycle_number,
        profile.latitude,
        profile.longitude,
        profile.datetime,
        profile.measurements.len()
    )
}

fn pressure_range(measurements: &[crate::models::ParsedMeasurement]) -> (f64, f64) {
    value_range(measurements, |m| m.pressure)
}

fn value_range(
    measurements: &[crate::models::ParsedMeasurement],
    extract: impl Fn(&crate::models::ParsedMeasurement) -> Option<f64>,
) -> (f64, f64) {
    let values: Vec<f64> = measurements.iter().filter_map(extract).collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    (values.iter().cloned().fold(f64::INFINITY, f64::min), values.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
}

fn depth_band_for(measurements: &[crate::models::ParsedMeasurement]) -> String {
    let (_, max_depth) = pressure_range(measurements);
    match max_depth {
        d if d <= 0.0 => "unknown".to_string(),
        d if d < 200.0 => "surface".to_string(),
        d if d < 1000.0 => "mid".to_string(),
        _ => "deep".to_string(),
    }
}

impl ScheduledTask for IngestionOrchestrator {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(self.run_tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedMeasurement;

    #[test]
    fn embedding_input_omits_raw_measurement_values() {
        let profile = crate::models::ParsedProfile {
            float_id: "1902482".to_string(),
            cycle_number: 1,
            latitude: Some(15.0),
            longitude: Some(70.0),
            datetime: None,
            measurements: vec![ParsedMeasurement {
                level: 0,
                pressure: Some(10.0),
                temperature: Some(28.5),
                salinity: Some(35.1),
                quality_flag: None,
            }],
        };
        let input = build_embedding_input(&profile);
        assert!(input.contains("float_id=1902482"));
        assert!(input.contains("depth_range"));
        assert!(!input.contains("28.5"));
    }

    #[test]
    fn depth_band_classifies_by_max_pressure() {
        let shallow = vec![ParsedMeasurement { level: 0, pressure: Some(50.0), temperature: None, salinity: None, quality_flag: None }];
        assert_eq!(depth_band_for(&shallow), "surface");

        let deep = vec![ParsedMeasurement { level: 0, pressure: Some(1500.0), temperature: None, salinity: None, quality_flag: None }];
        assert_eq!(depth_band_for(&deep), "deep");
    }
}
