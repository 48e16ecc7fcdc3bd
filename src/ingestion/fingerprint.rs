//! Persistent fingerprint map (spec §4.1, §9): the sole source of truth for
//! "have we seen this file". Written atomically (temp file + rename) so a
//! crash mid-tick never corrupts it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::IngestError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub size: u64,
    pub last_modified: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FingerprintMap {
    path: PathBuf,
    entries: HashMap<String, FileFingerprint>,
}

impl FingerprintMap {
    /// Load the map from disk, starting empty if the file does not exist yet.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| IngestError::Fingerprint(format!("corrupt fingerprint map: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(IngestError::Io(e)),
        };
        Ok(Self { path, entries })
    }

    /// A candidate needs downloading when it's unseen, or its recorded
    /// (size, last_modified) differs from what we're looking at now.
    pub fn needs_download(&self, remote_path: &str, size: u64, last_modified: &str) -> bool {
        match self.entries.get(remote_path) {
            None => true,
            Some(entry) => entry.size != size || entry.last_modified != last_modified,
        }
    }

    pub fn record(&mut self, remote_path: String, size: u64, last_modified: String, content_hash: String) {
        self.entries.insert(remote_path, FileFingerprint { size, last_modified, content_hash: Some(content_hash) });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write-to-temp-then-rename so concurrent readers (or a crash) never
    /// observe a partially written map.
    pub async fn persist(&self) -> Result<(), IngestError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| IngestError::Fingerprint(format!("serialize fingerprint map: {e}")))?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseen_path_needs_download() {
        let map = FingerprintMap::default();
        assert!(map.needs_download("dac/aoml/1900/1900_prof.nc", 100, "2024-01-01"));
    }

    #[tokio::test]
    async fn unchanged_entry_skips_download() {
        let mut map = FingerprintMap::default();
        map.record("dac/aoml/1900/1900_prof.nc".into(), 100, "2024-01-01".into(), "abc".into());
        assert!(!map.needs_download("dac/aoml/1900/1900_prof.nc", 100, "2024-01-01"));
        assert!(map.needs_download("dac/aoml/1900/1900_prof.nc", 101, "2024-01-01"));
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprints.json");

        let mut map = FingerprintMap::load(&path).await.unwrap();
        assert!(map.is_empty());
        map.record("a".into(), 1, "t".into(), "h".into());
        map.persist().await.unwrap();

        let reloaded = FingerprintMap::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.needs_download("a", 1, "t"));
    }
}
