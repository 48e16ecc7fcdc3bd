//! One-writer-per-store discipline (spec §5, §9): a plain lock file next to
//! the live store's DSN, held for the duration of one ingestion tick.

use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub struct LiveLock {
    path: PathBuf,
}

impl LiveLock {
    /// Acquire the lock, failing if another tick already holds it. The lock
    /// is released automatically when the guard drops.
    pub async fn acquire(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StoreError::Sqlite(sqlx::Error::Io(e)))?;
        }

        match tokio::fs::OpenOptions::new().create_new(true).write(true).open(&path).await {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::LiveLocked),
            Err(e) => Err(StoreError::Sqlite(sqlx::Error::Io(e))),
        }
    }
}

impl Drop for LiveLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove live lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.lock");

        let guard = LiveLock::acquire(&path).await.unwrap();
        assert!(matches!(LiveLock::acquire(&path).await, Err(StoreError::LiveLocked)));
        drop(guard);

        assert!(LiveLock::acquire(&path).await.is_ok());
    }
}
