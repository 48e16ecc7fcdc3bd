//! Dev/live SQLite pool construction and schema migration (spec §3, §6).
//!
//! Both stores share one migration set. They differ only in DSN and in the
//! `global_profile_id` range handed to `store::id_allocator` at startup.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::StoreError;

/// Open (creating the file if absent) and migrate a single SQLite store.
pub async fn create_pool(dsn: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(dsn)
        .map_err(StoreError::Sqlite)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Convenience pair used by `AppState`: one pool for each store selection.
pub struct StorePools {
    pub dev: SqlitePool,
    pub live: SqlitePool,
}

impl StorePools {
    pub async fn connect(dev_dsn: &str, live_dsn: &str) -> Result<Self, StoreError> {
        let dev = create_pool(dev_dsn).await?;
        tracing::info!("dev store pool ready ({})", dev_dsn);
        let live = create_pool(live_dsn).await?;
        tracing::info!("live store pool ready ({})", live_dsn);
        Ok(Self { dev, live })
    }

    pub fn pool(&self, selection: crate::models::StoreSelection) -> &SqlitePool {
        match selection {
            crate::models::StoreSelection::Dev => &self.dev,
            crate::models::StoreSelection::Live => &self.live,
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use sqlx::SqlitePool;

    /// In-memory pool with the schema applied, for unit tests that need a
    /// real store without touching disk.
    pub async fn create_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.expect("in-memory sqlite");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate test db");
        pool
    }
}
