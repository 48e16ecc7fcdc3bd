//! FloatChat core library: ingestion pipeline, dual-store data model, and
//! the natural-language query router.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod query;
pub mod store;
pub mod utils;
pub mod vector;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{ApiError, ApiResult};

use query::gazetteer::Gazetteer;
use query::{Narrator, QueryExecutor};
use store::RelationalStore;

/// Application shared state. All services are wrapped in `Arc` for cheap
/// cloning and thread safety.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dev_store: Arc<RelationalStore>,
    pub live_store: Arc<RelationalStore>,
    pub query_executor: Arc<QueryExecutor>,
    pub narrator: Arc<dyn Narrator>,
    pub gazetteer: Arc<Gazetteer>,
}
