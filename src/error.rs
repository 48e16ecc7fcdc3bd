//! Error types. Each subsystem gets its own enum; `ApiError` wraps all of
//! them at the HTTP boundary (spec §6, §7).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed for {url}: {source}")]
    Fetch { url: String, #[source] source: reqwest::Error },

    #[error("directory listing for {url} could not be parsed")]
    ListingUnparsable { url: String },

    #[error("fingerprint store error: {0}")]
    Fingerprint(String),

    #[error("write fault: {0}")]
    WriteFault(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("truncated record: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("bad magic header: {0:x?}")]
    BadMagic(Vec<u8>),

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("field out of range: {field} = {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("i/o error decoding binary payload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("id range exhausted for store {store}")]
    IdRangeExhausted { store: String },

    #[error("unknown store selection: {0}")]
    UnknownStore(String),

    #[error("live store is locked by another writer")]
    LiveLocked,
}

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("qdrant client error: {0}")]
    Client(#[from] qdrant_client::QdrantError),

    #[error("embedding request failed: {0}")]
    Embedding(#[from] reqwest::Error),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query rejected: {0}")]
    RejectedSql(String),

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("narration backend error: {0}")]
    Narration(#[from] reqwest::Error),
}

/// Unified error surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Query(QueryError::RejectedSql(_)) => StatusCode::BAD_REQUEST,
            ApiError::Query(QueryError::UnknownRegion(_)) => StatusCode::BAD_REQUEST,
            ApiError::Query(QueryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Store(StoreError::LiveLocked) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorResponse { status: "error".to_string(), error: self.to_string() };
        (status, Json(body)).into_response()
    }
}
