//! Error taxonomy shared across the pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChurnError {
    /// Malformed or out-of-range configuration; raised before any aggregation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Nothing left to work with after filtering (or nothing supplied).
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// Request rejected at the serving boundary.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("dataset not found at {0}")]
    DatasetNotFound(PathBuf),
    #[error("malformed event record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported table format for {0}")]
    UnsupportedFormat(PathBuf),
    #[error("model error: {0}")]
    Model(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ChurnError>;
