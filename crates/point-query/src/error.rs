//! Error types for point queries.

use std::time::Duration;

use thiserror::Error;
use volume_common::Service;

/// Errors that can occur while answering a point query.
///
/// Out-of-domain points are never errors; they resolve to the dataset's
/// sentinel value in the normal result path.
#[derive(Error, Debug)]
pub enum PointQueryError {
    /// The dataset identifier is not in the registry.
    #[error("unknown dataset '{dataset}' (available: {available})")]
    UnknownDataset { dataset: String, available: String },

    /// The requested scale is not one of the dataset's valid scales.
    #[error("scale {scale} is not available for dataset '{dataset}' (valid scales: {valid:?})")]
    UnsupportedScale {
        dataset: String,
        scale: u32,
        valid: Vec<u32>,
    },

    /// The dataset does not provide the requested service.
    #[error("dataset '{dataset}' does not provide {operation} services")]
    UnsupportedOperation { dataset: String, operation: Service },

    /// The point list exceeds the configured maximum.
    #[error("max number of locations ({max}) exceeded: got {count}")]
    TooManyPoints { count: usize, max: u64 },

    /// A store handle could not be opened.
    #[error("failed to open store for dataset '{dataset}' at scale {scale}: {message}")]
    StoreOpenFailed {
        dataset: String,
        scale: u32,
        message: String,
    },

    /// A low-level region read failed inside a store implementation.
    #[error("failed to read region: {0}")]
    ReadFailed(String),

    /// A region read failed for one chunk group; fatal for the whole query.
    #[error("store read failed for chunk {chunk:?}: {message}")]
    StoreReadFailure { chunk: [i64; 3], message: String },

    /// The query did not finish before its deadline.
    #[error("query exceeded deadline of {timeout:?}")]
    QueryTimeout { timeout: Duration },

    /// The store's shape or datatype disagrees with the dataset descriptor.
    #[error("invalid store metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl PointQueryError {
    /// Create a StoreOpenFailed error.
    pub fn open_failed(dataset: impl Into<String>, scale: u32, msg: impl Into<String>) -> Self {
        Self::StoreOpenFailed {
            dataset: dataset.into(),
            scale,
            message: msg.into(),
        }
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }

    /// HTTP status code a transport layer should answer with.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::UnknownDataset { .. } => 404,
            Self::UnsupportedScale { .. }
            | Self::UnsupportedOperation { .. }
            | Self::TooManyPoints { .. } => 400,
            Self::QueryTimeout { .. } => 504,
            _ => 500,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownDataset { .. } => "unknown_dataset",
            Self::UnsupportedScale { .. } => "unsupported_scale",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::TooManyPoints { .. } => "too_many_points",
            Self::StoreOpenFailed { .. } => "store_open_failed",
            Self::ReadFailed(_) | Self::StoreReadFailure { .. } => "store_read_failure",
            Self::QueryTimeout { .. } => "timeout",
            Self::InvalidMetadata(_) => "invalid_metadata",
            Self::ConfigError(_) => "config",
        }
    }
}

/// Result type for point query operations.
pub type Result<T> = std::result::Result<T, PointQueryError>;
