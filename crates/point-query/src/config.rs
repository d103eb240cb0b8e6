//! Configuration for the point query engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PointQueryError, Result};

/// Process-wide engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointQueryConfig {
    /// Number of fetch workers in the pool.
    pub max_workers: usize,

    /// Maximum number of points accepted per query.
    pub max_points: u64,

    /// Each chunk dimension is multiplied by this to form one fetch block.
    /// e.g. 4 makes every worker read 64 (4*4*4) chunks at a time.
    pub chunk_multiplier: u64,

    /// Whole-query deadline in seconds. `None` disables the deadline.
    pub query_timeout_secs: Option<u64>,

    /// Root directory for datasets using the file driver.
    pub data_root: PathBuf,
}

impl Default for PointQueryConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            max_points: 10_000_000_000,
            chunk_multiplier: 1,
            query_timeout_secs: None,
            data_root: PathBuf::from("."),
        }
    }
}

impl PointQueryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("POINT_QUERY_MAX_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.max_workers = workers;
            }
        }

        if let Ok(val) = std::env::var("POINT_QUERY_MAX_POINTS") {
            if let Ok(max) = val.parse() {
                config.max_points = max;
            }
        }

        if let Ok(val) = std::env::var("POINT_QUERY_CHUNK_MULTIPLIER") {
            if let Ok(multiplier) = val.parse() {
                config.chunk_multiplier = multiplier;
            }
        }

        if let Ok(val) = std::env::var("POINT_QUERY_TIMEOUT_SECS") {
            config.query_timeout_secs = val.parse().ok().filter(|secs| *secs > 0);
        }

        if let Ok(val) = std::env::var("POINT_QUERY_DATA_ROOT") {
            config.data_root = PathBuf::from(val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(PointQueryError::ConfigError(
                "max_workers must be > 0".to_string(),
            ));
        }

        if self.chunk_multiplier == 0 {
            return Err(PointQueryError::ConfigError(
                "chunk_multiplier must be >= 1".to_string(),
            ));
        }

        if self.query_timeout_secs == Some(0) {
            return Err(PointQueryError::ConfigError(
                "query_timeout_secs must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// The query deadline as a duration.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }
}
