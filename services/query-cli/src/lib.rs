//! Library half of the point query command-line driver.

pub mod output;
pub mod points;

use std::sync::Arc;

use anyhow::{Context, Result};
use point_query::{PointQueryConfig, PointQueryEngine, RuntimeBlockOn, S3Config, ZarrStoreOpener};
use volume_common::{DatasetRegistry, StoreDriver};

pub use output::{lookup_json, transform_json};
pub use points::{parse_points, read_points_file};

/// True when any registered dataset lives on S3.
pub fn uses_s3(registry: &DatasetRegistry) -> bool {
    registry
        .ids()
        .filter_map(|id| registry.get(id))
        .any(|d| d.store.driver == StoreDriver::S3)
}

/// Build an engine over Zarr stores for the given registry.
///
/// Must run inside a tokio runtime when the registry has S3 datasets; the
/// S3 client blocks on that runtime from the fetch workers.
pub fn build_engine(
    config: PointQueryConfig,
    registry: Arc<DatasetRegistry>,
) -> Result<PointQueryEngine> {
    let mut opener = ZarrStoreOpener::new(&config.data_root);
    if uses_s3(&registry) {
        let s3 = S3Config::from_env();
        tracing::info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "Enabling S3 store driver");
        opener = opener.with_s3(s3, RuntimeBlockOn::current()?);
    }

    PointQueryEngine::new(config, registry, Arc::new(opener))
        .context("Failed to initialize point query engine")
}
