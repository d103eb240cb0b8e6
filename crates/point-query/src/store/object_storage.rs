//! S3 bucket access for remote volumes.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::error::{PointQueryError, Result};

/// Blocking executor driving object store futures on a captured runtime.
///
/// Fetch workers are plain pool threads, so the runtime handle is captured
/// when the opener is built. When called from inside a runtime worker the
/// task is first moved off the async thread with `block_in_place`.
#[derive(Clone)]
pub struct RuntimeBlockOn {
    handle: tokio::runtime::Handle,
}

impl RuntimeBlockOn {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Capture the handle of the runtime the caller is running in.
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| PointQueryError::ConfigError(format!("no tokio runtime: {}", e)))
    }
}

impl AsyncToSyncBlockOn for RuntimeBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.handle.block_on(future))
        } else {
            self.handle.block_on(future)
        }
    }
}

/// Bucket holding the remote volumes.
///
/// Large pyramids live in an S3-compatible bucket; dataset store paths from
/// the registry are keys inside it.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Plain-HTTP endpoints, e.g. a local test bucket.
    pub allow_http: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "volumes".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: "us-east-1".to_string(),
            allow_http: false,
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

impl S3Config {
    /// Read `S3_ENDPOINT`, `S3_BUCKET`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`,
    /// `S3_REGION` and `S3_ALLOW_HTTP`, keeping defaults for unset ones.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let allow_http = match std::env::var("S3_ALLOW_HTTP") {
            Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => defaults.allow_http,
        };
        Self {
            endpoint: env_or("S3_ENDPOINT", defaults.endpoint),
            bucket: env_or("S3_BUCKET", defaults.bucket),
            access_key_id: env_or("S3_ACCESS_KEY", defaults.access_key_id),
            secret_access_key: env_or("S3_SECRET_KEY", defaults.secret_access_key),
            region: env_or("S3_REGION", defaults.region),
            allow_http,
        }
    }
}

/// Bucket client as seen by zarrs, before the blocking adapter.
pub type AsyncS3Storage = AsyncObjectStore<object_store::aws::AmazonS3>;

/// Blocking view of the bucket, driven by [`RuntimeBlockOn`] from fetch workers.
pub type S3Storage = AsyncToSyncStorageAdapter<AsyncS3Storage, RuntimeBlockOn>;

/// Connect to the volume bucket.
pub fn create_s3_storage(config: &S3Config, block_on: RuntimeBlockOn) -> Result<Arc<S3Storage>> {
    let mut builder = AmazonS3Builder::new()
        .with_endpoint(&config.endpoint)
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_allow_http(config.allow_http);
    if !config.access_key_id.is_empty() {
        builder = builder
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);
    }

    let client = builder.build().map_err(|e| {
        PointQueryError::ConfigError(format!("bucket '{}': {}", config.bucket, e))
    })?;
    tracing::debug!(endpoint = %config.endpoint, bucket = %config.bucket, "Connected volume bucket");

    Ok(Arc::new(AsyncToSyncStorageAdapter::new(
        Arc::new(AsyncObjectStore::new(client)),
        block_on,
    )))
}
