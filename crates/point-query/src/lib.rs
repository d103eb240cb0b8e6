//! Batched point queries against chunked volumes.
//!
//! Given a list of full-resolution 3D points, the engine returns the value of
//! a dataset at each point, or moves each point by a stored displacement
//! field. Points are grouped by the storage chunk they fall into so every
//! chunk is read once, and groups are fetched on a fixed worker pool.
//!
//! # Architecture
//!
//! ```text
//! lookup / transform (dataset, scale, points)
//!      │
//!      ├─► Validate point count, dataset, service, scale
//!      │
//!      ├─► CoordinateMapper: floor(point / downsample factor)
//!      │
//!      ├─► BoundsValidator: inside [0, shape - 1] on every axis?
//!      │         │
//!      │         └─► outside: slot keeps the sentinel (0 or NaN)
//!      │
//!      ├─► ChunkBatcher: group valid points by fetch block
//!      │
//!      ├─► FetchCoordinator: one bounding-region read per group,
//!      │   spread over the worker pool, one store handle per worker
//!      │
//!      └─► ResultBuffer: scatter values back to input positions
//!               │
//!               ▼
//!          values, or decoded displacements (transform)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use point_query::{PointQueryConfig, PointQueryEngine, ZarrStoreOpener};
//! use volume_common::{DatasetRegistry, QueryPoint};
//!
//! let config = PointQueryConfig::from_env();
//! let registry = DatasetRegistry::load_from_file("config/datasets.yaml")?;
//! let opener = ZarrStoreOpener::new(&config.data_root);
//! let engine = PointQueryEngine::new(config, Arc::new(registry), Arc::new(opener))?;
//!
//! let labels = engine.lookup("aedes_brain", 0, &[QueryPoint::new(100.0, 200.0, 5.0)])?;
//! let moved = engine.transform("flywire_v1", 2, &[QueryPoint::new(100.0, 200.0, 5.0)])?;
//! ```

pub mod assemble;
pub mod batcher;
pub mod bounds;
pub mod config;
pub mod displacement;
pub mod element;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod mapper;
pub mod store;
pub mod testdata;
pub mod types;

// Re-export commonly used types at crate root
pub use assemble::ResultBuffer;
pub use batcher::ChunkBatcher;
pub use bounds::BoundsValidator;
pub use config::PointQueryConfig;
pub use displacement::{decode_field, Displacement, TransformResult, FIXED_POINT_SCALE};
pub use element::Element;
pub use engine::PointQueryEngine;
pub use error::{PointQueryError, Result};
pub use fetch::{Deadline, FetchCoordinator, FetchRequest};
pub use mapper::CoordinateMapper;
pub use store::{
    check_store_matches, MemoryStoreOpener, MemoryVolume, RuntimeBlockOn, S3Config,
    StoreOpener, VolumeStore, ZarrStoreOpener, ZarrVolumeStore,
};
pub use types::{ChunkGroup, ChunkKey, Domain, GridCoordinate, GroupValues, Region, RegionData};
pub use volume_common::{DatasetDescriptor, QueryPoint, SentinelPolicy};
