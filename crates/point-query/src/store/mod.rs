//! Backing store contract and implementations.
//!
//! A [`VolumeStore`] is one open handle onto the array of a single
//! (dataset, scale). Handles are not assumed to be safe for concurrent use:
//! reads take `&mut self`, and the fetch coordinator opens one handle per
//! worker through a shared [`StoreOpener`].

mod memory;
mod object_storage;
mod zarr;

pub use memory::{MemoryStoreOpener, MemoryVolume};
pub use object_storage::{create_s3_storage, RuntimeBlockOn, S3Config, S3Storage};
pub use zarr::{ZarrStoreOpener, ZarrVolumeStore};
pub(crate) use zarr::zarr_data_type;

use volume_common::{DatasetDescriptor, ElementType};

use crate::error::{PointQueryError, Result};
use crate::types::{Domain, Region, RegionData};

/// One open handle onto a chunked volume.
pub trait VolumeStore: Send {
    /// Inclusive grid bounds of the array.
    fn domain(&self) -> Domain;

    /// Native chunk shape along x, y, z.
    fn chunk_shape(&self) -> [u64; 3];

    fn element_type(&self) -> ElementType;

    /// Scalar components per voxel.
    fn width(&self) -> usize;

    /// Read every voxel of `region`.
    fn read_region(&mut self, region: &Region) -> Result<RegionData>;
}

/// Opens store handles for a (dataset, scale).
pub trait StoreOpener: Send + Sync {
    fn open(&self, descriptor: &DatasetDescriptor, scale: u32) -> Result<Box<dyn VolumeStore>>;
}

/// Check that an opened store agrees with the dataset descriptor.
pub fn check_store_matches(store: &dyn VolumeStore, descriptor: &DatasetDescriptor) -> Result<()> {
    if store.element_type() != descriptor.element_type {
        return Err(PointQueryError::invalid_metadata(format!(
            "dataset '{}' declares {} but the store holds {}",
            descriptor.id,
            descriptor.element_type,
            store.element_type()
        )));
    }
    if store.width() != descriptor.width {
        return Err(PointQueryError::invalid_metadata(format!(
            "dataset '{}' declares width {} but the store has {} channels",
            descriptor.id,
            descriptor.width,
            store.width()
        )));
    }
    Ok(())
}
