//! Zarr volume store.

use std::path::PathBuf;
use std::sync::Arc;

use zarrs::array::{Array, DataType, ElementOwned};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use volume_common::{DatasetDescriptor, ElementType, StorageKind, StoreDriver};

use crate::error::{PointQueryError, Result};
use crate::types::{Domain, Region, RegionData};

use super::object_storage::{create_s3_storage, RuntimeBlockOn, S3Config};
use super::{StoreOpener, VolumeStore};

/// Map a zarrs data type onto the element types the engine supports.
pub(crate) fn element_type_of(data_type: &DataType) -> Option<ElementType> {
    match data_type {
        DataType::UInt8 => Some(ElementType::UInt8),
        DataType::UInt16 => Some(ElementType::UInt16),
        DataType::UInt32 => Some(ElementType::UInt32),
        DataType::UInt64 => Some(ElementType::UInt64),
        DataType::Int8 => Some(ElementType::Int8),
        DataType::Int16 => Some(ElementType::Int16),
        DataType::Int32 => Some(ElementType::Int32),
        DataType::Int64 => Some(ElementType::Int64),
        DataType::Float32 => Some(ElementType::Float32),
        DataType::Float64 => Some(ElementType::Float64),
        _ => None,
    }
}

/// The zarrs data type for an element type.
pub(crate) fn zarr_data_type(element_type: ElementType) -> DataType {
    match element_type {
        ElementType::UInt8 => DataType::UInt8,
        ElementType::UInt16 => DataType::UInt16,
        ElementType::UInt32 => DataType::UInt32,
        ElementType::UInt64 => DataType::UInt64,
        ElementType::Int8 => DataType::Int8,
        ElementType::Int16 => DataType::Int16,
        ElementType::Int32 => DataType::Int32,
        ElementType::Int64 => DataType::Int64,
        ElementType::Float32 => DataType::Float32,
        ElementType::Float64 => DataType::Float64,
    }
}

/// Handle onto one Zarr array with axes `[x, y, z]` or `[x, y, z, channel]`.
pub struct ZarrVolumeStore<S: ReadableStorageTraits + 'static> {
    array: Array<S>,
    path: String,
    domain: Domain,
    chunk_shape: [u64; 3],
    element_type: ElementType,
    width: usize,
}

impl<S: ReadableStorageTraits + 'static> ZarrVolumeStore<S> {
    /// Open the array at `path` and read its shape, chunking and datatype.
    pub fn open(storage: Arc<S>, path: &str) -> Result<Self> {
        let array = Array::open(storage, path)
            .map_err(|e| PointQueryError::read_failed(format!("{}: {}", path, e)))?;

        let shape = array.shape().to_vec();
        let width = match shape.len() {
            3 => 1,
            4 => shape[3] as usize,
            n => {
                return Err(PointQueryError::invalid_metadata(format!(
                    "array {} has {} dimensions, expected 3 or 4",
                    path, n
                )))
            }
        };

        let origin = vec![0u64; shape.len()];
        let chunk = array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(|e| PointQueryError::invalid_metadata(e.to_string()))?
            .ok_or_else(|| PointQueryError::invalid_metadata("missing chunk shape"))?;
        let chunk_shape = [chunk[0].get(), chunk[1].get(), chunk[2].get()];

        let element_type = element_type_of(array.data_type()).ok_or_else(|| {
            PointQueryError::invalid_metadata(format!(
                "array {} has unsupported data type {:?}",
                path,
                array.data_type()
            ))
        })?;

        tracing::debug!(
            path = %path,
            shape = ?shape,
            chunk_shape = ?chunk_shape,
            element_type = %element_type,
            "Opened Zarr volume"
        );

        Ok(Self {
            array,
            path: path.to_string(),
            domain: Domain::from_shape([shape[0], shape[1], shape[2]]),
            chunk_shape,
            element_type,
            width,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn retrieve<T: ElementOwned + bytemuck::Pod>(&self, subset: &ArraySubset) -> Result<Vec<u8>> {
        let values: Vec<T> = self
            .array
            .retrieve_array_subset_elements(subset)
            .map_err(|e| PointQueryError::read_failed(e.to_string()))?;
        Ok(bytemuck::cast_slice(&values).to_vec())
    }
}

impl<S: ReadableStorageTraits + 'static> VolumeStore for ZarrVolumeStore<S> {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn chunk_shape(&self) -> [u64; 3] {
        self.chunk_shape
    }

    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn width(&self) -> usize {
        self.width
    }

    fn read_region(&mut self, region: &Region) -> Result<RegionData> {
        if region.start.iter().any(|v| *v < 0) {
            return Err(PointQueryError::read_failed(format!(
                "region {:?} starts before the array origin",
                region
            )));
        }

        let mut start: Vec<u64> = region.start.iter().map(|v| *v as u64).collect();
        let mut shape: Vec<u64> = region.shape.to_vec();
        if self.array.shape().len() == 4 {
            start.push(0);
            shape.push(self.width as u64);
        }

        let subset = ArraySubset::new_with_start_shape(start, shape)
            .map_err(|e| PointQueryError::read_failed(e.to_string()))?;

        let bytes = match self.element_type {
            ElementType::UInt8 => self.retrieve::<u8>(&subset)?,
            ElementType::UInt16 => self.retrieve::<u16>(&subset)?,
            ElementType::UInt32 => self.retrieve::<u32>(&subset)?,
            ElementType::UInt64 => self.retrieve::<u64>(&subset)?,
            ElementType::Int8 => self.retrieve::<i8>(&subset)?,
            ElementType::Int16 => self.retrieve::<i16>(&subset)?,
            ElementType::Int32 => self.retrieve::<i32>(&subset)?,
            ElementType::Int64 => self.retrieve::<i64>(&subset)?,
            ElementType::Float32 => self.retrieve::<f32>(&subset)?,
            ElementType::Float64 => self.retrieve::<f64>(&subset)?,
        };

        RegionData::new(*region, self.element_type, self.width, bytes)
    }
}

/// Normalize a storage path to have a leading slash.
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Path of the array holding `scale` below a dataset's base path.
///
/// Pyramids keep each scale in a child array named after the level; a plain
/// chunked array is the single stored level itself.
fn array_path(kind: StorageKind, base: &str, scale: u32) -> String {
    let base = base.trim_end_matches('/');
    match kind {
        StorageKind::ChunkedPyramid => format!("{}/{}", base, scale),
        StorageKind::ChunkedArray if base.is_empty() => "/".to_string(),
        StorageKind::ChunkedArray => base.to_string(),
    }
}

/// Opens Zarr volumes from the filesystem or S3.
///
/// Every call to [`StoreOpener::open`] builds a fresh storage client and array
/// handle, so each fetch worker owns its own.
#[derive(Clone)]
pub struct ZarrStoreOpener {
    data_root: PathBuf,
    s3: Option<(S3Config, RuntimeBlockOn)>,
}

impl ZarrStoreOpener {
    /// Opener for file-driver datasets below `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            s3: None,
        }
    }

    /// Enable the S3 driver.
    pub fn with_s3(mut self, config: S3Config, block_on: RuntimeBlockOn) -> Self {
        self.s3 = Some((config, block_on));
        self
    }

    fn open_store(&self, descriptor: &DatasetDescriptor, scale: u32) -> Result<Box<dyn VolumeStore>> {
        match descriptor.store.driver {
            StoreDriver::File => {
                let root = self.data_root.join(&descriptor.store.path);
                let storage = FilesystemStore::new(&root)
                    .map_err(|e| PointQueryError::read_failed(e.to_string()))?;
                let path = array_path(descriptor.kind, "", scale);
                Ok(Box::new(ZarrVolumeStore::open(Arc::new(storage), &path)?))
            }
            StoreDriver::S3 => {
                let (config, block_on) = self.s3.as_ref().ok_or_else(|| {
                    PointQueryError::ConfigError("S3 driver is not configured".to_string())
                })?;
                let storage = create_s3_storage(config, block_on.clone())?;
                let base = normalize_path(&descriptor.store.path);
                let path = array_path(descriptor.kind, &base, scale);
                Ok(Box::new(ZarrVolumeStore::open(storage, &path)?))
            }
        }
    }
}

impl StoreOpener for ZarrStoreOpener {
    fn open(&self, descriptor: &DatasetDescriptor, scale: u32) -> Result<Box<dyn VolumeStore>> {
        self.open_store(descriptor, scale)
            .map_err(|e| PointQueryError::open_failed(&descriptor.id, scale, e.to_string()))
    }
}
