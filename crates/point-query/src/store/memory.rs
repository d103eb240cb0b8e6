//! In-memory volumes, used for small lookup tables and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use volume_common::{DatasetDescriptor, ElementType};

use crate::element::Element;
use crate::error::{PointQueryError, Result};
use crate::types::{Domain, GridCoordinate, Region, RegionData};

use super::{StoreOpener, VolumeStore};

/// A dense volume held in memory, row-major over `[x, y, z, channel]`.
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    shape: [u64; 3],
    chunk_shape: [u64; 3],
    element_type: ElementType,
    width: usize,
    bytes: Vec<u8>,
}

impl MemoryVolume {
    /// Build a volume whose value at (voxel, channel) is `f(voxel, channel)`.
    pub fn from_fn<T: Element>(
        shape: [u64; 3],
        chunk_shape: [u64; 3],
        width: usize,
        f: impl Fn([u64; 3], usize) -> T,
    ) -> Self {
        let mut values = Vec::with_capacity((shape.iter().product::<u64>() as usize) * width);
        for x in 0..shape[0] {
            for y in 0..shape[1] {
                for z in 0..shape[2] {
                    for c in 0..width {
                        values.push(f([x, y, z], c));
                    }
                }
            }
        }

        Self {
            shape,
            chunk_shape,
            element_type: T::ELEMENT_TYPE,
            width,
            bytes: bytemuck::cast_slice(&values).to_vec(),
        }
    }

    fn read(&self, region: &Region) -> Result<RegionData> {
        let domain = Domain::from_shape(self.shape);
        let end = [
            region.start[0] + region.shape[0] as i64 - 1,
            region.start[1] + region.shape[1] as i64 - 1,
            region.start[2] + region.shape[2] as i64 - 1,
        ];
        if !domain.contains(&GridCoordinate(region.start)) || !domain.contains(&GridCoordinate(end))
        {
            return Err(PointQueryError::read_failed(format!(
                "region {:?} outside volume of shape {:?}",
                region, self.shape
            )));
        }

        let stride = self.width * self.element_type.size_bytes();
        let full = Region::new([0, 0, 0], self.shape);
        let mut bytes = Vec::with_capacity(region.num_voxels() as usize * stride);

        for x in region.start[0]..=end[0] {
            for y in region.start[1]..=end[1] {
                let row_start = full
                    .offset_of(&GridCoordinate::new(x, y, region.start[2]))
                    .unwrap_or(0)
                    * stride;
                let row_len = region.shape[2] as usize * stride;
                bytes.extend_from_slice(&self.bytes[row_start..row_start + row_len]);
            }
        }

        RegionData::new(*region, self.element_type, self.width, bytes)
    }
}

/// Handle onto a shared [`MemoryVolume`].
struct MemoryStore {
    volume: Arc<MemoryVolume>,
    reads: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl VolumeStore for MemoryStore {
    fn domain(&self) -> Domain {
        Domain::from_shape(self.volume.shape)
    }

    fn chunk_shape(&self) -> [u64; 3] {
        self.volume.chunk_shape
    }

    fn element_type(&self) -> ElementType {
        self.volume.element_type
    }

    fn width(&self) -> usize {
        self.volume.width
    }

    fn read_region(&mut self, region: &Region) -> Result<RegionData> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PointQueryError::read_failed("injected read failure"));
        }
        self.volume.read(region)
    }
}

/// Opens handles onto in-memory volumes keyed by (dataset, scale).
///
/// Counts opened handles and region reads, and can be switched to fail every
/// read.
#[derive(Default)]
pub struct MemoryStoreOpener {
    volumes: HashMap<(String, u32), Arc<MemoryVolume>>,
    opens: AtomicUsize,
    reads: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryStoreOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a volume for a dataset scale.
    pub fn with_volume(mut self, dataset: &str, scale: u32, volume: MemoryVolume) -> Self {
        self.volumes
            .insert((dataset.to_string(), scale), Arc::new(volume));
        self
    }

    /// Make every subsequent region read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of region reads issued so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of handles opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl StoreOpener for MemoryStoreOpener {
    fn open(&self, descriptor: &DatasetDescriptor, scale: u32) -> Result<Box<dyn VolumeStore>> {
        let volume = self
            .volumes
            .get(&(descriptor.id.clone(), scale))
            .cloned()
            .ok_or_else(|| {
                PointQueryError::open_failed(&descriptor.id, scale, "no in-memory volume")
            })?;
        self.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryStore {
            volume,
            reads: self.reads.clone(),
            fail_reads: self.fail_reads.clone(),
        }))
    }
}
