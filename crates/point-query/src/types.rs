//! Core types for point queries.

use serde::{Deserialize, Serialize};
use volume_common::ElementType;

use crate::error::{PointQueryError, Result};

/// A query point rescaled into the store's voxel grid, `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate(pub [i64; 3]);

impl GridCoordinate {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self([x, y, z])
    }
}

/// Index of the fetch block a grid coordinate falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey(pub [i64; 3]);

/// Inclusive per-axis bounds of a store's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub min: [i64; 3],
    pub max: [i64; 3],
}

impl Domain {
    pub fn new(min: [i64; 3], max: [i64; 3]) -> Self {
        Self { min, max }
    }

    /// Domain of a zero-origin array with the given shape.
    pub fn from_shape(shape: [u64; 3]) -> Self {
        Self {
            min: [0; 3],
            max: [
                shape[0] as i64 - 1,
                shape[1] as i64 - 1,
                shape[2] as i64 - 1,
            ],
        }
    }

    /// True when the coordinate is inside the bounds on every axis (inclusive).
    pub fn contains(&self, coord: &GridCoordinate) -> bool {
        (0..3).all(|axis| coord.0[axis] >= self.min[axis] && coord.0[axis] <= self.max[axis])
    }
}

/// An axis-aligned box in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: [i64; 3],
    pub shape: [u64; 3],
}

impl Region {
    pub fn new(start: [i64; 3], shape: [u64; 3]) -> Self {
        Self { start, shape }
    }

    /// Smallest region covering all coordinates. `None` for an empty input.
    pub fn bounding<'a>(coords: impl IntoIterator<Item = &'a GridCoordinate>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut min = first.0;
        let mut max = first.0;

        for coord in iter {
            for axis in 0..3 {
                min[axis] = min[axis].min(coord.0[axis]);
                max[axis] = max[axis].max(coord.0[axis]);
            }
        }

        Some(Self {
            start: min,
            shape: [
                (max[0] - min[0] + 1) as u64,
                (max[1] - min[1] + 1) as u64,
                (max[2] - min[2] + 1) as u64,
            ],
        })
    }

    /// Number of voxels in the region.
    pub fn num_voxels(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Row-major voxel offset of `coord` inside the region, or `None` if outside.
    pub fn offset_of(&self, coord: &GridCoordinate) -> Option<usize> {
        let mut local = [0u64; 3];
        for axis in 0..3 {
            let d = coord.0[axis] - self.start[axis];
            if d < 0 || d as u64 >= self.shape[axis] {
                return None;
            }
            local[axis] = d as u64;
        }
        let offset = (local[0] * self.shape[1] + local[1]) * self.shape[2] + local[2];
        Some(offset as usize)
    }
}

/// Raw element buffer returned by one region read.
///
/// Layout is row-major over `[x, y, z, channel]` in native byte order.
#[derive(Debug, Clone)]
pub struct RegionData {
    pub region: Region,
    pub element_type: ElementType,
    pub width: usize,
    pub bytes: Vec<u8>,
}

impl RegionData {
    /// Wrap raw bytes, checking the length matches the region.
    pub fn new(
        region: Region,
        element_type: ElementType,
        width: usize,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let expected = region.num_voxels() as usize * width * element_type.size_bytes();
        if bytes.len() != expected {
            return Err(PointQueryError::invalid_metadata(format!(
                "region {:?} returned {} bytes, expected {}",
                region,
                bytes.len(),
                expected
            )));
        }
        Ok(Self {
            region,
            element_type,
            width,
            bytes,
        })
    }

    /// Bytes of all channels at `coord`.
    pub fn voxel_bytes(&self, coord: &GridCoordinate) -> Option<&[u8]> {
        let stride = self.width * self.element_type.size_bytes();
        let offset = self.region.offset_of(coord)? * stride;
        self.bytes.get(offset..offset + stride)
    }
}

/// Valid points that fall into one fetch block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGroup {
    pub key: ChunkKey,
    /// (original input index, grid coordinate) pairs.
    pub members: Vec<(usize, GridCoordinate)>,
}

impl ChunkGroup {
    pub fn new(key: ChunkKey) -> Self {
        Self {
            key,
            members: Vec::new(),
        }
    }

    /// Minimal region covering every member.
    pub fn bounding_region(&self) -> Option<Region> {
        Region::bounding(self.members.iter().map(|(_, coord)| coord))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Values extracted for one chunk group, ready to scatter into the result.
#[derive(Debug, Clone)]
pub struct GroupValues {
    pub indices: Vec<usize>,
    /// `indices.len() * width` elements, in member order.
    pub bytes: Vec<u8>,
}
