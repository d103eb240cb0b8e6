//! Full-resolution coordinates to store grid coordinates.

use volume_common::{DatasetDescriptor, QueryPoint};

use crate::error::{PointQueryError, Result};
use crate::types::GridCoordinate;

/// Maps full-resolution points onto the grid of one scale level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale: u32,
    downsample: [f64; 3],
}

impl CoordinateMapper {
    /// Build the mapper for `scale`, failing if the dataset does not have it.
    pub fn for_scale(descriptor: &DatasetDescriptor, scale: u32) -> Result<Self> {
        let downsample =
            descriptor
                .downsample_factor(scale)
                .ok_or_else(|| PointQueryError::UnsupportedScale {
                    dataset: descriptor.id.clone(),
                    scale,
                    valid: descriptor.scales.clone(),
                })?;
        Ok(Self { scale, downsample })
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn downsample(&self) -> [f64; 3] {
        self.downsample
    }

    /// Floor-divide each axis by its downsample factor.
    ///
    /// Returns `None` for points with a non-finite coordinate; those can never
    /// be inside the domain.
    pub fn map_point(&self, point: &QueryPoint) -> Option<GridCoordinate> {
        if !point.is_finite() {
            return None;
        }
        let p = point.to_array();
        let mut grid = [0i64; 3];
        for axis in 0..3 {
            let scaled = (p[axis] / self.downsample[axis]).floor();
            // Saturating cast; anything this large is out of every domain.
            grid[axis] = scaled as i64;
        }
        Some(GridCoordinate(grid))
    }

    pub fn map_points(&self, points: &[QueryPoint]) -> Vec<Option<GridCoordinate>> {
        points.iter().map(|p| self.map_point(p)).collect()
    }
}
