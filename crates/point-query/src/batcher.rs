//! Groups valid points by the fetch block they fall into.
//!
//! A fetch block is the store's native chunk scaled by the configured
//! multiplier. Grouping is pure arithmetic; no store access happens here.

use std::collections::BTreeMap;

use crate::error::{PointQueryError, Result};
use crate::types::{ChunkGroup, ChunkKey, GridCoordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBatcher {
    block_shape: [i64; 3],
}

impl ChunkBatcher {
    /// Create a batcher for the given native chunk shape and multiplier.
    pub fn new(chunk_shape: [u64; 3], multiplier: u64) -> Result<Self> {
        if multiplier == 0 {
            return Err(PointQueryError::ConfigError(
                "chunk multiplier must be >= 1".to_string(),
            ));
        }
        if chunk_shape.contains(&0) {
            return Err(PointQueryError::invalid_metadata(format!(
                "chunk shape {:?} has a zero dimension",
                chunk_shape
            )));
        }

        let mut block_shape = [0i64; 3];
        for axis in 0..3 {
            block_shape[axis] = (chunk_shape[axis] * multiplier) as i64;
        }
        Ok(Self { block_shape })
    }

    pub fn key_for(&self, coord: &GridCoordinate) -> ChunkKey {
        ChunkKey([
            coord.0[0].div_euclid(self.block_shape[0]),
            coord.0[1].div_euclid(self.block_shape[1]),
            coord.0[2].div_euclid(self.block_shape[2]),
        ])
    }

    /// Group the valid points; groups come out in ascending key order and
    /// members keep their input order.
    pub fn batch(&self, coords: &[Option<GridCoordinate>], validity: &[bool]) -> Vec<ChunkGroup> {
        let mut groups: BTreeMap<ChunkKey, ChunkGroup> = BTreeMap::new();

        for (index, (coord, valid)) in coords.iter().zip(validity).enumerate() {
            let coord = match coord {
                Some(c) if *valid => c,
                _ => continue,
            };
            let key = self.key_for(coord);
            groups
                .entry(key)
                .or_insert_with(|| ChunkGroup::new(key))
                .members
                .push((index, *coord));
        }

        groups.into_values().collect()
    }
}
