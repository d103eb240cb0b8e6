//! Validity flags for mapped points.

use crate::types::{Domain, GridCoordinate};

/// Flags points whose grid coordinates fall outside a store's domain.
#[derive(Debug, Clone, Copy)]
pub struct BoundsValidator {
    domain: Domain,
}

impl BoundsValidator {
    pub fn new(domain: Domain) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn is_valid(&self, coord: Option<&GridCoordinate>) -> bool {
        coord.map(|c| self.domain.contains(c)).unwrap_or(false)
    }

    /// One flag per point, `true` iff the point is inside the inclusive domain.
    pub fn validate(&self, coords: &[Option<GridCoordinate>]) -> Vec<bool> {
        coords.iter().map(|c| self.is_valid(c.as_ref())).collect()
    }
}
