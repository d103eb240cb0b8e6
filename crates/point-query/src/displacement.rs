//! Displacement field decoding.
//!
//! Fields are stored as fixed-point int16 vectors with two fractional bits.
//! Even when a field is stored at a coarser scale, its vectors are full
//! resolution displacements, so no scale correction is applied.

use serde::{Deserialize, Serialize};
use volume_common::QueryPoint;

use crate::assemble::ResultBuffer;
use crate::error::{PointQueryError, Result};

/// Divisor recovering pixels from the stored fixed-point value.
pub const FIXED_POINT_SCALE: f64 = 4.0;

/// In-plane displacement in full-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    /// Decode a stored `[field0, field1]` pair. Storage order is (y, x).
    pub fn from_field(field0: f64, field1: f64) -> Self {
        Self {
            dx: field1 / FIXED_POINT_SCALE,
            dy: field0 / FIXED_POINT_SCALE,
        }
    }

    /// Move a point by this displacement; z is unchanged.
    pub fn apply(&self, point: &QueryPoint) -> QueryPoint {
        QueryPoint::new(point.x + self.dx, point.y + self.dy, point.z)
    }
}

/// Transformed coordinates and the displacements that produced them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformResult {
    pub points: Vec<QueryPoint>,
    pub displacements: Vec<Displacement>,
}

impl TransformResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Decode a fetched 2-component field and apply it to the original points.
pub fn decode_field(points: &[QueryPoint], field: &ResultBuffer) -> Result<TransformResult> {
    if field.width() != 2 {
        return Err(PointQueryError::invalid_metadata(format!(
            "displacement field must have 2 components, got {}",
            field.width()
        )));
    }
    if field.len() != points.len() {
        return Err(PointQueryError::invalid_metadata(format!(
            "field has {} entries for {} points",
            field.len(),
            points.len()
        )));
    }

    let mut result = TransformResult {
        points: Vec::with_capacity(points.len()),
        displacements: Vec::with_capacity(points.len()),
    };

    for (index, point) in points.iter().enumerate() {
        let field0 = field.value_f64(index, 0).unwrap_or(f64::NAN);
        let field1 = field.value_f64(index, 1).unwrap_or(f64::NAN);
        let displacement = Displacement::from_field(field0, field1);
        result.points.push(displacement.apply(point));
        result.displacements.push(displacement);
    }

    Ok(result)
}
