//! Order-preserving result assembly.

use volume_common::{ElementType, SentinelPolicy};

use crate::element::{element_to_f64, nan_bytes, Element};
use crate::error::{PointQueryError, Result};
use crate::types::GroupValues;

/// Per-point query results in input order.
///
/// One slot per input point, `width` elements per slot, stored as native
/// endian bytes of the dataset's element type. Slots that were never
/// fetched hold the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBuffer {
    element_type: ElementType,
    width: usize,
    len: usize,
    sentinel: SentinelPolicy,
    bytes: Vec<u8>,
}

impl ResultBuffer {
    /// A buffer of `len` slots, each filled with the sentinel.
    pub fn filled(
        element_type: ElementType,
        width: usize,
        len: usize,
        sentinel: SentinelPolicy,
    ) -> Self {
        let element = match sentinel {
            SentinelPolicy::Zero => vec![0u8; element_type.size_bytes()],
            SentinelPolicy::NaN => nan_bytes(element_type),
        };
        let bytes = element.repeat(len * width);

        Self {
            element_type,
            width,
            len,
            sentinel,
            bytes,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn sentinel(&self) -> SentinelPolicy {
        self.sentinel
    }

    /// Number of point slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot_stride(&self) -> usize {
        self.width * self.element_type.size_bytes()
    }

    /// Write one group's values at the input indices it recorded.
    pub fn scatter(&mut self, values: &GroupValues) -> Result<()> {
        let stride = self.slot_stride();
        if values.bytes.len() != values.indices.len() * stride {
            return Err(PointQueryError::invalid_metadata(format!(
                "group carries {} bytes for {} points, expected {} per point",
                values.bytes.len(),
                values.indices.len(),
                stride
            )));
        }

        for (slot, &index) in values.bytes.chunks_exact(stride).zip(&values.indices) {
            if index >= self.len {
                return Err(PointQueryError::invalid_metadata(format!(
                    "result index {} out of range for {} points",
                    index, self.len
                )));
            }
            self.bytes[index * stride..(index + 1) * stride].copy_from_slice(slot);
        }
        Ok(())
    }

    /// Raw bytes of the slot at `index`.
    pub fn slot_bytes(&self, index: usize) -> Option<&[u8]> {
        let stride = self.slot_stride();
        self.bytes.get(index * stride..(index + 1) * stride)
    }

    /// Component `channel` of point `index` as `f64`.
    pub fn value_f64(&self, index: usize, channel: usize) -> Option<f64> {
        if channel >= self.width {
            return None;
        }
        let size = self.element_type.size_bytes();
        let slot = self.slot_bytes(index)?;
        Some(element_to_f64(
            self.element_type,
            &slot[channel * size..(channel + 1) * size],
        ))
    }

    /// All components of point `index` as `f64`.
    pub fn row_f64(&self, index: usize) -> Option<Vec<f64>> {
        (0..self.width)
            .map(|channel| self.value_f64(index, channel))
            .collect()
    }

    /// Typed copy of every element (`len * width` values, point-major).
    ///
    /// `None` when `T` is not the buffer's element type.
    pub fn values<T: Element>(&self) -> Option<Vec<T>> {
        if T::ELEMENT_TYPE != self.element_type {
            return None;
        }
        Some(bytemuck::pod_collect_to_vec(&self.bytes))
    }

    /// Native-endian element bytes, point-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
