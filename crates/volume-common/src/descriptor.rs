//! Dataset descriptors: the static metadata of one queryable volume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// How the volume is laid out in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    /// A multi-resolution pyramid; each scale is its own array under the dataset path.
    ChunkedPyramid,
    /// A single chunked array holding one stored scale.
    ChunkedArray,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChunkedPyramid => write!(f, "chunked-pyramid"),
            Self::ChunkedArray => write!(f, "chunked-array"),
        }
    }
}

/// Element datatype stored in the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// Parse a datatype name such as "uint64" or "float32" (case-insensitive).
    pub fn parse(s: &str) -> RegistryResult<Self> {
        match s.to_lowercase().as_str() {
            "uint8" | "u8" => Ok(Self::UInt8),
            "uint16" | "u16" => Ok(Self::UInt16),
            "uint32" | "u32" => Ok(Self::UInt32),
            "uint64" | "u64" => Ok(Self::UInt64),
            "int8" | "i8" => Ok(Self::Int8),
            "int16" | "i16" => Ok(Self::Int16),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            other => Err(RegistryError::UnknownDatatype(other.to_string())),
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        write!(f, "{}", name)
    }
}

/// Fill value used for points that cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelPolicy {
    /// Zero, the "no object" segment ID.
    Zero,
    /// Not-a-number.
    NaN,
}

impl SentinelPolicy {
    pub fn for_element_type(element_type: ElementType) -> Self {
        if element_type.is_float() {
            Self::NaN
        } else {
            Self::Zero
        }
    }
}

/// Services a dataset can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Plain value lookup.
    #[serde(alias = "query")]
    Lookup,
    /// Coordinate transform through a displacement field.
    Transform,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup => write!(f, "lookup"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// Storage backend driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// Local filesystem, relative to the configured data root.
    #[default]
    File,
    /// S3-compatible object storage (MinIO).
    S3,
}

/// Where a dataset's arrays live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLocation {
    #[serde(default)]
    pub driver: StoreDriver,
    pub path: String,
}

impl StoreLocation {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            driver: StoreDriver::File,
            path: path.into(),
        }
    }

    pub fn s3(path: impl Into<String>) -> Self {
        Self {
            driver: StoreDriver::S3,
            path: path.into(),
        }
    }
}

/// Static metadata for one dataset.
///
/// Immutable once loaded; the sentinel policy is resolved from the element
/// type at construction and never re-derived per query.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDescriptor {
    pub id: String,
    pub description: String,
    pub kind: StorageKind,
    pub element_type: ElementType,
    /// Scalar components per point (1 for segment IDs, 2 for a 2D displacement).
    pub width: usize,
    /// Voxel size per axis at full resolution (scale 0).
    pub voxel_size: [f64; 3],
    /// Explicit voxel sizes for scales whose size is not the in-plane default.
    pub scale_voxel_sizes: BTreeMap<u32, [f64; 3]>,
    pub scales: Vec<u32>,
    pub services: Vec<Service>,
    pub store: StoreLocation,
    pub sentinel: SentinelPolicy,
}

impl DatasetDescriptor {
    /// Create and validate a descriptor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        kind: StorageKind,
        element_type: ElementType,
        width: usize,
        voxel_size: [f64; 3],
        scales: Vec<u32>,
        services: Vec<Service>,
        store: StoreLocation,
    ) -> RegistryResult<Self> {
        let descriptor = Self {
            id: id.into(),
            description: String::new(),
            kind,
            element_type,
            width,
            voxel_size,
            scale_voxel_sizes: BTreeMap::new(),
            scales,
            services,
            store,
            sentinel: SentinelPolicy::for_element_type(element_type),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the voxel size for one scale.
    pub fn with_scale_voxel_size(mut self, scale: u32, voxel_size: [f64; 3]) -> Self {
        self.scale_voxel_sizes.insert(scale, voxel_size);
        self
    }

    pub(crate) fn validate(&self) -> RegistryResult<()> {
        if self.scales.is_empty() {
            return Err(RegistryError::invalid(&self.id, "no scales declared"));
        }
        if self.width == 0 {
            return Err(RegistryError::invalid(&self.id, "width must be >= 1"));
        }
        let all_sizes = std::iter::once(&self.voxel_size).chain(self.scale_voxel_sizes.values());
        for size in all_sizes {
            if size.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(RegistryError::invalid(
                    &self.id,
                    format!("voxel size {:?} must be positive", size),
                ));
            }
        }
        if self.supports(Service::Transform) && self.width != 2 {
            return Err(RegistryError::invalid(
                &self.id,
                format!("transform datasets must have width 2, got {}", self.width),
            ));
        }
        if self.store.path.is_empty() {
            return Err(RegistryError::invalid(&self.id, "store path is empty"));
        }
        Ok(())
    }

    pub fn supports(&self, service: Service) -> bool {
        self.services.contains(&service)
    }

    pub fn has_scale(&self, scale: u32) -> bool {
        self.scales.contains(&scale)
    }

    /// Voxel size at a valid scale.
    ///
    /// Without an explicit override, x and y double per level and z is unchanged.
    pub fn voxel_size_at(&self, scale: u32) -> Option<[f64; 3]> {
        if !self.has_scale(scale) {
            return None;
        }
        if let Some(size) = self.scale_voxel_sizes.get(&scale) {
            return Some(*size);
        }
        let factor = 2f64.powi(scale as i32);
        Some([
            self.voxel_size[0] * factor,
            self.voxel_size[1] * factor,
            self.voxel_size[2],
        ])
    }

    /// Per-axis ratio between the voxel size at `scale` and at full resolution.
    pub fn downsample_factor(&self, scale: u32) -> Option<[f64; 3]> {
        let at_scale = self.voxel_size_at(scale)?;
        Some([
            at_scale[0] / self.voxel_size[0],
            at_scale[1] / self.voxel_size[1],
            at_scale[2] / self.voxel_size[2],
        ])
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            scales: self.scales.clone(),
            voxel_size: self.voxel_size,
            description: self.description.clone(),
        }
    }
}

/// Public listing entry for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub scales: Vec<u32>,
    pub voxel_size: [f64; 3],
    pub description: String,
}
