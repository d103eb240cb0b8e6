//! Common test fixtures.

/// Dataset registry documents.
pub mod registries {
    /// One uint64 segmentation pyramid and one int16 displacement field,
    /// both on the file driver.
    pub const SEGMENTATION_AND_FIELD: &str = r#"
datasets:
  labels:
    description: synthetic segmentation
    type: chunked-pyramid
    scales: [0, 1]
    voxel_size: [4, 4, 40]
    services: [lookup]
    dtype: uint64
    store:
      driver: file
      path: labels
  field:
    description: synthetic displacement field
    type: chunked-array
    scales: [0]
    voxel_size: [4, 4, 40]
    services: [transform]
    dtype: int16
    width: 2
    store:
      driver: file
      path: field.zarr
"#;
}

/// Volume shapes used across tests.
pub mod shapes {
    /// Small segmentation volume with uneven edge chunks.
    pub const LABELS: [u64; 3] = [40, 36, 12];

    /// Native chunk shape for [`LABELS`].
    pub const LABELS_CHUNK: [u64; 3] = [16, 16, 4];

    /// Displacement field covering `[0, 128) x [0, 256) x [0, 8)`.
    pub const FIELD: [u64; 3] = [128, 256, 8];

    pub const FIELD_CHUNK: [u64; 3] = [64, 64, 4];
}
