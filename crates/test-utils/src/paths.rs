//! Path helpers for tests that write volumes to disk.

use std::path::PathBuf;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Path of the sample dataset registry shipped with the workspace.
pub fn sample_registry_path() -> PathBuf {
    workspace_root().join("config").join("datasets.yaml")
}

/// Creates a temporary data root for test volumes.
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_data_root() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("point_query_")
        .tempdir()
        .expect("Failed to create temporary data root")
}
