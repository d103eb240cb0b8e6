//! Test data generation utilities.
//!
//! Writes small Zarr volumes with known values so tests can check point
//! lookups against the generating function.

use std::path::Path;
use std::sync::Arc;

use zarrs::array::{ArrayBuilder, Element as ZarrElement, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::element::Element;
use crate::store::zarr_data_type;

/// Value at voxel (x, y, z): `x * 10_000 + y * 100 + z`.
///
/// Unique for volumes up to 100 voxels along y and z, which makes misplaced
/// reads easy to spot.
pub fn label_at(voxel: [u64; 3]) -> u64 {
    voxel[0] * 10_000 + voxel[1] * 100 + voxel[2]
}

/// Write a volume whose value at (voxel, channel) is `f(voxel, channel)`.
///
/// The array is stored at `array_path` inside a filesystem store rooted at
/// `root`, with axes `[x, y, z]` when `width` is 1 and `[x, y, z, channel]`
/// otherwise.
pub fn write_volume<T>(
    root: &Path,
    array_path: &str,
    shape: [u64; 3],
    chunk_shape: [u64; 3],
    width: usize,
    f: impl Fn([u64; 3], usize) -> T,
) -> Result<Vec<T>, Box<dyn std::error::Error>>
where
    T: Element + ZarrElement + Default,
    FillValue: From<T>,
{
    std::fs::create_dir_all(root)?;
    let store = Arc::new(FilesystemStore::new(root)?);

    let mut array_shape = shape.to_vec();
    let mut array_chunks = chunk_shape.to_vec();
    if width > 1 {
        array_shape.push(width as u64);
        array_chunks.push(width as u64);
    }

    let array = ArrayBuilder::new(
        array_shape.clone(),
        zarr_data_type(T::ELEMENT_TYPE),
        array_chunks.try_into()?,
        FillValue::from(T::default()),
    )
    .build(store, array_path)?;

    array.store_metadata()?;

    let mut data = Vec::with_capacity(array_shape.iter().product::<u64>() as usize);
    for x in 0..shape[0] {
        for y in 0..shape[1] {
            for z in 0..shape[2] {
                for c in 0..width {
                    data.push(f([x, y, z], c));
                }
            }
        }
    }

    let subset = ArraySubset::new_with_start_shape(vec![0; array_shape.len()], array_shape)?;
    array.store_array_subset_elements(&subset, &data)?;

    Ok(data)
}

/// Write a labelled uint64 pyramid with one array per scale.
///
/// Scale `s` has its x and y extent divided by `2^s`; z is not downsampled.
pub fn write_label_pyramid(
    root: &Path,
    base_shape: [u64; 3],
    chunk_shape: [u64; 3],
    scales: &[u32],
) -> Result<(), Box<dyn std::error::Error>> {
    for &scale in scales {
        let factor = 1u64 << scale;
        let shape = [
            (base_shape[0] / factor).max(1),
            (base_shape[1] / factor).max(1),
            base_shape[2],
        ];
        write_volume::<u64>(
            root,
            &format!("/{}", scale),
            shape,
            chunk_shape,
            1,
            |voxel, _| label_at(voxel) + scale as u64,
        )?;
    }
    Ok(())
}
