//! Generators for synthetic volumes and query points.
//!
//! Values follow predictable patterns so a test can recompute the expected
//! value at any voxel.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Stored `[field0, field1]` components of a smooth displacement field.
///
/// Components are fixed-point (4 units per pixel) and stay within int16.
pub fn displacement_value(voxel: [u64; 3]) -> [i16; 2] {
    let y = (voxel[1] % 64) as i16 - 32;
    let x = (voxel[0] % 64) as i16 - 32;
    [y * 4, -x * 2]
}

/// Seeded random points inside `[0, extent)` on every axis.
pub fn random_points(count: usize, extent: [f64; 3], seed: u64) -> Vec<[f64; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            [
                rng.gen_range(0.0..extent[0]),
                rng.gen_range(0.0..extent[1]),
                rng.gen_range(0.0..extent[2]),
            ]
        })
        .collect()
}

/// Points that lie outside `[0, extent)` on at least one axis.
pub fn out_of_bounds_points(extent: [f64; 3]) -> Vec<[f64; 3]> {
    vec![
        [-1.0, 0.0, 0.0],
        [0.0, -0.5, 0.0],
        [0.0, 0.0, -10.0],
        [extent[0], 0.0, 0.0],
        [0.0, extent[1] + 3.0, 0.0],
        [0.0, 0.0, extent[2]],
        [f64::NAN, 1.0, 1.0],
        [1.0, f64::INFINITY, 1.0],
    ]
}

/// A seeded permutation of `0..len`.
pub fn shuffled_indices(len: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_points_in_extent_and_seeded() {
        let points = random_points(100, [10.0, 20.0, 5.0], 7);
        assert!(points
            .iter()
            .all(|p| p[0] < 10.0 && p[1] < 20.0 && p[2] < 5.0 && p.iter().all(|v| *v >= 0.0)));
        assert_eq!(points, random_points(100, [10.0, 20.0, 5.0], 7));
    }

    #[test]
    fn test_shuffled_indices_is_permutation() {
        let mut indices = shuffled_indices(50, 3);
        indices.sort_unstable();
        assert_eq!(indices, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_displacement_range() {
        let [f0, f1] = displacement_value([0, 63, 0]);
        assert_eq!(f0, 124);
        assert_eq!(f1, 64);
    }
}
