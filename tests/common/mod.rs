//! Shared fixtures for integration tests: analytic synthetic fields with
//! known geometry, plus mask builders.
//!
//! Not every test binary uses every fixture.
#![allow(dead_code)]

use nalgebra::Vector3;
use ndarray::{Array3, Array4};

use tractus::peaks::OrientationField;
use tractus::volume::{MaskVolume, ScalarVolume, VoxelAffine};

/// Field of the given grid size with one identical peak in every voxel.
pub fn uniform_peak_field(shape: [usize; 3], peak: Vector3<f32>) -> OrientationField {
    let mut data = Array4::<f32>::zeros((shape[0], shape[1], shape[2], 3));
    for x in 0..shape[0] {
        for y in 0..shape[1] {
            for z in 0..shape[2] {
                data[[x, y, z, 0]] = peak.x;
                data[[x, y, z, 1]] = peak.y;
                data[[x, y, z, 2]] = peak.z;
            }
        }
    }
    OrientationField::new(data, VoxelAffine::identity()).expect("valid synthetic field")
}

/// All-true mask over a grid.
pub fn full_mask(shape: [usize; 3]) -> MaskVolume {
    MaskVolume::new(
        Array3::from_elem((shape[0], shape[1], shape[2]), true),
        VoxelAffine::identity(),
    )
}

/// Mask true on an axis-aligned x-slab `x0 ≤ x ≤ x1`.
pub fn x_slab_mask(shape: [usize; 3], x0: usize, x1: usize) -> MaskVolume {
    let data = Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(x, _, _)| {
        x >= x0 && x <= x1
    });
    MaskVolume::new(data, VoxelAffine::identity())
}

/// Scalar volume whose value equals the x voxel coordinate.
pub fn x_ramp_metric(shape: [usize; 3]) -> ScalarVolume {
    let data = Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(x, _, _)| x as f32);
    ScalarVolume::new(data, VoxelAffine::identity())
}
