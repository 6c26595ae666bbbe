//! # Volumes: voxel grids with world-space metadata
//!
//! A [`Volume`] couples an immutable 3D voxel array with the [`VoxelAffine`]
//! mapping voxel indices to world millimeters. Volumes are loaded once per run
//! and never mutated; every engine holds a read-only reference for the duration
//! of the run, which is what makes the per-seed / per-streamline worker pools
//! lock-free.
//!
//! ## Sampling semantics
//!
//! * Scalar volumes ([`ScalarVolume`]) support **trilinear interpolation** at
//!   arbitrary world coordinates. Coordinates outside the grid yield `None`,
//!   never an error: callers treat an empty sample as "no data here".
//! * Mask volumes ([`MaskVolume`]) are queried by **nearest voxel**; outside
//!   the grid a mask reports `false`.
//!
//! ## See also
//! ------------
//! * [`affine::VoxelAffine`] – the voxel↔world transform.
//! * [`mask`] – binary-mask morphology (dilation, seed enumeration).

use nalgebra::Point3;
use ndarray::Array3;

use crate::tractus_errors::TractusError;

pub mod affine;
pub mod mask;

pub use affine::VoxelAffine;

/// Scalar metric volume (anisotropy maps, tissue metrics).
pub type ScalarVolume = Volume<f32>;
/// Binary region volume (segmentations, endpoint regions, tracking masks).
pub type MaskVolume = Volume<bool>;

/// Immutable 3D voxel array plus voxel↔world affine.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    data: Array3<T>,
    affine: VoxelAffine,
}

impl<T> Volume<T> {
    /// Wrap a voxel array and its affine.
    pub fn new(data: Array3<T>, affine: VoxelAffine) -> Self {
        Self { data, affine }
    }

    /// Grid dimensions `(nx, ny, nz)`.
    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    /// The voxel↔world transform.
    pub fn affine(&self) -> &VoxelAffine {
        &self.affine
    }

    /// Raw voxel data.
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Whether a continuous voxel coordinate lies inside the grid.
    ///
    /// The valid range per axis is `[0, dim - 1]` (continuous): every position
    /// inside it has a full set of bounding voxel centers for interpolation
    /// once the corner indices are clamped at the upper edge.
    #[inline]
    pub fn in_bounds_voxel(&self, voxel: &Point3<f64>) -> bool {
        let [nx, ny, nz] = self.shape();
        voxel.x >= 0.0
            && voxel.y >= 0.0
            && voxel.z >= 0.0
            && voxel.x <= (nx - 1) as f64
            && voxel.y <= (ny - 1) as f64
            && voxel.z <= (nz - 1) as f64
    }

    /// Whether a world coordinate lies inside the grid.
    #[inline]
    pub fn in_bounds_world(&self, world: &Point3<f64>) -> bool {
        self.in_bounds_voxel(&self.affine.world_to_voxel(world))
    }

    /// Validate that another grid has identical dimensions.
    ///
    /// Used at load time to reject mismatched volume/mask pairs before any
    /// processing starts (input-validity errors are fatal and early).
    pub fn check_same_shape<U>(&self, other: &Volume<U>) -> Result<(), TractusError> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(TractusError::VolumeDimensionMismatch {
                expected: self.shape(),
                found: other.shape(),
            })
        }
    }
}

impl<T: Copy> Volume<T> {
    /// Voxel value at a discrete index, `None` outside the grid.
    #[inline]
    pub fn get(&self, index: [usize; 3]) -> Option<T> {
        self.data.get(index).copied()
    }

    /// Voxel value at the voxel nearest to a world coordinate.
    #[inline]
    pub fn get_nearest_world(&self, world: &Point3<f64>) -> Option<T> {
        let v = self.affine.world_to_voxel(world);
        if !self.in_bounds_voxel(&v) {
            return None;
        }
        let i = v.x.round() as usize;
        let j = v.y.round() as usize;
        let k = v.z.round() as usize;
        self.get([i, j, k])
    }
}

/// Corner indices and interpolation weights for one continuous voxel coordinate.
///
/// Upper corners are clamped to the last voxel so that coordinates on the far
/// boundary interpolate against themselves instead of reading past the grid.
#[inline]
pub(crate) fn trilinear_corners(
    voxel: &Point3<f64>,
    shape: [usize; 3],
) -> ([usize; 2], [usize; 2], [usize; 2], [f64; 3]) {
    let x0 = voxel.x.floor() as usize;
    let y0 = voxel.y.floor() as usize;
    let z0 = voxel.z.floor() as usize;
    let x1 = (x0 + 1).min(shape[0] - 1);
    let y1 = (y0 + 1).min(shape[1] - 1);
    let z1 = (z0 + 1).min(shape[2] - 1);
    let frac = [
        voxel.x - x0 as f64,
        voxel.y - y0 as f64,
        voxel.z - z0 as f64,
    ];
    ([x0, x1], [y0, y1], [z0, z1], frac)
}

impl ScalarVolume {
    /// Trilinear interpolation at a world coordinate.
    ///
    /// Return
    /// ----------
    /// * `Some(value)` for coordinates inside the grid.
    /// * `None` outside the grid (treated as "undefined" by callers: excluded
    ///   from averages, never coerced to zero).
    pub fn trilinear_sample(&self, world: &Point3<f64>) -> Option<f64> {
        let voxel = self.affine.world_to_voxel(world);
        if !self.in_bounds_voxel(&voxel) {
            return None;
        }
        let ([x0, x1], [y0, y1], [z0, z1], [fx, fy, fz]) =
            trilinear_corners(&voxel, self.shape());

        let d = &self.data;
        let c000 = d[[x0, y0, z0]] as f64;
        let c100 = d[[x1, y0, z0]] as f64;
        let c010 = d[[x0, y1, z0]] as f64;
        let c110 = d[[x1, y1, z0]] as f64;
        let c001 = d[[x0, y0, z1]] as f64;
        let c101 = d[[x1, y0, z1]] as f64;
        let c011 = d[[x0, y1, z1]] as f64;
        let c111 = d[[x1, y1, z1]] as f64;

        let c00 = c000.mul_add(1.0 - fx, c100 * fx);
        let c10 = c010.mul_add(1.0 - fx, c110 * fx);
        let c01 = c001.mul_add(1.0 - fx, c101 * fx);
        let c11 = c011.mul_add(1.0 - fx, c111 * fx);

        let c0 = c00.mul_add(1.0 - fy, c10 * fy);
        let c1 = c01.mul_add(1.0 - fy, c11 * fy);

        Some(c0.mul_add(1.0 - fz, c1 * fz))
    }
}

impl MaskVolume {
    /// Nearest-voxel membership test at a world coordinate; `false` outside the grid.
    #[inline]
    pub fn contains_world(&self, world: &Point3<f64>) -> bool {
        self.get_nearest_world(world).unwrap_or(false)
    }

    /// Build a binary mask by thresholding a scalar volume (`value > threshold`).
    pub fn from_scalar(volume: &ScalarVolume, threshold: f32) -> Self {
        let data = volume.data().mapv(|v| v > threshold);
        Self::new(data, volume.affine().clone())
    }
}
