//! # Orientation peak fields
//!
//! An [`OrientationField`] is the read-only accessor over the per-voxel fiber
//! orientation data that tracking consumes: a 4D array of shape
//! `(nx, ny, nz, 3·P)` holding up to `P ≤ 3` peak vectors per voxel, plus the
//! voxel↔world affine. The field is produced externally (by a segmentation
//! model) and loaded once per run; nothing in this crate mutates it.
//!
//! ## Peak representation
//!
//! A peak is an **undirected** vector: `{v, −v}` denote the same fiber
//! orientation. Storage keeps whatever sign the producer wrote; consumers
//! resolve sign against a reference direction using `|dot|` scoring (see
//! [`sampler::OrientationSampler`]). Peak magnitude encodes amplitude and is
//! preserved — the sampler thresholds on interpolated magnitude to detect
//! field exhaustion.
//!
//! Voxels may hold fewer than `P` real peaks; absent slots are all-zero and
//! are dropped when reading a voxel's [`PeakSet`].

use nalgebra::{Point3, Vector3};
use ndarray::Array4;

use crate::constants::{PeakSet, MAX_PEAKS, ZERO_PEAK_EPS};
use crate::tractus_errors::TractusError;
use crate::volume::VoxelAffine;

pub mod sampler;

pub use sampler::OrientationSampler;

/// Per-voxel fiber orientation peaks with world-space metadata.
#[derive(Debug, Clone)]
pub struct OrientationField {
    data: Array4<f32>,
    affine: VoxelAffine,
    nr_peaks: usize,
}

impl OrientationField {
    /// Wrap a raw 4D peak array.
    ///
    /// Arguments
    /// -----------------
    /// * `data`: shape `(nx, ny, nz, 3·P)` with `1 ≤ P ≤ 3`; the last axis
    ///   packs P peak vectors as `[x0, y0, z0, x1, y1, z1, …]`.
    /// * `affine`: voxel→world transform of the grid.
    ///
    /// Return
    /// ----------
    /// * The field, or [`TractusError::InvalidPeakField`] when the last axis
    ///   is not a multiple of 3 or holds more than [`MAX_PEAKS`] peaks.
    pub fn new(data: Array4<f32>, affine: VoxelAffine) -> Result<Self, TractusError> {
        let last = data.shape()[3];
        if last == 0 || last % 3 != 0 {
            return Err(TractusError::InvalidPeakField(format!(
                "last axis must be a non-empty multiple of 3, found {last}"
            )));
        }
        let nr_peaks = last / 3;
        if nr_peaks > MAX_PEAKS {
            return Err(TractusError::InvalidPeakField(format!(
                "at most {MAX_PEAKS} peaks per voxel supported, found {nr_peaks}"
            )));
        }
        Ok(Self {
            data,
            affine,
            nr_peaks,
        })
    }

    /// Grid dimensions `(nx, ny, nz)`.
    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    /// Number of peak slots per voxel.
    pub fn nr_peaks(&self) -> usize {
        self.nr_peaks
    }

    /// The voxel↔world transform.
    pub fn affine(&self) -> &VoxelAffine {
        &self.affine
    }

    /// The peaks stored at a voxel, dropping near-zero (absent) slots.
    ///
    /// Storage order is preserved: the first listed peak is the first stored,
    /// which is what makes the correspondence tie-break deterministic.
    pub fn peaks_at(&self, index: [usize; 3]) -> PeakSet {
        let mut peaks = PeakSet::new();
        for p in 0..self.nr_peaks {
            let v = Vector3::new(
                self.data[[index[0], index[1], index[2], 3 * p]] as f64,
                self.data[[index[0], index[1], index[2], 3 * p + 1]] as f64,
                self.data[[index[0], index[1], index[2], 3 * p + 2]] as f64,
            );
            if v.norm() >= ZERO_PEAK_EPS {
                peaks.push(v);
            }
        }
        peaks
    }

    /// Whether a continuous voxel coordinate lies inside the grid.
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
}
