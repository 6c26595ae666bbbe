//! Trilinear orientation sampling with peak correspondence.
//!
//! Sampling a multi-peak field at a continuous coordinate is not a plain
//! componentwise interpolation: each of the eight surrounding voxels may store
//! several candidate peaks, and crossing-fiber voxels list them in arbitrary
//! order. Before blending, each neighbor's peak set is reduced to the single
//! peak that best corresponds to a **reference direction** — the incoming
//! streamline direction during tracking, or a deterministic initial peak at a
//! seed.
//!
//! Correspondence rules
//! -----------------
//! * The matching score is `|dot(peak̂, reference)|`: peaks are undirected, so
//!   sign must not influence the match.
//! * Ties: the **first-listed peak wins**. The scan uses a strict `>`
//!   comparison in storage order, so equal scores keep the earliest peak.
//!   This makes multi-peak tracking reproducible across runs and platforms.
//! * Matched peaks are sign-flipped into the reference hemisphere before
//!   weighting, then blended with the trilinear corner weights at their raw
//!   magnitude. Magnitude therefore decays where neighbors disagree or where
//!   peaks fade out, and the result is rejected once it drops below the
//!   minimum-magnitude threshold — the caller's termination signal.

use nalgebra::{Point3, Vector3};

use crate::constants::ZERO_PEAK_EPS;
use crate::peaks::OrientationField;
use crate::volume::trilinear_corners;

/// Sampler over an [`OrientationField`] at arbitrary world coordinates.
#[derive(Debug, Clone, Copy)]
pub struct OrientationSampler<'a> {
    field: &'a OrientationField,
    min_magnitude: f64,
}

impl<'a> OrientationSampler<'a> {
    /// Create a sampler with the given minimum interpolated magnitude.
    ///
    /// Arguments
    /// -----------------
    /// * `field`: the orientation field to sample.
    /// * `min_magnitude`: interpolated vectors shorter than this are treated
    ///   as "no direction" (field exhaustion).
    pub fn new(field: &'a OrientationField, min_magnitude: f64) -> Self {
        Self {
            field,
            min_magnitude,
        }
    }

    /// The underlying field.
    pub fn field(&self) -> &'a OrientationField {
        self.field
    }

    /// Sample a plausible fiber direction at a world coordinate.
    ///
    /// Arguments
    /// -----------------
    /// * `world`: query position in world millimeters.
    /// * `reference`: direction used to resolve peak correspondence and sign,
    ///   normally the previous step direction (unit length).
    ///
    /// Return
    /// ----------
    /// * `Some(direction)` — unit vector in the hemisphere of `reference`.
    /// * `None` — outside the grid, no usable peaks, or interpolated magnitude
    ///   below the threshold. Callers terminate the current pass; this is a
    ///   recoverable condition, never an error.
    pub fn sample(&self, world: &Point3<f64>, reference: &Vector3<f64>) -> Option<Vector3<f64>> {
        let voxel = self.field.affine().world_to_voxel(world);
        if !self.field.in_bounds_voxel(&voxel) {
            return None;
        }

        let ([x0, x1], [y0, y1], [z0, z1], [fx, fy, fz]) =
            trilinear_corners(&voxel, self.field.shape());

        let corners = [
            ([x0, y0, z0], (1.0 - fx) * (1.0 - fy) * (1.0 - fz)),
            ([x1, y0, z0], fx * (1.0 - fy) * (1.0 - fz)),
            ([x0, y1, z0], (1.0 - fx) * fy * (1.0 - fz)),
            ([x1, y1, z0], fx * fy * (1.0 - fz)),
            ([x0, y0, z1], (1.0 - fx) * (1.0 - fy) * fz),
            ([x1, y0, z1], fx * (1.0 - fy) * fz),
            ([x0, y1, z1], (1.0 - fx) * fy * fz),
            ([x1, y1, z1], fx * fy * fz),
        ];

        let mut blended = Vector3::zeros();
        for (index, weight) in corners {
            if weight == 0.0 {
                continue;
            }
            if let Some(peak) = best_matching_peak(self.field, index, reference) {
                blended += weight * peak;
            }
        }

        if blended.norm() < self.min_magnitude {
            return None;
        }
        Some(blended.normalize())
    }

    /// Deterministic initial direction at a seed point.
    ///
    /// With no incoming direction yet, the reference is the first listed peak
    /// of the voxel nearest the seed. Forward and backward passes then start
    /// from this direction and its antipode.
    pub fn seed_direction(&self, world: &Point3<f64>) -> Option<Vector3<f64>> {
        let voxel = self.field.affine().world_to_voxel(world);
        if !self.field.in_bounds_voxel(&voxel) {
            return None;
        }
        let index = [
            voxel.x.round() as usize,
            voxel.y.round() as usize,
            voxel.z.round() as usize,
        ];
        let peaks = self.field.peaks_at(index);
        let reference = peaks.first()?.normalize();
        self.sample(world, &reference)
    }
}

/// The peak at `index` most nearly aligned with `reference`, sign-flipped into
/// the reference hemisphere. `None` when the voxel has no usable peaks.
#[inline]
fn best_matching_peak(
    field: &OrientationField,
    index: [usize; 3],
    reference: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let mut best: Option<(f64, Vector3<f64>)> = None;
    for peak in field.peaks_at(index) {
        let norm = peak.norm();
        if norm < ZERO_PEAK_EPS {
            continue;
        }
        let dot = peak.dot(reference) / norm;
        let score = dot.abs();
        // Strict > keeps the first-listed peak on ties.
        if best.map_or(true, |(s, _)| score > s) {
            let oriented = if dot < 0.0 { -peak } else { peak };
            best = Some((score, oriented));
        }
    }
    best.map(|(_, v)| v)
}
