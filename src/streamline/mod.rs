//! # Streamlines and tractograms
//!
//! A [`Streamline`] is an ordered sequence of world-coordinate points
//! approximating one fiber pathway; a [`Tractogram`] is an ordered collection
//! of streamlines sharing one reference grid ([`ReferenceSpace`]). Both are
//! produced by the tracking engine and consumed read-only by tractometry and
//! the serialization layer.
//!
//! ## Invariants
//!
//! * Consecutive streamline points are at most one integration step apart
//!   (guaranteed by the integrator's fixed-step construction).
//! * Arc length is monotonically non-decreasing along the point order.
//! * Every point of a freshly tracked tractogram lies inside the reference
//!   grid ([`Tractogram::all_points_in_bounds`] checks this; streamlines may
//!   later be clipped or filtered).

use nalgebra::Point3;

use crate::constants::Millimeter;
use crate::volume::{VoxelAffine, Volume};

/// One tracked fiber pathway: ordered points in world millimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct Streamline {
    points: Vec<Point3<f64>>,
}

impl Streamline {
    /// Wrap an ordered point sequence.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the streamline has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The ordered points.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// First point, if any.
    pub fn first(&self) -> Option<&Point3<f64>> {
        self.points.first()
    }

    /// Last point, if any.
    pub fn last(&self) -> Option<&Point3<f64>> {
        self.points.last()
    }

    /// Reverse the point order in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// A reversed copy.
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Total arc length in millimeters.
    pub fn arc_length(&self) -> Millimeter {
        self.points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .sum()
    }

    /// Cumulative arc length at every point (starts at 0).
    pub fn cumulative_lengths(&self) -> Vec<Millimeter> {
        let mut lengths = Vec::with_capacity(self.points.len());
        let mut acc = 0.0;
        lengths.push(0.0);
        for w in self.points.windows(2) {
            acc += (w[1] - w[0]).norm();
            lengths.push(acc);
        }
        lengths
    }

    /// Resample to exactly `nr_points` points, equidistant in normalized
    /// cumulative arc length (0 = first point, 1 = last point).
    ///
    /// Linear interpolation between adjacent original points; this is what
    /// makes streamlines of differing raw length comparable point-for-point
    /// in tractometry.
    ///
    /// Return
    /// ----------
    /// * `Some(streamline)` with exactly `nr_points` points for any input
    ///   with ≥ 2 points and `nr_points ≥ 2`.
    /// * `None` for degenerate inputs (recovered locally by callers).
    pub fn resample(&self, nr_points: usize) -> Option<Streamline> {
        if self.points.len() < 2 || nr_points < 2 {
            return None;
        }
        let cumulative = self.cumulative_lengths();
        let total = *cumulative.last().expect("non-empty by construction");
        if total <= 0.0 {
            // All points coincide; replicate the location.
            return Some(Streamline::new(vec![self.points[0]; nr_points]));
        }

        let mut resampled = Vec::with_capacity(nr_points);
        let mut segment = 0usize;
        for i in 0..nr_points {
            let target = total * (i as f64) / ((nr_points - 1) as f64);
            // cumulative is non-decreasing; advance the segment cursor.
            while segment + 2 < cumulative.len() && cumulative[segment + 1] < target {
                segment += 1;
            }
            let seg_start = cumulative[segment];
            let seg_len = cumulative[segment + 1] - seg_start;
            let t = if seg_len > 0.0 {
                ((target - seg_start) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let p = self.points[segment] + (self.points[segment + 1] - self.points[segment]) * t;
            resampled.push(p);
        }
        Some(Streamline::new(resampled))
    }
}

/// The grid a tractogram lives in: dimensions, voxel size, and affine of the
/// source volume. Carried through serialization so containers can reproduce
/// the original header geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpace {
    /// Grid dimensions (nx, ny, nz).
    pub dims: [usize; 3],
    /// Voxel edge lengths in mm.
    pub voxel_size: [f64; 3],
    /// Voxel→world transform.
    pub affine: VoxelAffine,
}

impl ReferenceSpace {
    /// Reference space of a loaded volume.
    pub fn from_volume<T>(volume: &Volume<T>) -> Self {
        Self {
            dims: volume.shape(),
            voxel_size: volume.affine().voxel_size(),
            affine: volume.affine().clone(),
        }
    }

    /// Reference space of an orientation field.
    pub fn from_field(field: &crate::peaks::OrientationField) -> Self {
        Self {
            dims: field.shape(),
            voxel_size: field.affine().voxel_size(),
            affine: field.affine().clone(),
        }
    }

    /// Whether a world coordinate lies inside the grid.
    #[inline]
    pub fn contains_world(&self, world: &Point3<f64>) -> bool {
        let v = self.affine.world_to_voxel(world);
        v.x >= 0.0
            && v.y >= 0.0
            && v.z >= 0.0
            && v.x <= (self.dims[0] - 1) as f64
            && v.y <= (self.dims[1] - 1) as f64
            && v.z <= (self.dims[2] - 1) as f64
    }
}

/// Ordered collection of streamlines in one reference space.
#[derive(Debug, Clone)]
pub struct Tractogram {
    streamlines: Vec<Streamline>,
    space: ReferenceSpace,
}

impl Tractogram {
    /// Assemble a tractogram.
    pub fn new(streamlines: Vec<Streamline>, space: ReferenceSpace) -> Self {
        Self { streamlines, space }
    }

    /// The streamlines, in stable (seed) order.
    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    /// Mutable access for filtering/canonicalization.
    pub fn streamlines_mut(&mut self) -> &mut Vec<Streamline> {
        &mut self.streamlines
    }

    /// The shared reference space.
    pub fn space(&self) -> &ReferenceSpace {
        &self.space
    }

    /// Number of streamlines.
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    /// Whether the tractogram holds no streamlines.
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// Whether every point of every streamline lies inside the reference grid.
    pub fn all_points_in_bounds(&self) -> bool {
        self.streamlines
            .iter()
            .flat_map(|s| s.points())
            .all(|p| self.space.contains_world(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(points: &[[f64; 3]]) -> Streamline {
        Streamline::new(points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect())
    }

    #[test]
    fn arc_length_is_monotone_sum() {
        let s = line(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 2.0, 0.0]]);
        assert_relative_eq!(s.arc_length(), 3.0, epsilon = 1e-12);
        let c = s.cumulative_lengths();
        assert_eq!(c.len(), 3);
        assert!(c.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn resample_exact_point_count() {
        for input_len in [2usize, 3, 7, 50] {
            let points: Vec<[f64; 3]> =
                (0..input_len).map(|i| [i as f64, 0.0, 0.0]).collect();
            let s = line(&points);
            for n in [2usize, 5, 10, 33] {
                let r = s.resample(n).unwrap();
                assert_eq!(r.len(), n);
            }
        }
    }

    #[test]
    fn resample_preserves_endpoints() {
        let s = line(&[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [5.0, 1.0, 2.0]]);
        let r = s.resample(10).unwrap();
        assert_relative_eq!(r.points()[0], s.points()[0], epsilon = 1e-12);
        assert_relative_eq!(r.points()[9], s.points()[2], epsilon = 1e-12);
    }

    #[test]
    fn resample_is_uniform_on_straight_line() {
        let s = line(&[[0.0, 0.0, 0.0], [9.0, 0.0, 0.0]]);
        let r = s.resample(10).unwrap();
        for (i, p) in r.points().iter().enumerate() {
            assert_relative_eq!(p.x, i as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn resample_degenerate_inputs() {
        assert!(line(&[[0.0, 0.0, 0.0]]).resample(10).is_none());
        assert!(line(&[]).resample(10).is_none());
        // coincident points: replicate location rather than divide by zero
        let s = line(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
        let r = s.resample(4).unwrap();
        assert_eq!(r.len(), 4);
        assert_relative_eq!(r.points()[3], Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn bounds_check_against_reference_space() {
        let space = ReferenceSpace {
            dims: [10, 10, 10],
            voxel_size: [1.0, 1.0, 1.0],
            affine: VoxelAffine::identity(),
        };
        let inside = Tractogram::new(vec![line(&[[0.0, 0.0, 0.0], [9.0, 9.0, 9.0]])], space.clone());
        assert!(inside.all_points_in_bounds());
        let outside = Tractogram::new(vec![line(&[[0.0, 0.0, 0.0], [9.5, 0.0, 0.0]])], space);
        assert!(!outside.all_points_in_bounds());
    }
}
