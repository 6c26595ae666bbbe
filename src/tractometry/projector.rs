//! Projection of a bundle tractogram onto a scalar metric.
//!
//! Every streamline is resampled to a fixed number of points along its
//! normalized arc length, the metric volume is trilinearly sampled at each
//! point, and the per-point values are averaged across the bundle. The
//! per-streamline work is independent and merged with a running
//! (sum, count) accumulator per point — associative and commutative, so the
//! result does not depend on worker scheduling order.
//!
//! Undefined samples (points falling outside the metric grid) are excluded
//! from that point's average rather than forced to zero; a point with no
//! valid samples at all yields `NaN`.

use rayon::prelude::*;

use crate::streamline::Tractogram;
use crate::volume::ScalarVolume;

/// Per-point running sums and sample counts.
#[derive(Debug, Clone)]
struct PointAccumulator {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl PointAccumulator {
    fn new(nr_points: usize) -> Self {
        Self {
            sums: vec![0.0; nr_points],
            counts: vec![0; nr_points],
        }
    }

    fn add(mut self, samples: &[Option<f64>]) -> Self {
        for (i, sample) in samples.iter().enumerate() {
            if let Some(v) = sample {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        for i in 0..self.sums.len() {
            self.sums[i] += other.sums[i];
            self.counts[i] += other.counts[i];
        }
        self
    }

    fn means(self) -> Vec<f64> {
        self.sums
            .into_iter()
            .zip(self.counts)
            .map(|(s, c)| if c > 0 { s / c as f64 } else { f64::NAN })
            .collect()
    }
}

/// Mean metric profile of one bundle.
///
/// Arguments
/// -----------------
/// * `tractogram`: the bundle's (filtered, canonically oriented) streamlines.
/// * `metric`: scalar volume to sample (e.g. an anisotropy map).
/// * `nr_points`: fixed profile length N.
///
/// Return
/// ----------
/// * N values; positions with no valid sample are `NaN`. An empty tractogram
///   yields an all-NaN profile — a reportable condition, not an error.
pub fn bundle_profile(
    tractogram: &Tractogram,
    metric: &ScalarVolume,
    nr_points: usize,
) -> Vec<f64> {
    tractogram
        .streamlines()
        .par_iter()
        .filter_map(|streamline| streamline.resample(nr_points))
        .map(|resampled| {
            resampled
                .points()
                .iter()
                .map(|p| metric.trilinear_sample(p))
                .collect::<Vec<Option<f64>>>()
        })
        .fold(
            || PointAccumulator::new(nr_points),
            |acc, samples| acc.add(&samples),
        )
        .reduce(|| PointAccumulator::new(nr_points), PointAccumulator::merge)
        .means()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamline::{ReferenceSpace, Streamline};
    use crate::volume::VoxelAffine;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use ndarray::Array3;

    fn ramp_metric() -> ScalarVolume {
        // metric value = x coordinate
        let data = Array3::from_shape_fn((10, 10, 10), |(x, _, _)| x as f32);
        ScalarVolume::new(data, VoxelAffine::identity())
    }

    fn space() -> ReferenceSpace {
        ReferenceSpace {
            dims: [10, 10, 10],
            voxel_size: [1.0, 1.0, 1.0],
            affine: VoxelAffine::identity(),
        }
    }

    fn x_line(x0: f64, x1: f64, y: f64) -> Streamline {
        Streamline::new(vec![Point3::new(x0, y, 5.0), Point3::new(x1, y, 5.0)])
    }

    #[test]
    fn profile_has_exact_length_and_values() {
        let tractogram = Tractogram::new(vec![x_line(0.0, 9.0, 4.0)], space());
        let profile = bundle_profile(&tractogram, &ramp_metric(), 10);
        assert_eq!(profile.len(), 10);
        for (i, v) in profile.iter().enumerate() {
            assert_relative_eq!(*v, i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn averaging_across_streamlines() {
        // Two identical-geometry lines at different y: ramp metric depends
        // only on x, so the average equals the single-line profile.
        let tractogram = Tractogram::new(
            vec![x_line(0.0, 9.0, 2.0), x_line(0.0, 9.0, 7.0)],
            space(),
        );
        let profile = bundle_profile(&tractogram, &ramp_metric(), 5);
        let expected = [0.0, 2.25, 4.5, 6.75, 9.0];
        for (v, e) in profile.iter().zip(expected) {
            assert_relative_eq!(*v, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn empty_bundle_is_all_nan() {
        let tractogram = Tractogram::new(vec![], space());
        let profile = bundle_profile(&tractogram, &ramp_metric(), 7);
        assert_eq!(profile.len(), 7);
        assert!(profile.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn out_of_bounds_samples_are_excluded() {
        // One streamline inside, one sticking out of the grid on the -x side:
        // points of the second line outside the grid must not drag the mean
        // toward zero.
        let inside = x_line(0.0, 9.0, 4.0);
        let outside = Streamline::new(vec![
            Point3::new(-20.0, 4.0, 5.0),
            Point3::new(-11.0, 4.0, 5.0),
        ]);
        let tractogram = Tractogram::new(vec![inside, outside], space());
        let profile = bundle_profile(&tractogram, &ramp_metric(), 10);
        for (i, v) in profile.iter().enumerate() {
            assert_relative_eq!(*v, i as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn single_point_streamlines_are_skipped() {
        let degenerate = Streamline::new(vec![Point3::new(3.0, 3.0, 3.0)]);
        let tractogram = Tractogram::new(vec![degenerate], space());
        let profile = bundle_profile(&tractogram, &ramp_metric(), 4);
        assert!(profile.iter().all(|v| v.is_nan()));
    }
}
