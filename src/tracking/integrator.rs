//! # Streamline integration over an orientation field
//!
//! Produce raw candidate streamlines from seeds drawn out of a seed mask,
//! propagating each seed forward and backward with a fixed-step two-stage
//! Runge–Kutta scheme, and collect per-run accounting into a
//! [`TrackingReport`].
//!
//! ## Execution model
//!
//! Seed positions are drawn **sequentially** from one seeded `StdRng`, then
//! each batch is tracked in parallel: every seed's passes read only the shared
//! immutable field and write their own streamline, so seeds are embarrassingly
//! parallel and the collected batch preserves seed order. The combination of a
//! sequential seed stream and order-preserving parallel map makes a run with a
//! fixed `rng_seed` byte-identical, regardless of worker count.
//!
//! ## Result model
//!
//! The run returns `(Tractogram, TrackingReport)`. A shortfall (achieved <
//! requested, because too many seeds terminated immediately or the attempt
//! budget ran out) is visible in the report and summarized by
//! [`TrackingReport::shortfall`]; it is deliberately not an error, mirroring
//! the per-unit isolation used throughout the crate.

use std::fmt;

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::constants::VoxelIndex;
use crate::peaks::{OrientationField, OrientationSampler};
use crate::streamline::{ReferenceSpace, Streamline, Tractogram};
use crate::tracking::TrackingParams;
use crate::tractus_errors::TractusError;
use crate::volume::MaskVolume;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Why a tracking pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sampler returned no direction (weak/absent peaks).
    FieldExhausted,
    /// Turning angle exceeded the curvature constraint.
    ExcessCurvature,
    /// Next position left the volume bounds.
    LeftVolume,
    /// Next position left the (dilated) tracking mask.
    LeftMask,
    /// Per-pass step budget reached.
    MaxSteps,
}

/// Per-reason pass-termination counts. Merged associatively across workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopTally {
    pub field_exhausted: usize,
    pub excess_curvature: usize,
    pub left_volume: usize,
    pub left_mask: usize,
    pub max_steps: usize,
}

impl StopTally {
    /// Record one pass termination.
    pub fn record(&mut self, reason: StopReason) {
        match reason {
            StopReason::FieldExhausted => self.field_exhausted += 1,
            StopReason::ExcessCurvature => self.excess_curvature += 1,
            StopReason::LeftVolume => self.left_volume += 1,
            StopReason::LeftMask => self.left_mask += 1,
            StopReason::MaxSteps => self.max_steps += 1,
        }
    }

    /// Associative merge of two tallies.
    pub fn merge(&mut self, other: &StopTally) {
        self.field_exhausted += other.field_exhausted;
        self.excess_curvature += other.excess_curvature;
        self.left_volume += other.left_volume;
        self.left_mask += other.left_mask;
        self.max_steps += other.max_steps;
    }
}

/// Run statistics of one tracking invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingReport {
    /// Target streamline count.
    pub requested: usize,
    /// Accepted streamline count (≤ requested).
    pub achieved: usize,
    /// Seeds tried in total.
    pub attempted: usize,
    /// Candidates rejected by the min-points/min-length acceptance rules.
    pub rejected_short: usize,
    /// Pass-termination tallies over all attempted seeds.
    pub stops: StopTally,
}

impl TrackingReport {
    /// How many requested streamlines could not be produced.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.achieved)
    }
}

impl fmt::Display for TrackingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Tracking Report")?;
            writeln!(f, "---------------")?;
            writeln!(f, "  requested      = {}", self.requested)?;
            writeln!(f, "  achieved       = {}", self.achieved)?;
            writeln!(f, "  attempted      = {}", self.attempted)?;
            writeln!(f, "  rejected_short = {}", self.rejected_short)?;
            writeln!(f, "  pass stops:")?;
            writeln!(f, "    field_exhausted  = {}", self.stops.field_exhausted)?;
            writeln!(f, "    excess_curvature = {}", self.stops.excess_curvature)?;
            writeln!(f, "    left_volume      = {}", self.stops.left_volume)?;
            writeln!(f, "    left_mask        = {}", self.stops.left_mask)?;
            writeln!(f, "    max_steps        = {}", self.stops.max_steps)?;
            Ok(())
        } else {
            write!(
                f,
                "TrackingReport(requested={}, achieved={}, attempted={}, rejected_short={})",
                self.requested, self.achieved, self.attempted, self.rejected_short
            )
        }
    }
}

/// Propagates candidate streamlines through a sampled orientation field.
///
/// Holds read-only references to the field and the seed mask plus the dilated
/// tracking mask derived at construction; nothing is mutated during a run, so
/// one integrator can serve concurrent callers.
#[derive(Debug)]
pub struct StreamlineIntegrator<'a> {
    sampler: OrientationSampler<'a>,
    seed_voxels: Vec<VoxelIndex>,
    tracking_mask: MaskVolume,
    space: ReferenceSpace,
    params: &'a TrackingParams,
}

impl<'a> StreamlineIntegrator<'a> {
    /// Wire an integrator to its inputs.
    ///
    /// Arguments
    /// -----------------
    /// * `field`: the orientation field (read-only for the whole run).
    /// * `seed_mask`: seedable region; also the base of the valid-tracking
    ///   region after dilation by `params.tracking_dilation`.
    /// * `params`: validated tracking parameters.
    ///
    /// Return
    /// ----------
    /// * The integrator, or [`TractusError::VolumeDimensionMismatch`] when
    ///   field and mask grids disagree.
    pub fn new(
        field: &'a OrientationField,
        seed_mask: &'a MaskVolume,
        params: &'a TrackingParams,
    ) -> Result<Self, TractusError> {
        if field.shape() != seed_mask.shape() {
            return Err(TractusError::VolumeDimensionMismatch {
                expected: field.shape(),
                found: seed_mask.shape(),
            });
        }
        Ok(Self {
            sampler: OrientationSampler::new(field, params.min_peak_magnitude),
            seed_voxels: seed_mask.true_voxels(),
            tracking_mask: seed_mask.dilate(params.tracking_dilation),
            space: ReferenceSpace::from_field(field),
            params,
        })
    }

    /// Track until the target count is met or the attempt budget is spent.
    ///
    /// Return
    /// ----------
    /// * The accepted tractogram (stable seed order, truncated to
    ///   `nr_fibers`) and the run report.
    pub fn run(&self) -> (Tractogram, TrackingReport) {
        let p = self.params;
        let mut rng = StdRng::seed_from_u64(p.rng_seed);

        let mut accepted: Vec<Streamline> = Vec::with_capacity(p.nr_fibers);
        let mut stops = StopTally::default();
        let mut attempted = 0usize;
        let mut rejected_short = 0usize;

        let cap = p.nr_fibers.saturating_mul(p.max_attempt_factor);

        #[cfg(feature = "progress")]
        let (bar, started) = {
            let bar = ProgressBar::new(p.nr_fibers as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} streamlines {msg}")
                    .expect("static template"),
            );
            (bar, std::time::Instant::now())
        };

        while !self.seed_voxels.is_empty() && accepted.len() < p.nr_fibers && attempted < cap {
            let batch = p.seed_batch_size.min(cap - attempted);
            let seeds: Vec<Point3<f64>> =
                (0..batch).map(|_| self.draw_seed(&mut rng)).collect();

            let results: Vec<(Streamline, StopTally)> = seeds
                .par_iter()
                .map(|seed| self.track_seed(seed))
                .collect();

            for (streamline, tally) in results {
                attempted += 1;
                stops.merge(&tally);
                if self.accepts(&streamline) {
                    accepted.push(streamline);
                } else {
                    rejected_short += 1;
                }
            }

            #[cfg(feature = "progress")]
            {
                bar.set_position(accepted.len().min(p.nr_fibers) as u64);
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    bar.set_message(format!("{:.0} seeds/s", attempted as f64 / elapsed));
                }
            }
        }

        accepted.truncate(p.nr_fibers);

        #[cfg(feature = "progress")]
        bar.finish_and_clear();

        let report = TrackingReport {
            requested: p.nr_fibers,
            achieved: accepted.len(),
            attempted,
            rejected_short,
            stops,
        };
        (Tractogram::new(accepted, self.space.clone()), report)
    }

    /// Whether a candidate passes the acceptance thresholds.
    fn accepts(&self, streamline: &Streamline) -> bool {
        streamline.len() >= self.params.min_points
            && streamline.arc_length() >= self.params.min_length_mm
    }

    /// Draw one seed position (world mm) from the seed mask.
    fn draw_seed(&self, rng: &mut StdRng) -> Point3<f64> {
        let v = self.seed_voxels[rng.random_range(0..self.seed_voxels.len())];
        let mut voxel = Point3::new(v[0] as f64, v[1] as f64, v[2] as f64);
        if self.params.jitter {
            voxel.x += rng.random::<f64>() - 0.5;
            voxel.y += rng.random::<f64>() - 0.5;
            voxel.z += rng.random::<f64>() - 0.5;
        }
        self.space.affine.voxel_to_world(&voxel)
    }

    /// Track one seed: forward pass, backward pass, concatenate.
    ///
    /// The two passes start along antipodal directions so their concatenation
    /// (reversed backward + seed + forward) is one continuous curve.
    fn track_seed(&self, seed: &Point3<f64>) -> (Streamline, StopTally) {
        let mut tally = StopTally::default();

        let Some(initial) = self.sampler.seed_direction(seed) else {
            tally.record(StopReason::FieldExhausted);
            return (Streamline::new(vec![*seed]), tally);
        };

        let (forward, stop_fwd) = self.propagate(seed, &initial);
        let (backward, stop_bwd) = self.propagate(seed, &(-initial));
        tally.record(stop_fwd);
        tally.record(stop_bwd);

        let mut points = Vec::with_capacity(backward.len() + 1 + forward.len());
        points.extend(backward.into_iter().rev());
        points.push(*seed);
        points.extend(forward);
        (Streamline::new(points), tally)
    }

    /// One directional pass from `seed` along `initial_dir`.
    ///
    /// Two-stage Runge–Kutta: the direction at the current position and at the
    /// half-step-ahead position are averaged, reducing drift versus a plain
    /// Euler step. When the half-step sample is empty (mask edge), the first
    /// stage alone is used for this step.
    fn propagate(
        &self,
        seed: &Point3<f64>,
        initial_dir: &Vector3<f64>,
    ) -> (Vec<Point3<f64>>, StopReason) {
        let p = self.params;
        let step = p.step_size_mm;
        let min_cos = p.min_direction_cosine();

        let mut points = Vec::new();
        let mut pos = *seed;
        let mut dir = *initial_dir;

        for _ in 0..p.max_nr_steps {
            let Some(d1) = self.sampler.sample(&pos, &dir) else {
                return (points, StopReason::FieldExhausted);
            };
            let half = pos + d1 * (0.5 * step);
            let d2 = self.sampler.sample(&half, &d1).unwrap_or(d1);
            let blended = d1 + d2;
            if blended.norm() < crate::constants::EPS {
                return (points, StopReason::FieldExhausted);
            }
            let d = blended.normalize();

            if d.dot(&dir) < min_cos {
                return (points, StopReason::ExcessCurvature);
            }

            let next = pos + d * step;
            if !self.space.contains_world(&next) {
                return (points, StopReason::LeftVolume);
            }
            if !self.tracking_mask.contains_world(&next) {
                return (points, StopReason::LeftMask);
            }

            points.push(next);
            pos = next;
            dir = d;
        }
        (points, StopReason::MaxSteps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VoxelAffine;
    use ndarray::{Array3, Array4};

    /// 20³ field, every voxel a unit +x peak; mask covering the full grid.
    fn x_field_and_mask() -> (OrientationField, MaskVolume) {
        let mut data = Array4::<f32>::zeros((20, 20, 20, 3));
        for x in 0..20 {
            for y in 0..20 {
                for z in 0..20 {
                    data[[x, y, z, 0]] = 1.0;
                }
            }
        }
        let field = OrientationField::new(data, VoxelAffine::identity()).unwrap();
        let mask = MaskVolume::new(Array3::from_elem((20, 20, 20), true), VoxelAffine::identity());
        (field, mask)
    }

    fn small_params() -> TrackingParams {
        TrackingParams::builder()
            .nr_fibers(50)
            .seed_batch_size(25)
            .rng_seed(7)
            .build()
            .unwrap()
    }

    #[test]
    fn run_is_deterministic() {
        let (field, mask) = x_field_and_mask();
        let params = small_params();
        let integrator = StreamlineIntegrator::new(&field, &mask, &params).unwrap();

        let (t1, r1) = integrator.run();
        let (t2, r2) = integrator.run();
        assert_eq!(r1, r2);
        assert_eq!(t1.len(), t2.len());
        for (a, b) in t1.streamlines().iter().zip(t2.streamlines()) {
            assert_eq!(a.points(), b.points());
        }
    }

    #[test]
    fn straight_field_gives_straight_streamlines() {
        let (field, mask) = x_field_and_mask();
        let params = small_params();
        let integrator = StreamlineIntegrator::new(&field, &mask, &params).unwrap();

        let (tractogram, report) = integrator.run();
        assert_eq!(report.achieved, 50);
        assert!(tractogram.all_points_in_bounds());

        for s in tractogram.streamlines() {
            let first = s.first().unwrap();
            let last = s.last().unwrap();
            // Propagation follows ±x only: y/z stay at the seed position.
            assert!((first.y - last.y).abs() < 1e-9);
            assert!((first.z - last.z).abs() < 1e-9);
            // Both passes run until the volume edge, so tracks span most of the grid.
            assert!(s.arc_length() > 10.0);
        }
    }

    #[test]
    fn empty_mask_reports_total_shortfall() {
        let (field, _) = x_field_and_mask();
        let mask = MaskVolume::new(
            Array3::from_elem((20, 20, 20), false),
            VoxelAffine::identity(),
        );
        let params = small_params();
        let integrator = StreamlineIntegrator::new(&field, &mask, &params).unwrap();
        let (tractogram, report) = integrator.run();
        assert!(tractogram.is_empty());
        assert_eq!(report.shortfall(), 50);
        assert_eq!(report.attempted, 0);
    }

    #[test]
    fn zero_field_reports_shortfall_with_attempts() {
        let data = Array4::<f32>::zeros((8, 8, 8, 3));
        let field = OrientationField::new(data, VoxelAffine::identity()).unwrap();
        let mask = MaskVolume::new(Array3::from_elem((8, 8, 8), true), VoxelAffine::identity());
        let params = TrackingParams::builder()
            .nr_fibers(10)
            .seed_batch_size(10)
            .max_attempt_factor(3)
            .build()
            .unwrap();
        let integrator = StreamlineIntegrator::new(&field, &mask, &params).unwrap();
        let (tractogram, report) = integrator.run();
        assert!(tractogram.is_empty());
        assert_eq!(report.attempted, 30);
        assert_eq!(report.shortfall(), 10);
        assert_eq!(report.stops.field_exhausted, 30);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let (field, _) = x_field_and_mask();
        let mask = MaskVolume::new(Array3::from_elem((10, 20, 20), true), VoxelAffine::identity());
        let params = small_params();
        assert!(matches!(
            StreamlineIntegrator::new(&field, &mask, &params),
            Err(TractusError::VolumeDimensionMismatch { .. })
        ));
    }
}
