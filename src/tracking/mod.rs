//! # Streamline tracking parameters and engine
//!
//! This module defines the [`TrackingParams`] configuration struct and its
//! builder, which control how the streamline integrator seeds, propagates, and
//! accepts candidate streamlines, plus the integrator and filter themselves.
//!
//! ## Pipeline overview
//!
//! 1. **Seeding**
//!    Seed points are drawn uniformly from the seed mask's voxels with
//!    optional sub-voxel jitter, all from one caller-seeded RNG, so a fixed
//!    `rng_seed` reproduces the exact seed sequence.
//!
//! 2. **Propagation**
//!    Each seed is tracked forward and backward through the orientation field
//!    with a two-stage Runge–Kutta step (midpoint direction average), under a
//!    curvature constraint and inside the (optionally dilated) tracking mask.
//!    The two passes start along antipodal directions and are concatenated
//!    into one continuous streamline.
//!
//! 3. **Acceptance**
//!    Streamlines shorter than `min_points` points or `min_length_mm` arc
//!    length are rejected; batches of new seeds are drawn until the target
//!    count is met or the attempt budget is exhausted. The shortfall, if any,
//!    is reported — never silently swallowed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tractus::tracking::TrackingParams;
//!
//! let params = TrackingParams::builder()
//!     .nr_fibers(2000)
//!     .step_size_mm(0.7)
//!     .max_angle_deg(60.0)
//!     .tracking_dilation(1)
//!     .rng_seed(42)
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## See also
//!
//! * [`integrator::StreamlineIntegrator`] – seeding and propagation.
//! * [`filter::StreamlineFilter`] – length pruning, endpoint filtering, and
//!   orientation canonicalization.

use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use crate::constants::{Degree, Millimeter};
use crate::tractus_errors::TractusError;

pub mod filter;
pub mod integrator;

pub use filter::{FilterReport, StreamlineFilter};
pub use integrator::{StopReason, StreamlineIntegrator, TrackingReport};

/// Configuration parameters controlling streamline tracking.
///
/// Fields
/// -----------------
/// **Seeding / acceptance**
/// * `nr_fibers` – target number of accepted streamlines.
/// * `seed_batch_size` – seeds drawn (and tracked in parallel) per batch.
/// * `max_attempt_factor` – attempt budget as a multiple of `nr_fibers`;
///   tracking stops with a reported shortfall once
///   `nr_fibers × max_attempt_factor` seeds have been tried.
/// * `jitter` – sub-voxel uniform jitter of seed positions within the voxel
///   (deterministic under `rng_seed`).
/// * `rng_seed` – seed for the tracking RNG; fixed seed ⇒ byte-identical
///   output for identical inputs.
///
/// **Propagation**
/// * `step_size_mm` – fixed integration step length.
/// * `max_nr_steps` – per-pass step budget, guaranteeing termination.
/// * `max_angle_deg` – maximum turning angle between consecutive steps;
///   larger kinks terminate the pass (anatomically implausible).
/// * `min_peak_magnitude` – interpolated field magnitude below which the
///   field counts as exhausted.
/// * `tracking_dilation` – voxel radius by which the seed mask is dilated to
///   form the valid-tracking region (tolerates field noise at boundaries).
///
/// **Acceptance thresholds**
/// * `min_points` – minimum point count of an accepted streamline.
/// * `min_length_mm` – minimum arc length of an accepted streamline.
///
/// Defaults
/// -----------------
/// * `nr_fibers`: 2000, `seed_batch_size`: 1000, `max_attempt_factor`: 10
/// * `step_size_mm`: 0.7, `max_nr_steps`: 1000, `max_angle_deg`: 60.0
/// * `min_peak_magnitude`: 0.3, `tracking_dilation`: 0
/// * `min_points`: 2, `min_length_mm`: 0.0, `jitter`: true, `rng_seed`: 42
#[derive(Debug, Clone)]
pub struct TrackingParams {
    // --- Seeding / acceptance ---
    pub nr_fibers: usize,
    pub seed_batch_size: usize,
    pub max_attempt_factor: usize,
    pub jitter: bool,
    pub rng_seed: u64,

    // --- Propagation ---
    pub step_size_mm: Millimeter,
    pub max_nr_steps: usize,
    pub max_angle_deg: Degree,
    pub min_peak_magnitude: f64,
    pub tracking_dilation: usize,

    // --- Acceptance thresholds ---
    pub min_points: usize,
    pub min_length_mm: Millimeter,
}

impl TrackingParams {
    /// Construct with default values (equivalent to [`TrackingParams::default`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent builder over the defaults, validated at [`TrackingParamsBuilder::build`].
    pub fn builder() -> TrackingParamsBuilder {
        TrackingParamsBuilder::new()
    }

    /// Cosine of the maximum turning angle (precomputed by the integrator).
    pub(crate) fn min_direction_cosine(&self) -> f64 {
        (self.max_angle_deg * crate::constants::RADEG).cos()
    }
}

impl Default for TrackingParams {
    fn default() -> Self {
        TrackingParams {
            nr_fibers: 2000,
            seed_batch_size: 1000,
            max_attempt_factor: 10,
            jitter: true,
            rng_seed: 42,

            step_size_mm: 0.7,
            max_nr_steps: 1000,
            max_angle_deg: 60.0,
            min_peak_magnitude: 0.3,
            tracking_dilation: 0,

            min_points: 2,
            min_length_mm: 0.0,
        }
    }
}

/// Builder for [`TrackingParams`], with validation.
#[derive(Debug, Clone)]
pub struct TrackingParamsBuilder {
    params: TrackingParams,
}

impl Default for TrackingParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingParamsBuilder {
    /// Create a builder initialized with default values.
    pub fn new() -> Self {
        Self {
            params: TrackingParams::default(),
        }
    }

    // --- Seeding / acceptance ---
    pub fn nr_fibers(mut self, v: usize) -> Self {
        self.params.nr_fibers = v;
        self
    }
    pub fn seed_batch_size(mut self, v: usize) -> Self {
        self.params.seed_batch_size = v;
        self
    }
    pub fn max_attempt_factor(mut self, v: usize) -> Self {
        self.params.max_attempt_factor = v;
        self
    }
    pub fn jitter(mut self, v: bool) -> Self {
        self.params.jitter = v;
        self
    }
    pub fn rng_seed(mut self, v: u64) -> Self {
        self.params.rng_seed = v;
        self
    }

    // --- Propagation ---
    pub fn step_size_mm(mut self, v: Millimeter) -> Self {
        self.params.step_size_mm = v;
        self
    }
    pub fn max_nr_steps(mut self, v: usize) -> Self {
        self.params.max_nr_steps = v;
        self
    }
    pub fn max_angle_deg(mut self, v: Degree) -> Self {
        self.params.max_angle_deg = v;
        self
    }
    pub fn min_peak_magnitude(mut self, v: f64) -> Self {
        self.params.min_peak_magnitude = v;
        self
    }
    pub fn tracking_dilation(mut self, v: usize) -> Self {
        self.params.tracking_dilation = v;
        self
    }

    // --- Acceptance thresholds ---
    pub fn min_points(mut self, v: usize) -> Self {
        self.params.min_points = v;
        self
    }
    pub fn min_length_mm(mut self, v: Millimeter) -> Self {
        self.params.min_length_mm = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Return true iff a <= b and comparable (i.e., not NaN).
    #[inline]
    fn le(a: f64, b: f64) -> bool {
        matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
    }

    /// Finalize the builder and produce a [`TrackingParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `nr_fibers ≥ 1`, `seed_batch_size ≥ 1`, `max_attempt_factor ≥ 1`.
    /// * `step_size_mm > 0`, `max_nr_steps ≥ 1`.
    /// * `0 < max_angle_deg ≤ 90`.
    /// * `min_peak_magnitude ≥ 0`, `min_length_mm ≥ 0`.
    /// * `min_points ≥ 2` (a streamline needs two points to have a length).
    pub fn build(self) -> Result<TrackingParams, TractusError> {
        let p = &self.params;

        if p.nr_fibers == 0 {
            return Err(TractusError::InvalidTrackingParameter(
                "nr_fibers must be >= 1".into(),
            ));
        }
        if p.seed_batch_size == 0 {
            return Err(TractusError::InvalidTrackingParameter(
                "seed_batch_size must be >= 1".into(),
            ));
        }
        if p.max_attempt_factor == 0 {
            return Err(TractusError::InvalidTrackingParameter(
                "max_attempt_factor must be >= 1".into(),
            ));
        }
        if !Self::gt0(p.step_size_mm) {
            return Err(TractusError::InvalidTrackingParameter(
                "step_size_mm must be > 0".into(),
            ));
        }
        if p.max_nr_steps == 0 {
            return Err(TractusError::InvalidTrackingParameter(
                "max_nr_steps must be >= 1".into(),
            ));
        }
        if !(Self::gt0(p.max_angle_deg) && Self::le(p.max_angle_deg, 90.0)) {
            return Err(TractusError::InvalidTrackingParameter(
                "require 0 < max_angle_deg <= 90".into(),
            ));
        }
        if !Self::ge0(p.min_peak_magnitude) {
            return Err(TractusError::InvalidTrackingParameter(
                "min_peak_magnitude must be >= 0".into(),
            ));
        }
        if !Self::ge0(p.min_length_mm) {
            return Err(TractusError::InvalidTrackingParameter(
                "min_length_mm must be >= 0".into(),
            ));
        }
        if p.min_points < 2 {
            return Err(TractusError::InvalidTrackingParameter(
                "min_points must be >= 2".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for TrackingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Streamline Tracking Parameters")?;
            writeln!(f, "------------------------------")?;
            writeln!(f, "[Seeding / acceptance]")?;
            writeln!(f, "  nr_fibers          = {}", self.nr_fibers)?;
            writeln!(f, "  seed_batch_size    = {}", self.seed_batch_size)?;
            writeln!(f, "  max_attempt_factor = {}", self.max_attempt_factor)?;
            writeln!(f, "  jitter             = {}", self.jitter)?;
            writeln!(f, "  rng_seed           = {}", self.rng_seed)?;
            writeln!(f, "\n[Propagation]")?;
            writeln!(f, "  step_size_mm       = {:.3}", self.step_size_mm)?;
            writeln!(f, "  max_nr_steps       = {}", self.max_nr_steps)?;
            writeln!(f, "  max_angle_deg      = {:.1}", self.max_angle_deg)?;
            writeln!(f, "  min_peak_magnitude = {:.3}", self.min_peak_magnitude)?;
            writeln!(f, "  tracking_dilation  = {}", self.tracking_dilation)?;
            writeln!(f, "\n[Acceptance]")?;
            writeln!(f, "  min_points         = {}", self.min_points)?;
            writeln!(f, "  min_length_mm      = {:.2}", self.min_length_mm)?;
            Ok(())
        } else {
            write!(
                f,
                "TrackingParams(nr_fibers={}, step={:.2}mm, max_angle={:.0}°, min_mag={:.2}, dilation={}, min_points={}, seed={})",
                self.nr_fibers,
                self.step_size_mm,
                self.max_angle_deg,
                self.min_peak_magnitude,
                self.tracking_dilation,
                self.min_points,
                self.rng_seed,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_valid() {
        let params = TrackingParams::builder().build().unwrap();
        assert_eq!(params.nr_fibers, 2000);
        assert_eq!(params.min_points, 2);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(TrackingParams::builder().nr_fibers(0).build().is_err());
        assert!(TrackingParams::builder().step_size_mm(0.0).build().is_err());
        assert!(TrackingParams::builder()
            .step_size_mm(f64::NAN)
            .build()
            .is_err());
        assert!(TrackingParams::builder()
            .max_angle_deg(120.0)
            .build()
            .is_err());
        assert!(TrackingParams::builder().min_points(1).build().is_err());
    }
}
