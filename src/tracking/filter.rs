//! # Streamline filtering and orientation canonicalization
//!
//! Convert raw candidate streamlines into the accepted tractogram:
//!
//! * prune degenerate tracks (too few points / too short an arc),
//! * with endpoint masks, keep only streamlines whose two ends terminate in
//!   the two **distinct** designated regions,
//! * canonicalize direction so the first point always lies in the designated
//!   start region — the integrator's forward/backward labeling is arbitrary
//!   relative to anatomy, and tractometry averages would mix anatomical ends
//!   without this normalization.
//!
//! Canonicalization is idempotent: filtering a streamline and filtering its
//! reversed copy yield the identical canonical streamline.

use std::fmt;

use crate::constants::Millimeter;
use crate::streamline::{Streamline, Tractogram};
use crate::volume::MaskVolume;

/// Outcome counts of one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    /// Streamlines examined.
    pub input: usize,
    /// Streamlines kept (after canonicalization).
    pub kept: usize,
    /// Rejected by the point-count / arc-length rules.
    pub too_short: usize,
    /// Rejected because the ends do not join the two endpoint regions.
    pub endpoint_rejected: usize,
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilterReport(input={}, kept={}, too_short={}, endpoint_rejected={})",
            self.input, self.kept, self.too_short, self.endpoint_rejected
        )
    }
}

/// Post-processor turning raw candidate paths into the final tractogram.
#[derive(Debug, Clone, Copy)]
pub struct StreamlineFilter<'a> {
    min_points: usize,
    min_length_mm: Millimeter,
    endpoints: Option<(&'a MaskVolume, &'a MaskVolume)>,
}

impl<'a> StreamlineFilter<'a> {
    /// Length-only filter.
    pub fn new(min_points: usize, min_length_mm: Millimeter) -> Self {
        Self {
            min_points,
            min_length_mm,
            endpoints: None,
        }
    }

    /// Add endpoint-region filtering and orientation canonicalization.
    ///
    /// Arguments
    /// -----------------
    /// * `start`: the designated start ("beginnings") region — kept
    ///   streamlines are oriented so their first point lies here.
    /// * `end`: the designated end ("endings") region.
    pub fn with_endpoints(mut self, start: &'a MaskVolume, end: &'a MaskVolume) -> Self {
        self.endpoints = Some((start, end));
        self
    }

    /// Apply the filter to a tractogram.
    ///
    /// Return
    /// ----------
    /// * The filtered tractogram (same reference space, stable order) and the
    ///   outcome counts.
    pub fn apply(&self, tractogram: &Tractogram) -> (Tractogram, FilterReport) {
        let mut report = FilterReport {
            input: tractogram.len(),
            ..FilterReport::default()
        };

        let mut kept = Vec::with_capacity(tractogram.len());
        for streamline in tractogram.streamlines() {
            if streamline.len() < self.min_points
                || streamline.arc_length() < self.min_length_mm
            {
                report.too_short += 1;
                continue;
            }
            match self.canonicalize(streamline) {
                Some(s) => kept.push(s),
                None => report.endpoint_rejected += 1,
            }
        }

        report.kept = kept.len();
        (Tractogram::new(kept, tractogram.space().clone()), report)
    }

    /// Orient a streamline start-to-end, or reject it.
    ///
    /// Without endpoint masks every surviving streamline is kept as-is. With
    /// masks, exactly one of the two orientations must place the first point
    /// in the start region and the last in the end region; a streamline whose
    /// ends sit in the same region (or outside both) is discarded.
    fn canonicalize(&self, streamline: &Streamline) -> Option<Streamline> {
        let Some((start, end)) = self.endpoints else {
            return Some(streamline.clone());
        };
        let first = streamline.first()?;
        let last = streamline.last()?;

        let forward_ok = start.contains_world(first) && end.contains_world(last);
        let backward_ok = end.contains_world(first) && start.contains_world(last);

        match (forward_ok, backward_ok) {
            (true, false) => Some(streamline.clone()),
            (false, true) => Some(streamline.reversed()),
            // Both orientations admissible only when the regions overlap at
            // both ends; keep as-is.
            (true, true) => Some(streamline.clone()),
            (false, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamline::ReferenceSpace;
    use crate::volume::VoxelAffine;
    use nalgebra::Point3;
    use ndarray::Array3;

    fn space() -> ReferenceSpace {
        ReferenceSpace {
            dims: [10, 3, 3],
            voxel_size: [1.0, 1.0, 1.0],
            affine: VoxelAffine::identity(),
        }
    }

    /// Start region at x ∈ {0,1}, end region at x ∈ {8,9}.
    fn endpoint_masks() -> (MaskVolume, MaskVolume) {
        let mut start = Array3::from_elem((10, 3, 3), false);
        let mut end = Array3::from_elem((10, 3, 3), false);
        for y in 0..3 {
            for z in 0..3 {
                start[[0, y, z]] = true;
                start[[1, y, z]] = true;
                end[[8, y, z]] = true;
                end[[9, y, z]] = true;
            }
        }
        (
            MaskVolume::new(start, VoxelAffine::identity()),
            MaskVolume::new(end, VoxelAffine::identity()),
        )
    }

    fn track(xs: &[f64]) -> Streamline {
        Streamline::new(xs.iter().map(|&x| Point3::new(x, 1.0, 1.0)).collect())
    }

    #[test]
    fn short_streamlines_are_pruned() {
        let filter = StreamlineFilter::new(3, 0.0);
        let tractogram = Tractogram::new(
            vec![track(&[0.0, 1.0]), track(&[0.0, 1.0, 2.0])],
            space(),
        );
        let (kept, report) = filter.apply(&tractogram);
        assert_eq!(kept.len(), 1);
        assert_eq!(report.too_short, 1);
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn arc_length_pruning() {
        let filter = StreamlineFilter::new(2, 5.0);
        let tractogram = Tractogram::new(
            vec![track(&[0.0, 1.0, 2.0]), track(&[0.0, 3.0, 6.0])],
            space(),
        );
        let (kept, report) = filter.apply(&tractogram);
        assert_eq!(kept.len(), 1);
        assert_eq!(report.too_short, 1);
    }

    #[test]
    fn endpoint_filter_keeps_and_orients() {
        let (start, end) = endpoint_masks();
        let filter = StreamlineFilter::new(2, 0.0).with_endpoints(&start, &end);

        // Already canonical: kept unchanged.
        let forward = track(&[0.5, 3.0, 6.0, 9.0]);
        // Backwards relative to anatomy: must be reversed.
        let backward = track(&[9.0, 6.0, 3.0, 0.5]);
        // Both ends in the start region: rejected.
        let u_turn = track(&[0.5, 3.0, 1.0]);
        // Ends outside both regions: rejected.
        let stray = track(&[4.0, 5.0, 6.0]);

        let tractogram = Tractogram::new(
            vec![forward.clone(), backward, u_turn, stray],
            space(),
        );
        let (kept, report) = filter.apply(&tractogram);
        assert_eq!(report.kept, 2);
        assert_eq!(report.endpoint_rejected, 2);
        assert_eq!(kept.streamlines()[0], forward);
        assert_eq!(kept.streamlines()[1], forward);
    }

    #[test]
    fn canonicalization_is_idempotent_under_reversal() {
        let (start, end) = endpoint_masks();
        let filter = StreamlineFilter::new(2, 0.0).with_endpoints(&start, &end);

        let raw = track(&[0.5, 2.0, 5.0, 9.0]);
        let reversed = raw.reversed();

        let (a, _) = filter.apply(&Tractogram::new(vec![raw], space()));
        let (b, _) = filter.apply(&Tractogram::new(vec![reversed], space()));
        assert_eq!(a.streamlines()[0], b.streamlines()[0]);
    }
}
