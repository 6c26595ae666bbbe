//! Tracking entry point: peak field + seed mask → tractogram file.

use camino::Utf8Path;

use crate::io::nifti::{load_mask_volume, load_orientation_field};
use crate::io::{write_tractogram, StreamlineFormat};
use crate::tracking::{StreamlineIntegrator, TrackingParams, TrackingReport};
use crate::tractus_errors::TractusError;

/// Default threshold when binarizing the seed mask volume.
const SEED_MASK_THRESHOLD: f32 = 0.5;

/// Track a bundle and write the resulting tractogram.
///
/// Arguments
/// -----------------
/// * `peaks_path`: 4D NIfTI orientation peak field.
/// * `seed_mask_path`: NIfTI seed/tracking mask (same grid as the field).
/// * `output_path`: tractogram destination.
/// * `format`: streamline container variant to write.
/// * `params`: validated tracking parameters. With a fixed `rng_seed` and a
///   small `nr_fibers` this is the deterministic "test mode" used for exact
///   regression checks.
///
/// Return
/// ----------
/// * The [`TrackingReport`] (requested vs achieved count, attempt and
///   stop-reason tallies). A shortfall is reported, not an error; nothing is
///   written only when a fatal input-validity error occurs.
pub fn run_tracking(
    peaks_path: &Utf8Path,
    seed_mask_path: &Utf8Path,
    output_path: &Utf8Path,
    format: StreamlineFormat,
    params: &TrackingParams,
) -> Result<TrackingReport, TractusError> {
    let field = load_orientation_field(peaks_path)?;
    let seed_mask = load_mask_volume(seed_mask_path, SEED_MASK_THRESHOLD)?;

    let integrator = StreamlineIntegrator::new(&field, &seed_mask, params)?;
    let (tractogram, report) = integrator.run();

    write_tractogram(&tractogram, output_path, format)?;
    Ok(report)
}
