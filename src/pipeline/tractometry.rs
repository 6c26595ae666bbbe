//! Tractometry entry point: per-bundle tractograms + endpoint masks + metric
//! volume → one profile row per subject.
//!
//! Bundle-level problems (missing tractogram, missing endpoint masks, zero
//! surviving streamlines) are recovered per bundle: the bundle's profile is
//! all-NaN and a warning lands in the [`TractometryReport`], so a batch over
//! many subjects never aborts because of one subject's data.

use camino::Utf8Path;

use crate::constants::SubjectId;
use crate::io::nifti::{load_mask_volume, load_scalar_volume};
use crate::io::read_tractogram;
use crate::pipeline::{bundle_stems, find_nifti};
use crate::streamline::ReferenceSpace;
use crate::tracking::StreamlineFilter;
use crate::tractometry::{
    bundle_profile, SubjectProfiles, TractometryParams, TractometryReport,
};
use crate::tractus_errors::TractusError;

/// Minimum points for a streamline to contribute to a profile.
const MIN_PROFILE_POINTS: usize = 2;

/// Project every bundle of one subject onto a scalar metric.
///
/// Arguments
/// -----------------
/// * `tractogram_dir`: one container file per bundle (`<bundle>.<ext>`).
/// * `endpoint_dir`: endpoint masks named `<bundle>_b` (start) and
///   `<bundle>_e` (end), as NIfTI.
/// * `metric_path`: scalar metric volume; also provides the reference grid.
/// * `subject`: identifier for the produced profile row.
/// * `params`: validated tractometry parameters.
///
/// Return
/// ----------
/// * The subject's per-bundle profiles (every discovered bundle present,
///   all-NaN where data was insufficient) and the warning report.
pub fn run_tractometry(
    tractogram_dir: &Utf8Path,
    endpoint_dir: &Utf8Path,
    metric_path: &Utf8Path,
    subject: SubjectId,
    params: &TractometryParams,
) -> Result<(SubjectProfiles, TractometryReport), TractusError> {
    let metric = load_scalar_volume(metric_path)?;
    let reference = ReferenceSpace::from_volume(&metric);

    let bundles = bundle_stems(tractogram_dir, params.format.extension())?;
    if bundles.is_empty() {
        return Err(TractusError::EmptyProfileTable(format!(
            "no .{} bundles in {tractogram_dir}",
            params.format.extension()
        )));
    }

    let mut report = TractometryReport::default();
    let mut profiles = SubjectProfiles {
        subject,
        bundles: Default::default(),
    };

    for bundle in &bundles {
        let profile = project_bundle(
            tractogram_dir,
            endpoint_dir,
            bundle,
            &metric,
            &reference,
            params,
            &mut report,
        );
        let profile = match profile {
            Ok(p) => p,
            Err(e) => {
                // Recover at bundle granularity; the warning keeps the data
                // loss visible in the final report.
                report.warn(format!("bundle {bundle}: {e}"));
                vec![f64::NAN; params.nr_points]
            }
        };
        profiles.bundles.insert(bundle.clone(), profile);
    }

    Ok((profiles, report))
}

fn project_bundle(
    tractogram_dir: &Utf8Path,
    endpoint_dir: &Utf8Path,
    bundle: &str,
    metric: &crate::volume::ScalarVolume,
    reference: &ReferenceSpace,
    params: &TractometryParams,
    report: &mut TractometryReport,
) -> Result<Vec<f64>, TractusError> {
    let tract_path = tractogram_dir.join(format!("{bundle}.{}", params.format.extension()));
    let tractogram = read_tractogram(&tract_path, params.format, reference)?;

    let start_path = find_nifti(endpoint_dir, &format!("{bundle}_b"))
        .ok_or_else(|| TractusError::MissingEndpointMask(format!("{bundle}_b")))?;
    let end_path = find_nifti(endpoint_dir, &format!("{bundle}_e"))
        .ok_or_else(|| TractusError::MissingEndpointMask(format!("{bundle}_e")))?;
    let start = load_mask_volume(&start_path, params.mask_threshold)?;
    let end = load_mask_volume(&end_path, params.mask_threshold)?;

    let filter = StreamlineFilter::new(MIN_PROFILE_POINTS, 0.0).with_endpoints(&start, &end);
    let (filtered, filter_report) = filter.apply(&tractogram);

    if filtered.is_empty() {
        report.warn(format!(
            "bundle {bundle}: no streamlines survive endpoint filtering ({filter_report})"
        ));
        return Ok(vec![f64::NAN; params.nr_points]);
    }

    Ok(bundle_profile(&filtered, metric, params.nr_points))
}
