//! Statistics entry point: subject-group profile tables → per-point
//! corrected statistics per bundle.
//!
//! Failures are isolated per bundle: the returned map holds one entry per
//! bundle, each `Ok(GroupStatsResult)` or `Err(TractusError)`, so one
//! bundle's bad data never aborts the whole comparison. Subjects missing a
//! bundle are excluded from that bundle only and summarized as warnings.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ahash::RandomState;
use camino::Utf8Path;
use itertools::Itertools;

use crate::constants::{BundleName, SubjectId};
use crate::stats::{
    correlation_stats, two_group_stats, GroupStatsParams, GroupStatsResult, ProfileMatrix,
};
use crate::tractometry::{read_profiles_csv, SubjectProfiles};
use crate::tractus_errors::TractusError;

/// Per-bundle statistics outcomes (per-bundle failure isolation).
pub type BundleStatsResults =
    HashMap<BundleName, Result<GroupStatsResult, TractusError>, RandomState>;

/// Warnings collected over one statistics run.
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    pub warnings: Vec<String>,
}

impl StatsReport {
    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.warnings.is_empty() {
            write!(f, "statistics: no warnings")
        } else {
            writeln!(f, "statistics: {} warning(s)", self.warnings.len())?;
            for w in &self.warnings {
                writeln!(f, "  - {w}")?;
            }
            Ok(())
        }
    }
}

/// Bundle names present in at least one subject row, sorted.
fn bundle_union(groups: &[&[SubjectProfiles]]) -> Vec<BundleName> {
    let mut names = BTreeSet::new();
    for group in groups {
        for subject in *group {
            names.extend(subject.bundles.keys().cloned());
        }
    }
    names.into_iter().collect()
}

/// Assemble one group's matrix for a bundle, excluding subjects that miss the
/// bundle or carry an all-NaN profile (insufficient data upstream).
fn matrix_for_bundle(
    label: &str,
    subjects: &[SubjectProfiles],
    bundle: &str,
    report: &mut StatsReport,
) -> ProfileMatrix {
    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for subject in subjects {
        match subject.bundles.get(bundle) {
            Some(profile) if profile.iter().any(|v| v.is_finite()) => {
                ids.push(subject.subject.clone());
                rows.push(profile.clone());
            }
            Some(_) => report.warn(format!(
                "bundle {bundle}: subject {} excluded (all-undefined profile)",
                subject.subject
            )),
            None => report.warn(format!(
                "bundle {bundle}: subject {} excluded (bundle missing)",
                subject.subject
            )),
        }
    }
    ProfileMatrix {
        label: label.to_string(),
        subjects: ids,
        rows,
    }
}

/// Two-group comparison over all bundles of two profile tables.
///
/// Arguments
/// -----------------
/// * `csv_a`, `csv_b`: per-group profile tables written by
///   [`crate::tractometry::write_profiles_csv`]; the file stems become the
///   group labels in error reports.
/// * `params`: validated statistics parameters.
///
/// Return
/// ----------
/// * One outcome per bundle plus the exclusion warnings. Reading either
///   table fails fatally (input-validity); everything after is per-bundle.
pub fn run_group_stats(
    csv_a: &Utf8Path,
    csv_b: &Utf8Path,
    params: &GroupStatsParams,
) -> Result<(BundleStatsResults, StatsReport), TractusError> {
    let group_a = read_profiles_csv(csv_a)?;
    let group_b = read_profiles_csv(csv_b)?;
    let label_a = csv_a.file_stem().unwrap_or("group_a").to_string();
    let label_b = csv_b.file_stem().unwrap_or("group_b").to_string();

    let mut report = StatsReport::default();
    let mut results = BundleStatsResults::default();

    for bundle in bundle_union(&[group_a.as_slice(), group_b.as_slice()]) {
        let a = matrix_for_bundle(&label_a, &group_a, &bundle, &mut report);
        let b = matrix_for_bundle(&label_b, &group_b, &bundle, &mut report);
        let outcome = two_group_stats(&a, &b, params);
        results.insert(bundle, outcome);
    }
    Ok((results, report))
}

/// Correlation analysis over all bundles of one profile table.
///
/// `covariate` maps subject → continuous value; subjects without a covariate
/// entry are excluded with a warning, non-finite values fail the affected
/// bundle's computation with the subject named.
pub fn run_correlation_stats(
    csv: &Utf8Path,
    covariate: &[(SubjectId, f64)],
    params: &GroupStatsParams,
) -> Result<(BundleStatsResults, StatsReport), TractusError> {
    let subjects = read_profiles_csv(csv)?;
    let label = csv.file_stem().unwrap_or("cohort").to_string();
    let lookup: HashMap<&SubjectId, f64, RandomState> =
        covariate.iter().map(|(s, v)| (s, *v)).collect();

    let mut report = StatsReport::default();
    let mut results = BundleStatsResults::default();

    for bundle in bundle_union(&[subjects.as_slice()]) {
        let mut matrix = matrix_for_bundle(&label, &subjects, &bundle, &mut report);
        // Keep only rows with a covariate entry, preserving row order.
        let mut values = Vec::new();
        let mut kept_ids = Vec::new();
        let mut kept_rows = Vec::new();
        for (id, row) in matrix.subjects.iter().zip(&matrix.rows) {
            match lookup.get(id) {
                Some(v) => {
                    values.push(*v);
                    kept_ids.push(id.clone());
                    kept_rows.push(row.clone());
                }
                None => report.warn(format!(
                    "bundle {bundle}: subject {id} excluded (no covariate)"
                )),
            }
        }
        matrix.subjects = kept_ids;
        matrix.rows = kept_rows;

        let outcome = correlation_stats(&matrix, &values, params);
        results.insert(bundle, outcome);
    }
    Ok((results, report))
}

/// Persist per-bundle, per-point statistics for external plotting.
///
/// Columns: `bundle, point, statistic, p_value`. Failed bundles are skipped
/// (their error is already in the results map).
pub fn write_stats_csv(
    path: &Utf8Path,
    results: &BundleStatsResults,
) -> Result<(), TractusError> {
    let mut writer = csv::Writer::from_path(path.as_std_path())?;
    writer.write_record(["bundle", "point", "statistic", "p_value"])?;

    for bundle in results.keys().sorted() {
        if let Ok(result) = &results[bundle] {
            for (i, (stat, p)) in result
                .statistic
                .iter()
                .zip(&result.p_values)
                .enumerate()
            {
                let record = [
                    bundle.to_string(),
                    i.to_string(),
                    stat.to_string(),
                    p.to_string(),
                ];
                writer.write_record(&record)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
