//! # Tractometry: fixed-length metric profiles along bundles
//!
//! Reduce each bundle's tractogram to one N-point scalar profile per subject
//! (see [`projector::bundle_profile`] for the numeric core), assemble the
//! per-subject profile tables, and exchange them as CSV — rows = subjects,
//! columns = bundle × point index.
//!
//! ## Orientation consistency
//!
//! Profiles are only comparable point-for-point because the filter
//! canonicalized every streamline's direction beforehand (first point in the
//! bundle's start region). Without that, point k of one streamline could be
//! the opposite anatomical end of point k in another, corrupting the average.
//!
//! ## Insufficient data
//!
//! A bundle with zero surviving streamlines produces an all-NaN profile and a
//! warning in the [`TractometryReport`]; the cohort step can then exclude
//! that subject/bundle without aborting the batch.

use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use camino::Utf8Path;

use crate::constants::{BundleProfiles, SubjectId};
use crate::io::StreamlineFormat;
use crate::tractus_errors::TractusError;

pub mod projector;

pub use projector::bundle_profile;

/// Configuration parameters for the tractometry projection.
///
/// Fields
/// -----------------
/// * `nr_points` – fixed profile length N (points per bundle).
/// * `format` – streamline container variant of the input tractograms.
/// * `mask_threshold` – threshold applied when reading endpoint masks.
///
/// Defaults: `nr_points` 100, `format` Trk, `mask_threshold` 0.5.
#[derive(Debug, Clone)]
pub struct TractometryParams {
    pub nr_points: usize,
    pub format: StreamlineFormat,
    pub mask_threshold: f32,
}

impl TractometryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TractometryParamsBuilder {
        TractometryParamsBuilder::new()
    }
}

impl Default for TractometryParams {
    fn default() -> Self {
        TractometryParams {
            nr_points: 100,
            format: StreamlineFormat::Trk,
            mask_threshold: 0.5,
        }
    }
}

/// Builder for [`TractometryParams`], with validation.
#[derive(Debug, Clone)]
pub struct TractometryParamsBuilder {
    params: TractometryParams,
}

impl Default for TractometryParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TractometryParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: TractometryParams::default(),
        }
    }

    pub fn nr_points(mut self, v: usize) -> Self {
        self.params.nr_points = v;
        self
    }

    pub fn format(mut self, v: StreamlineFormat) -> Self {
        self.params.format = v;
        self
    }

    pub fn mask_threshold(mut self, v: f32) -> Self {
        self.params.mask_threshold = v;
        self
    }

    /// Finalize and validate.
    ///
    /// Validation rules
    /// -----------------
    /// * `nr_points ≥ 2` (a profile needs distinct start and end samples).
    /// * `mask_threshold` finite and `≥ 0`.
    pub fn build(self) -> Result<TractometryParams, TractusError> {
        let p = self.params;
        if p.nr_points < 2 {
            return Err(TractusError::InvalidTractometryParameter(
                "nr_points must be >= 2".into(),
            ));
        }
        let threshold_ok = matches!(
            (p.mask_threshold as f64).partial_cmp(&0.0),
            Some(Greater) | Some(Equal)
        );
        if !threshold_ok {
            return Err(TractusError::InvalidTractometryParameter(
                "mask_threshold must be >= 0".into(),
            ));
        }
        Ok(p)
    }
}

/// One subject's per-bundle profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectProfiles {
    pub subject: SubjectId,
    pub bundles: BundleProfiles,
}

/// Warnings accumulated over one tractometry run (insufficient-data
/// conditions that were recovered per-bundle).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TractometryReport {
    pub warnings: Vec<String>,
}

impl TractometryReport {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for TractometryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.warnings.is_empty() {
            write!(f, "tractometry: no warnings")
        } else {
            writeln!(f, "tractometry: {} warning(s)", self.warnings.len())?;
            for w in &self.warnings {
                writeln!(f, "  - {w}")?;
            }
            Ok(())
        }
    }
}

/// Column label for a bundle/point pair (`CST_left__7`).
fn column_label(bundle: &str, point: usize) -> String {
    format!("{bundle}__{point}")
}

/// Split a column label back into bundle name and point index.
fn parse_column_label(label: &str) -> Result<(String, usize), TractusError> {
    let (bundle, point) = label.rsplit_once("__").ok_or_else(|| {
        TractusError::EmptyProfileTable(format!("malformed column label '{label}'"))
    })?;
    let point = point.parse::<usize>().map_err(|_| {
        TractusError::EmptyProfileTable(format!("malformed column label '{label}'"))
    })?;
    Ok((bundle.to_string(), point))
}

/// Write subject profile rows as CSV: `subject` column, then one column per
/// bundle × point index. NaN cells round-trip (`f64` formatting writes `NaN`).
pub fn write_profiles_csv(
    path: &Utf8Path,
    subjects: &[SubjectProfiles],
) -> Result<(), TractusError> {
    let first = subjects.first().ok_or_else(|| {
        TractusError::EmptyProfileTable("no subjects to write".into())
    })?;

    let mut writer = csv::Writer::from_path(path.as_std_path())?;

    let mut header = vec!["subject".to_string()];
    for (bundle, profile) in &first.bundles {
        for i in 0..profile.len() {
            header.push(column_label(bundle, i));
        }
    }
    writer.write_record(&header)?;

    for row in subjects {
        let mut record = vec![row.subject.to_string()];
        for (bundle, reference_profile) in &first.bundles {
            let profile = row.bundles.get(bundle).ok_or_else(|| {
                TractusError::EmptyProfileTable(format!(
                    "subject {} is missing bundle {bundle}",
                    row.subject
                ))
            })?;
            if profile.len() != reference_profile.len() {
                return Err(TractusError::ProfilePointCountMismatch {
                    subject: row.subject.to_string(),
                    expected: reference_profile.len(),
                    found: profile.len(),
                });
            }
            record.extend(profile.iter().map(|v| v.to_string()));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a subject-profile CSV written by [`write_profiles_csv`].
pub fn read_profiles_csv(path: &Utf8Path) -> Result<Vec<SubjectProfiles>, TractusError> {
    let mut reader = csv::Reader::from_path(path.as_std_path())?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() || &headers[0] != "subject" {
        return Err(TractusError::EmptyProfileTable(format!(
            "{path}: first column must be 'subject'"
        )));
    }
    let columns: Vec<(String, usize)> = headers
        .iter()
        .skip(1)
        .map(parse_column_label)
        .collect::<Result<_, _>>()?;

    let mut subjects = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != columns.len() + 1 {
            return Err(TractusError::EmptyProfileTable(format!(
                "{path}: row with {} fields, expected {}",
                record.len(),
                columns.len() + 1
            )));
        }
        let subject = SubjectId::from(&record[0]);
        let mut bundles = BundleProfiles::new();
        for ((bundle, _), raw) in columns.iter().zip(record.iter().skip(1)) {
            let value = raw.parse::<f64>().map_err(|_| {
                TractusError::EmptyProfileTable(format!(
                    "{path}: non-numeric cell '{raw}' for subject {subject}"
                ))
            })?;
            bundles.entry(bundle.clone()).or_default().push(value);
        }
        subjects.push(SubjectProfiles { subject, bundles });
    }

    if subjects.is_empty() {
        return Err(TractusError::EmptyProfileTable(format!(
            "{path}: no subject rows"
        )));
    }
    Ok(subjects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn profiles(subject: &str, values: &[(&str, Vec<f64>)]) -> SubjectProfiles {
        SubjectProfiles {
            subject: SubjectId::from(subject),
            bundles: values
                .iter()
                .map(|(b, v)| (b.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn params_validation() {
        assert!(TractometryParams::builder().nr_points(1).build().is_err());
        let p = TractometryParams::builder().nr_points(10).build().unwrap();
        assert_eq!(p.nr_points, 10);
    }

    #[test]
    fn csv_roundtrip_including_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("profiles.csv")).unwrap();

        let rows = vec![
            profiles(
                "sub-01",
                &[("AF_left", vec![1.0, 2.0, 3.0]), ("CST_left", vec![0.5, f64::NAN, 0.7])],
            ),
            profiles(
                "sub-02",
                &[("AF_left", vec![1.5, 2.5, 3.5]), ("CST_left", vec![0.6, 0.65, 0.8])],
            ),
        ];
        write_profiles_csv(&path, &rows).unwrap();
        let loaded = read_profiles_csv(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].subject, SubjectId::String("sub-01".into()));
        assert_eq!(loaded[0].bundles["AF_left"], vec![1.0, 2.0, 3.0]);
        assert!(loaded[0].bundles["CST_left"][1].is_nan());
        assert_eq!(loaded[1].bundles["CST_left"], vec![0.6, 0.65, 0.8]);
    }

    #[test]
    fn mismatched_point_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bad.csv")).unwrap();
        let rows = vec![
            profiles("a", &[("AF_left", vec![1.0, 2.0])]),
            profiles("b", &[("AF_left", vec![1.0])]),
        ];
        assert!(matches!(
            write_profiles_csv(&path, &rows),
            Err(TractusError::ProfilePointCountMismatch { .. })
        ));
    }

    #[test]
    fn column_labels_roundtrip() {
        let (bundle, point) = parse_column_label(&column_label("CC_7", 42)).unwrap();
        assert_eq!(bundle, "CC_7");
        assert_eq!(point, 42);
    }
}
