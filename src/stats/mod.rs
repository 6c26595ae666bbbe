//! # Group statistics over tractometry profiles
//!
//! Given two subject groups' profile matrices (or one matrix plus a
//! continuous covariate), compute a test statistic independently at each of
//! the N profile points and correct for the N simultaneous, mutually
//! correlated tests with the max-statistic permutation procedure
//! (see [`permutation`]).
//!
//! ## Error semantics
//!
//! Input-validity problems — mismatched point counts between rows, a
//! non-finite covariate, a group with fewer than two usable subjects — are
//! fatal **for that statistical computation only** and carry the offending
//! subject identifiers. Batch callers (one computation per bundle) isolate
//! failures per bundle; see [`crate::pipeline::statistics`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::SubjectId;
use crate::tractus_errors::TractusError;

pub mod permutation;

pub use permutation::{pearson_r, welch_t};

/// Point-wise test selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupTest {
    /// Two-sample comparison (Welch's t).
    WelchT,
    /// Correlation against a continuous covariate (Pearson's r).
    PearsonR,
}

impl FromStr for GroupTest {
    type Err = TractusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "welch_t" | "t" | "group_comparison" => Ok(GroupTest::WelchT),
            "pearson_r" | "r" | "correlation" => Ok(GroupTest::PearsonR),
            other => Err(TractusError::InvalidStatsParameter(format!(
                "unknown test '{other}'"
            ))),
        }
    }
}

/// Configuration parameters for group statistics.
///
/// Fields
/// -----------------
/// * `test` – point-wise statistic (two-sample or correlation).
/// * `n_permutations` – label shuffles building the null distribution.
/// * `rng_seed` – permutation RNG seed; fixed seed ⇒ reproducible order.
/// * `correct_multiple_comparisons` – when `true` (default), p-values come
///   from the max-statistic null (family-wise error control); when `false`,
///   from each point's own permutation null (uncorrected).
///
/// Defaults: `WelchT`, 5000 permutations, seed 42, correction on.
#[derive(Debug, Clone)]
pub struct GroupStatsParams {
    pub test: GroupTest,
    pub n_permutations: usize,
    pub rng_seed: u64,
    pub correct_multiple_comparisons: bool,
}

impl GroupStatsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> GroupStatsParamsBuilder {
        GroupStatsParamsBuilder::new()
    }
}

impl Default for GroupStatsParams {
    fn default() -> Self {
        GroupStatsParams {
            test: GroupTest::WelchT,
            n_permutations: 5000,
            rng_seed: 42,
            correct_multiple_comparisons: true,
        }
    }
}

/// Builder for [`GroupStatsParams`], with validation.
#[derive(Debug, Clone)]
pub struct GroupStatsParamsBuilder {
    params: GroupStatsParams,
}

impl Default for GroupStatsParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStatsParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: GroupStatsParams::default(),
        }
    }

    pub fn test(mut self, v: GroupTest) -> Self {
        self.params.test = v;
        self
    }
    pub fn n_permutations(mut self, v: usize) -> Self {
        self.params.n_permutations = v;
        self
    }
    pub fn rng_seed(mut self, v: u64) -> Self {
        self.params.rng_seed = v;
        self
    }
    pub fn correct_multiple_comparisons(mut self, v: bool) -> Self {
        self.params.correct_multiple_comparisons = v;
        self
    }

    /// Finalize and validate (`n_permutations ≥ 1`).
    pub fn build(self) -> Result<GroupStatsParams, TractusError> {
        if self.params.n_permutations == 0 {
            return Err(TractusError::InvalidStatsParameter(
                "n_permutations must be >= 1".into(),
            ));
        }
        Ok(self.params)
    }
}

/// One group's profile matrix for a single bundle: rows = subjects.
#[derive(Debug, Clone)]
pub struct ProfileMatrix {
    /// Group label, used in error reports (e.g. `"patients"`).
    pub label: String,
    /// Subject identifier per row.
    pub subjects: Vec<SubjectId>,
    /// Profile rows; all rows must share one point count.
    pub rows: Vec<Vec<f64>>,
}

impl ProfileMatrix {
    /// Check row/subject arity and uniform point counts.
    ///
    /// Return
    /// ----------
    /// * The common point count, or the input-validity error naming the
    ///   offending subject.
    pub fn validate(&self) -> Result<usize, TractusError> {
        if self.rows.len() < 2 {
            return Err(TractusError::GroupTooSmall {
                group: self.label.clone(),
                size: self.rows.len(),
            });
        }
        let nr_points = self.rows[0].len();
        for (subject, row) in self.subjects.iter().zip(&self.rows) {
            if row.len() != nr_points {
                return Err(TractusError::ProfilePointCountMismatch {
                    subject: subject.to_string(),
                    expected: nr_points,
                    found: row.len(),
                });
            }
        }
        Ok(nr_points)
    }

    fn row_slices(&self) -> Vec<&[f64]> {
        self.rows.iter().map(|r| r.as_slice()).collect()
    }
}

/// Per-point statistics with multiple-comparison-corrected significance.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatsResult {
    /// Test statistic per profile point (NaN where undefined).
    pub statistic: Vec<f64>,
    /// Significance per point: corrected (max-statistic) or uncorrected,
    /// depending on the params flag. NaN where the statistic is NaN.
    pub p_values: Vec<f64>,
    /// The permutation null maxima (persisted for external plotting).
    pub null_maxima: Vec<f64>,
}

impl GroupStatsResult {
    /// Number of profile points summarized.
    pub fn len(&self) -> usize {
        self.statistic.len()
    }

    /// Whether the result covers no points.
    pub fn is_empty(&self) -> bool {
        self.statistic.is_empty()
    }

    /// Indices of points significant at `alpha`.
    pub fn significant_points(&self, alpha: f64) -> Vec<usize> {
        self.p_values
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| (p.is_finite() && p <= alpha).then_some(i))
            .collect()
    }
}

impl fmt::Display for GroupStatsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GroupStatsResult({} points, {} significant at 0.05)",
            self.len(),
            self.significant_points(0.05).len()
        )
    }
}

fn p_values_from_null(
    observed: &[f64],
    null: &permutation::PermutationNull,
    n_permutations: usize,
    corrected: bool,
) -> Vec<f64> {
    observed
        .iter()
        .enumerate()
        .map(|(j, &stat)| {
            if !stat.is_finite() {
                return f64::NAN;
            }
            let exceed = if corrected {
                null.maxima.iter().filter(|&&m| m >= stat.abs()).count()
            } else {
                null.exceedances[j]
            };
            (1 + exceed) as f64 / (n_permutations + 1) as f64
        })
        .collect()
}

/// Two-group point-wise comparison with permutation correction.
///
/// Arguments
/// -----------------
/// * `group_a`, `group_b`: per-group profile matrices for one bundle.
/// * `params`: validated statistics parameters (test must be a two-sample
///   statistic; `PearsonR` here is an input-validity error).
///
/// Return
/// ----------
/// * Per-point statistics and significance, or the input-validity error
///   identifying the offending group/subject. Nothing is partially computed
///   on error.
pub fn two_group_stats(
    group_a: &ProfileMatrix,
    group_b: &ProfileMatrix,
    params: &GroupStatsParams,
) -> Result<GroupStatsResult, TractusError> {
    if params.test != GroupTest::WelchT {
        return Err(TractusError::InvalidStatsParameter(
            "two_group_stats requires a two-sample test".into(),
        ));
    }
    let nr_points = group_a.validate()?;
    let nr_points_b = group_b.validate()?;
    if nr_points != nr_points_b {
        return Err(TractusError::ProfilePointCountMismatch {
            subject: format!("group {}", group_b.label),
            expected: nr_points,
            found: nr_points_b,
        });
    }

    let rows_a = group_a.row_slices();
    let rows_b = group_b.row_slices();
    let observed = permutation::two_group_statistic(&rows_a, &rows_b, nr_points);
    let null = permutation::permute_two_group(
        &rows_a,
        &rows_b,
        &observed,
        params.n_permutations,
        params.rng_seed,
    );
    let p_values = p_values_from_null(
        &observed,
        &null,
        params.n_permutations,
        params.correct_multiple_comparisons,
    );

    Ok(GroupStatsResult {
        statistic: observed,
        p_values,
        null_maxima: null.maxima,
    })
}

/// Point-wise correlation against a continuous covariate, with permutation
/// correction over covariate shuffles.
///
/// The covariate must be finite for every subject; the first offender is
/// reported by identifier.
pub fn correlation_stats(
    group: &ProfileMatrix,
    covariate: &[f64],
    params: &GroupStatsParams,
) -> Result<GroupStatsResult, TractusError> {
    if params.test != GroupTest::PearsonR {
        return Err(TractusError::InvalidStatsParameter(
            "correlation_stats requires a correlation test".into(),
        ));
    }
    let nr_points = group.validate()?;
    if covariate.len() != group.rows.len() {
        return Err(TractusError::InvalidStatsParameter(format!(
            "covariate has {} values for {} subjects",
            covariate.len(),
            group.rows.len()
        )));
    }
    for (subject, value) in group.subjects.iter().zip(covariate) {
        if !value.is_finite() {
            return Err(TractusError::NonFiniteCovariate(subject.to_string()));
        }
    }

    let rows = group.row_slices();
    let observed = permutation::correlation_statistic(&rows, covariate, nr_points);
    let null = permutation::permute_correlation(
        &rows,
        covariate,
        &observed,
        params.n_permutations,
        params.rng_seed,
    );
    let p_values = p_values_from_null(
        &observed,
        &null,
        params.n_permutations,
        params.correct_multiple_comparisons,
    );

    Ok(GroupStatsResult {
        statistic: observed,
        p_values,
        null_maxima: null.maxima,
    })
}
