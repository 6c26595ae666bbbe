//! # Constants and type definitions for Tractus
//!
//! This module centralizes the **unit conventions**, **numeric defaults**, and **common type
//! definitions** used throughout the `tractus` library. It also defines key identifier and
//! container types for organizing subjects, bundles, and per-voxel peak sets.
//!
//! ## Overview
//!
//! - Spatial unit aliases (millimeters in world space, continuous voxel coordinates)
//! - Numeric tolerances shared by the sampling and integration code
//! - Identifiers for subjects and fiber bundles
//! - Container types for per-voxel orientation peaks and cohort profile tables
//!
//! These definitions are used by all main modules, including the orientation sampler,
//! the streamline integrator, and the tractometry/statistics engines.

use ahash::RandomState;
use nalgebra::Vector3;
use smallvec::SmallVec;
use std::collections::HashMap;

// -------------------------------------------------------------------------------------------------
// Numeric tolerances and bounds
// -------------------------------------------------------------------------------------------------

/// Numerical epsilon used for floating-point comparisons
pub const EPS: f64 = 1e-6;

/// Magnitude below which a stored peak vector is treated as absent
pub const ZERO_PEAK_EPS: f64 = 1e-6;

/// Maximum number of orientation peaks stored per voxel
pub const MAX_PEAKS: usize = 3;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Distance in millimeters (world space)
pub type Millimeter = f64;
/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Discrete voxel index (i, j, k)
pub type VoxelIndex = [usize; 3];

/// Name of a fiber bundle (e.g. `"CST_left"`)
pub type BundleName = String;

/// One voxel's set of orientation peaks.
///
/// Each entry is one locally dominant fiber direction. Peaks are **sign-ambiguous**:
/// a peak `v` and its negation `-v` denote the same orientation, so all similarity
/// comparisons elsewhere in the crate use `|dot|`, never the signed dot product.
/// The vector magnitude carries the peak amplitude (anisotropy-like confidence)
/// and participates in interpolation and thresholding.
///
/// Stored inline: fields have at most [`MAX_PEAKS`] peaks per voxel, so the
/// common case never heap-allocates.
pub type PeakSet = SmallVec<[Vector3<f64>; MAX_PEAKS]>;

// -------------------------------------------------------------------------------------------------
// Identifiers and data containers
// -------------------------------------------------------------------------------------------------

/// Identifier of a study subject.
///
/// This can be:
/// - A numeric cohort index (e.g. `Int(17)`)
/// - A string identifier from the study database (e.g. `"sub-CON03"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectId {
    /// Integer-based subject designation
    Int(u32),
    /// String-based subject designation
    String(String),
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectId::Int(n) => write!(f, "{n}"),
            SubjectId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        match value.parse::<u32>() {
            Ok(n) => SubjectId::Int(n),
            Err(_) => SubjectId::String(value.to_string()),
        }
    }
}

/// Per-bundle profile table for one subject: bundle name → N sampled metric values.
///
/// Profiles for bundles that produced no valid streamlines are present but filled
/// with `f64::NAN`; the accompanying report carries the warning.
pub type BundleProfiles = std::collections::BTreeMap<BundleName, Vec<f64>>;

/// Cohort-level profile container: subject → per-bundle profiles.
///
/// Uses `ahash::RandomState`, matching the default hasher used elsewhere in the crate.
pub type CohortProfiles = HashMap<SubjectId, BundleProfiles, RandomState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_id_from_str() {
        assert_eq!(SubjectId::from("42"), SubjectId::Int(42));
        assert_eq!(
            SubjectId::from("sub-CON03"),
            SubjectId::String("sub-CON03".to_string())
        );
    }

    #[test]
    fn peak_set_stays_inline() {
        let mut peaks = PeakSet::new();
        for _ in 0..MAX_PEAKS {
            peaks.push(Vector3::new(1.0, 0.0, 0.0));
        }
        assert!(!peaks.spilled());
    }
}
