use thiserror::Error;

#[derive(Error, Debug)]
pub enum TractusError {
    #[error("Invalid tracking parameter: {0}")]
    InvalidTrackingParameter(String),

    #[error("Invalid tractometry parameter: {0}")]
    InvalidTractometryParameter(String),

    #[error("Invalid statistics parameter: {0}")]
    InvalidStatsParameter(String),

    #[error("Volume dimension mismatch: expected {expected:?}, found {found:?}")]
    VolumeDimensionMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Voxel-to-world affine is singular (cannot be inverted)")]
    SingularAffine,

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Invalid orientation peak field: {0}")]
    InvalidPeakField(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("NIfTI read error: {0}")]
    NiftiError(#[from] nifti::NiftiError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Unsupported streamline format: {0}")]
    UnsupportedStreamlineFormat(String),

    #[error("Malformed streamline container: {0}")]
    MalformedTrackFile(String),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Endpoint mask not found for bundle: {0}")]
    MissingEndpointMask(String),

    #[error("Profile point count mismatch for subject {subject}: expected {expected}, found {found}")]
    ProfilePointCountMismatch {
        subject: String,
        expected: usize,
        found: usize,
    },

    #[error("Non-finite covariate value for subject {0}")]
    NonFiniteCovariate(String),

    #[error("Group '{group}' has only {size} usable subjects (need at least 2)")]
    GroupTooSmall { group: String, size: usize },

    #[error("Profile table is empty: {0}")]
    EmptyProfileTable(String),
}

impl PartialEq for TractusError {
    fn eq(&self, other: &Self) -> bool {
        use TractusError::*;
        match (self, other) {
            (InvalidTrackingParameter(a), InvalidTrackingParameter(b)) => a == b,
            (InvalidTractometryParameter(a), InvalidTractometryParameter(b)) => a == b,
            (InvalidStatsParameter(a), InvalidStatsParameter(b)) => a == b,
            (
                VolumeDimensionMismatch {
                    expected: ea,
                    found: fa,
                },
                VolumeDimensionMismatch {
                    expected: eb,
                    found: fb,
                },
            ) => ea == eb && fa == fb,
            (InvalidVolume(a), InvalidVolume(b)) => a == b,
            (InvalidPeakField(a), InvalidPeakField(b)) => a == b,

            // These errors carry non-comparable payloads: equality is same-variant
            (IoError(_), IoError(_)) => true,
            (NiftiError(_), NiftiError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (UnsupportedStreamlineFormat(a), UnsupportedStreamlineFormat(b)) => a == b,
            (MalformedTrackFile(a), MalformedTrackFile(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (MissingEndpointMask(a), MissingEndpointMask(b)) => a == b,
            (
                ProfilePointCountMismatch {
                    subject: sa,
                    expected: ea,
                    found: fa,
                },
                ProfilePointCountMismatch {
                    subject: sb,
                    expected: eb,
                    found: fb,
                },
            ) => sa == sb && ea == eb && fa == fb,
            (NonFiniteCovariate(a), NonFiniteCovariate(b)) => a == b,
            (
                GroupTooSmall {
                    group: ga,
                    size: za,
                },
                GroupTooSmall {
                    group: gb,
                    size: zb,
                },
            ) => ga == gb && za == zb,
            (EmptyProfileTable(a), EmptyProfileTable(b)) => a == b,

            // Unit variants
            (SingularAffine, SingularAffine) => true,

            _ => false,
        }
    }
}
