//! # Streamline container and volume I/O
//!
//! All persistence of the [`Tractogram`](crate::streamline::Tractogram) data
//! model goes through this module's single read/write interface; the on-disk
//! container is a **configuration choice** ([`StreamlineFormat`]), not a
//! structural branch in the algorithms.
//!
//! Two containers are supported for compatibility with external
//! visualization and tractometry tools:
//!
//! * [`StreamlineFormat::Trk`] – the legacy TrackVis container (binary header
//!   with grid geometry, points in voxel-mm convention).
//! * [`StreamlineFormat::Tck`] – the modern MRtrix container (text header,
//!   Float32LE world-coordinate triplets).
//!
//! Volume inputs (scalar metrics, masks, orientation peak fields) are read
//! from NIfTI files in [`nifti`].

use std::str::FromStr;

use camino::Utf8Path;

use crate::streamline::{ReferenceSpace, Tractogram};
use crate::tractus_errors::TractusError;

pub mod nifti;
pub mod tck;
pub mod trk;

/// On-disk streamline container variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamlineFormat {
    /// Legacy TrackVis `.trk` container.
    Trk,
    /// Modern MRtrix `.tck` container.
    Tck,
}

impl StreamlineFormat {
    /// The file extension conventionally used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            StreamlineFormat::Trk => "trk",
            StreamlineFormat::Tck => "tck",
        }
    }

    /// Infer the format from a file path's extension.
    pub fn from_path(path: &Utf8Path) -> Result<Self, TractusError> {
        match path.extension() {
            Some(ext) => ext.parse(),
            None => Err(TractusError::UnsupportedStreamlineFormat(format!(
                "no extension on {path}"
            ))),
        }
    }
}

impl FromStr for StreamlineFormat {
    type Err = TractusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trk" => Ok(StreamlineFormat::Trk),
            "tck" => Ok(StreamlineFormat::Tck),
            other => Err(TractusError::UnsupportedStreamlineFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for StreamlineFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Write a tractogram in the chosen container format.
pub fn write_tractogram(
    tractogram: &Tractogram,
    path: &Utf8Path,
    format: StreamlineFormat,
) -> Result<(), TractusError> {
    match format {
        StreamlineFormat::Trk => trk::write_trk(tractogram, path),
        StreamlineFormat::Tck => tck::write_tck(tractogram, path),
    }
}

/// Read a tractogram from the chosen container format.
///
/// Arguments
/// -----------------
/// * `path`: container file.
/// * `format`: container variant (use [`StreamlineFormat::from_path`] to
///   infer it from the extension).
/// * `reference`: the grid the tractogram belongs to. TRK carries its own
///   geometry, which is checked against `reference`; TCK stores bare world
///   coordinates, so the reference supplies the grid.
pub fn read_tractogram(
    path: &Utf8Path,
    format: StreamlineFormat,
    reference: &ReferenceSpace,
) -> Result<Tractogram, TractusError> {
    match format {
        StreamlineFormat::Trk => trk::read_trk(path, reference),
        StreamlineFormat::Tck => tck::read_tck(path, reference),
    }
}
