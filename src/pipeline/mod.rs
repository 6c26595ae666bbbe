//! # Pipeline entry points
//!
//! File-level entry points wiring the engines together, one per external
//! interface: [`tracking`], [`tractometry`], and [`statistics`]. Command-line
//! parsing stays outside the crate; each entry point takes typed paths
//! ([`camino::Utf8Path`]) and a validated params struct, and returns a report
//! alongside its outputs.
//!
//! All entry points are deterministic under the seeds carried in their params
//! structs, which is how CI regression runs pin exact outputs (small
//! `nr_fibers` / `n_permutations`, fixed `rng_seed`).

use camino::{Utf8Path, Utf8PathBuf};

use crate::tractus_errors::TractusError;

pub mod statistics;
pub mod tracking;
pub mod tractometry;

/// List the file stems in `dir` carrying the given extension, sorted.
///
/// Used to discover per-bundle tractogram files (`CST_left.trk`, …); the sort
/// keeps bundle iteration order stable across platforms.
pub(crate) fn bundle_stems(dir: &Utf8Path, extension: &str) -> Result<Vec<String>, TractusError> {
    let mut stems = Vec::new();
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|p| TractusError::Utf8PathError(p.display().to_string()))?;
        if path.extension() == Some(extension) {
            if let Some(stem) = path.file_stem() {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

/// Resolve a NIfTI file `<dir>/<name>.nii[.gz]`, preferring the compressed
/// variant.
pub(crate) fn find_nifti(dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    for candidate in [format!("{name}.nii.gz"), format!("{name}.nii")] {
        let path = dir.join(candidate);
        if path.exists() {
            return Some(path);
        }
    }
    None
}
