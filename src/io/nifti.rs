//! NIfTI volume loading.
//!
//! Entry points consume three kinds of NIfTI inputs: scalar metric volumes,
//! binary masks, and 4D orientation peak fields (last axis packs up to three
//! peak vectors per voxel). All loaders return the crate's in-memory volume
//! types with the voxel→world affine extracted from the header: the sform
//! rows when `sform_code > 0`, otherwise a pixdim-scaled axis-aligned
//! fallback.

use camino::Utf8Path;
use nalgebra::Matrix4;
use ndarray::{Ix3, Ix4};
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};
use nifti::volume::ndarray::IntoNdArray;

use crate::peaks::OrientationField;
use crate::tractus_errors::TractusError;
use crate::volume::{MaskVolume, ScalarVolume, VoxelAffine};

/// Voxel→world affine from a NIfTI header.
pub fn affine_from_header(header: &NiftiHeader) -> Result<VoxelAffine, TractusError> {
    if header.sform_code > 0 {
        let mut m = Matrix4::identity();
        for (r, row) in [header.srow_x, header.srow_y, header.srow_z]
            .iter()
            .enumerate()
        {
            for c in 0..4 {
                m[(r, c)] = row[c] as f64;
            }
        }
        VoxelAffine::from_matrix(m)
    } else {
        VoxelAffine::from_spacing([
            header.pixdim[1] as f64,
            header.pixdim[2] as f64,
            header.pixdim[3] as f64,
        ])
    }
}

/// Load a 3D scalar volume (e.g. an anisotropy map).
pub fn load_scalar_volume(path: &Utf8Path) -> Result<ScalarVolume, TractusError> {
    let object = ReaderOptions::new().read_file(path.as_std_path())?;
    let affine = affine_from_header(object.header())?;
    let data = object
        .into_volume()
        .into_ndarray::<f32>()?
        .into_dimensionality::<Ix3>()
        .map_err(|_| TractusError::InvalidVolume(format!("{path}: expected a 3D volume")))?;
    Ok(ScalarVolume::new(data, affine))
}

/// Load a 3D binary mask (voxels with `value > threshold` are set).
pub fn load_mask_volume(path: &Utf8Path, threshold: f32) -> Result<MaskVolume, TractusError> {
    let scalar = load_scalar_volume(path)?;
    Ok(MaskVolume::from_scalar(&scalar, threshold))
}

/// Load a 4D orientation peak field (shape `(x, y, z, 3·P)`).
pub fn load_orientation_field(path: &Utf8Path) -> Result<OrientationField, TractusError> {
    let object = ReaderOptions::new().read_file(path.as_std_path())?;
    let affine = affine_from_header(object.header())?;
    let data = object
        .into_volume()
        .into_ndarray::<f32>()?
        .into_dimensionality::<Ix4>()
        .map_err(|_| {
            TractusError::InvalidPeakField(format!("{path}: expected a 4D peak volume"))
        })?;
    OrientationField::new(data, affine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sform_affine_wins_over_pixdim() {
        let header = NiftiHeader {
            sform_code: 1,
            srow_x: [2.0, 0.0, 0.0, -10.0],
            srow_y: [0.0, 2.0, 0.0, -20.0],
            srow_z: [0.0, 0.0, 2.0, -30.0],
            pixdim: [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            ..NiftiHeader::default()
        };
        let affine = affine_from_header(&header).unwrap();
        let world = affine.voxel_to_world(&nalgebra::Point3::new(5.0, 10.0, 15.0));
        assert_relative_eq!(world.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(world.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(world.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pixdim_fallback() {
        let header = NiftiHeader {
            sform_code: 0,
            pixdim: [0.0, 1.25, 1.25, 2.5, 0.0, 0.0, 0.0, 0.0],
            ..NiftiHeader::default()
        };
        let affine = affine_from_header(&header).unwrap();
        assert_relative_eq!(affine.voxel_size()[0], 1.25, epsilon = 1e-9);
        assert_relative_eq!(affine.voxel_size()[2], 2.5, epsilon = 1e-9);
    }
}
