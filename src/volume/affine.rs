//! Voxel ↔ world coordinate mapping.
//!
//! A [`VoxelAffine`] wraps the 4×4 homogeneous matrix that maps **continuous voxel
//! indices** to **world coordinates in millimeters** (scanner/RAS space), together
//! with its cached inverse. Both directions are needed on the hot sampling path,
//! so the inverse is computed once at construction.
//!
//! Conventions
//! -----------------
//! * `world = A · (i, j, k, 1)ᵀ` with `(i, j, k)` continuous voxel indices.
//! * Voxel index `(0, 0, 0)` maps to the **center** of the first voxel.
//! * The affine must be invertible; construction fails otherwise.

use nalgebra::{Matrix4, Point3};

use crate::tractus_errors::TractusError;

/// Homogeneous voxel-to-world transform with cached inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelAffine {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl VoxelAffine {
    /// Build from a voxel→world matrix.
    ///
    /// Arguments
    /// -----------------
    /// * `matrix`: 4×4 homogeneous voxel→world transform.
    ///
    /// Return
    /// ----------
    /// * The transform with its cached inverse, or
    ///   [`TractusError::SingularAffine`] when the matrix cannot be inverted.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Result<Self, TractusError> {
        let inverse = matrix.try_inverse().ok_or(TractusError::SingularAffine)?;
        Ok(Self { matrix, inverse })
    }

    /// Identity mapping: voxel indices are world millimeters.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    /// Axis-aligned mapping with the given voxel spacing (mm) and zero origin.
    pub fn from_spacing(spacing: [f64; 3]) -> Result<Self, TractusError> {
        let mut m = Matrix4::identity();
        m[(0, 0)] = spacing[0];
        m[(1, 1)] = spacing[1];
        m[(2, 2)] = spacing[2];
        Self::from_matrix(m)
    }

    /// The voxel→world matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// The world→voxel matrix.
    pub fn inverse(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    /// Map a continuous voxel index to world millimeters.
    #[inline]
    pub fn voxel_to_world(&self, voxel: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(voxel)
    }

    /// Map a world point (mm) to a continuous voxel index.
    #[inline]
    pub fn world_to_voxel(&self, world: &Point3<f64>) -> Point3<f64> {
        self.inverse.transform_point(world)
    }

    /// Voxel edge lengths in mm (column norms of the linear part).
    pub fn voxel_size(&self) -> [f64; 3] {
        let m = &self.matrix;
        let mut size = [0.0; 3];
        for (c, s) in size.iter_mut().enumerate() {
            *s = (m[(0, c)].powi(2) + m[(1, c)].powi(2) + m[(2, c)].powi(2)).sqrt();
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spacing_roundtrip() {
        let affine = VoxelAffine::from_spacing([2.0, 2.0, 4.0]).unwrap();
        let voxel = Point3::new(3.0, 4.5, 1.0);
        let world = affine.voxel_to_world(&voxel);
        assert_relative_eq!(world.x, 6.0, epsilon = 1e-12);
        assert_relative_eq!(world.y, 9.0, epsilon = 1e-12);
        assert_relative_eq!(world.z, 4.0, epsilon = 1e-12);

        let back = affine.world_to_voxel(&world);
        assert_relative_eq!(back.x, voxel.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, voxel.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, voxel.z, epsilon = 1e-12);
    }

    #[test]
    fn voxel_size_from_columns() {
        let affine = VoxelAffine::from_spacing([1.0, 2.5, 3.0]).unwrap();
        let size = affine.voxel_size();
        assert_relative_eq!(size[0], 1.0);
        assert_relative_eq!(size[1], 2.5);
        assert_relative_eq!(size[2], 3.0);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let m = Matrix4::zeros();
        assert_eq!(
            VoxelAffine::from_matrix(m),
            Err(TractusError::SingularAffine)
        );
    }
}
