pub mod constants;
pub mod io;
pub mod peaks;
pub mod pipeline;
pub mod stats;
pub mod streamline;
pub mod tracking;
pub mod tractometry;
pub mod tractus_errors;
pub mod volume;

pub use constants::{BundleName, PeakSet, SubjectId};
pub use peaks::{OrientationField, OrientationSampler};
pub use streamline::{ReferenceSpace, Streamline, Tractogram};
pub use tractus_errors::TractusError;

#[cfg(test)]
pub(crate) mod unit_test_global {
    use std::sync::LazyLock;

    use nalgebra::Vector3;
    use ndarray::{Array3, Array4};

    use crate::peaks::OrientationField;
    use crate::volume::{MaskVolume, VoxelAffine};

    /// Synthetic single-orientation field (+x everywhere, 16³ grid) with a
    /// full seed mask; shared by sampler/integrator unit tests that only need
    /// a well-behaved analytic field.
    pub(crate) static X_FIELD_16: LazyLock<(OrientationField, MaskVolume)> =
        LazyLock::new(|| {
            let peak = Vector3::new(1.0f32, 0.0, 0.0);
            let mut data = Array4::<f32>::zeros((16, 16, 16, 3));
            for x in 0..16 {
                for y in 0..16 {
                    for z in 0..16 {
                        data[[x, y, z, 0]] = peak.x;
                        data[[x, y, z, 1]] = peak.y;
                        data[[x, y, z, 2]] = peak.z;
                    }
                }
            }
            let field = OrientationField::new(data, VoxelAffine::identity())
                .expect("valid synthetic field");
            let mask = MaskVolume::new(
                Array3::from_elem((16, 16, 16), true),
                VoxelAffine::identity(),
            );
            (field, mask)
        });
}
