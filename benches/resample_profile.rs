use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Point3;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tractus::streamline::{ReferenceSpace, Streamline, Tractogram};
use tractus::tractometry::bundle_profile;
use tractus::volume::{ScalarVolume, VoxelAffine};

/// A jittered near-straight streamline with `n` points.
fn wiggly_streamline(rng: &mut StdRng, n: usize) -> Streamline {
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let t = 60.0 * i as f64 / (n - 1) as f64;
        points.push(Point3::new(
            2.0 + t,
            30.0 + rng.random::<f64>(),
            30.0 + rng.random::<f64>(),
        ));
    }
    Streamline::new(points)
}

fn bench_resample(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(17);
    let streamline = wiggly_streamline(&mut rng, 500);

    c.bench_function("resample_500_to_100", |b| {
        b.iter(|| black_box(&streamline).resample(100))
    });
}

fn bench_bundle_profile(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(17);
    let streamlines: Vec<Streamline> = (0..200).map(|_| wiggly_streamline(&mut rng, 300)).collect();
    let space = ReferenceSpace {
        dims: [64, 64, 64],
        voxel_size: [1.0, 1.0, 1.0],
        affine: VoxelAffine::identity(),
    };
    let tractogram = Tractogram::new(streamlines, space);
    let metric = ScalarVolume::new(
        Array3::from_shape_fn((64, 64, 64), |(x, y, z)| (x + y + z) as f32),
        VoxelAffine::identity(),
    );

    c.bench_function("bundle_profile_200x300_to_100", |b| {
        b.iter(|| bundle_profile(&tractogram, &metric, 100))
    });
}

criterion_group!(benches, bench_resample, bench_bundle_profile);
criterion_main!(benches);
