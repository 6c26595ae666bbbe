//! Legacy TrackVis `.trk` container.
//!
//! Layout (version 2): a fixed 1000-byte little-endian header carrying the
//! grid geometry, followed by one record per streamline — an `i32` point
//! count, then that many `f32` coordinate triplets.
//!
//! Coordinate convention
//! -----------------
//! TrackVis stores points in **voxel-mm** space with a half-voxel origin
//! shift: `voxmm = (voxel + 0.5) · voxel_size`. World (scanner) coordinates
//! therefore pass through the inverse affine on write and the forward affine
//! on read. This matches what TrackVis and nibabel produce, so the output is
//! directly loadable by external viewers.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use camino::Utf8Path;
use nalgebra::Point3;

use crate::streamline::{ReferenceSpace, Streamline, Tractogram};
use crate::tractus_errors::TractusError;

const HEADER_SIZE: usize = 1000;
const MAGIC: &[u8; 6] = b"TRACK\0";
const VERSION: i32 = 2;

/// Byte offsets of the header fields used here.
mod offsets {
    pub const DIM: usize = 6;
    pub const VOXEL_SIZE: usize = 12;
    pub const VOX_TO_RAS: usize = 440;
    pub const VOXEL_ORDER: usize = 948;
    pub const N_COUNT: usize = 988;
    pub const VERSION: usize = 992;
    pub const HDR_SIZE: usize = 996;
}

fn malformed(msg: impl Into<String>) -> TractusError {
    TractusError::MalformedTrackFile(msg.into())
}

/// Write a tractogram as TrackVis `.trk`.
pub fn write_trk(tractogram: &Tractogram, path: &Utf8Path) -> Result<(), TractusError> {
    let space = tractogram.space();
    let mut header = [0u8; HEADER_SIZE];

    header[..MAGIC.len()].copy_from_slice(MAGIC);
    for (i, &d) in space.dims.iter().enumerate() {
        let b = (d as i16).to_le_bytes();
        header[offsets::DIM + 2 * i..offsets::DIM + 2 * i + 2].copy_from_slice(&b);
    }
    for (i, &s) in space.voxel_size.iter().enumerate() {
        let b = (s as f32).to_le_bytes();
        header[offsets::VOXEL_SIZE + 4 * i..offsets::VOXEL_SIZE + 4 * i + 4].copy_from_slice(&b);
    }
    let affine = space.affine.matrix();
    for r in 0..4 {
        for c in 0..4 {
            let b = (affine[(r, c)] as f32).to_le_bytes();
            let at = offsets::VOX_TO_RAS + 4 * (4 * r + c);
            header[at..at + 4].copy_from_slice(&b);
        }
    }
    header[offsets::VOXEL_ORDER..offsets::VOXEL_ORDER + 4].copy_from_slice(b"RAS\0");
    header[offsets::N_COUNT..offsets::N_COUNT + 4]
        .copy_from_slice(&(tractogram.len() as i32).to_le_bytes());
    header[offsets::VERSION..offsets::VERSION + 4].copy_from_slice(&VERSION.to_le_bytes());
    header[offsets::HDR_SIZE..offsets::HDR_SIZE + 4]
        .copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());

    let mut writer = BufWriter::new(File::create(path.as_std_path())?);
    writer.write_all(&header)?;

    for streamline in tractogram.streamlines() {
        writer.write_i32::<LittleEndian>(streamline.len() as i32)?;
        for point in streamline.points() {
            let voxel = space.affine.world_to_voxel(point);
            writer.write_f32::<LittleEndian>(((voxel.x + 0.5) * space.voxel_size[0]) as f32)?;
            writer.write_f32::<LittleEndian>(((voxel.y + 0.5) * space.voxel_size[1]) as f32)?;
            writer.write_f32::<LittleEndian>(((voxel.z + 0.5) * space.voxel_size[2]) as f32)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a TrackVis `.trk` tractogram.
///
/// The header's grid dimensions are checked against `reference`; a mismatch
/// is an input-validity error (the tractogram belongs to another grid).
pub fn read_trk(path: &Utf8Path, reference: &ReferenceSpace) -> Result<Tractogram, TractusError> {
    let mut reader = BufReader::new(File::open(path.as_std_path())?);
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    if &header[..MAGIC.len()] != MAGIC {
        return Err(malformed(format!("{path}: missing TRACK magic")));
    }
    let hdr_size = i32::from_le_bytes(
        header[offsets::HDR_SIZE..offsets::HDR_SIZE + 4]
            .try_into()
            .expect("fixed slice"),
    );
    if hdr_size != HEADER_SIZE as i32 {
        return Err(malformed(format!(
            "{path}: unexpected header size {hdr_size} (big-endian files are not supported)"
        )));
    }

    let mut dims = [0usize; 3];
    for (i, d) in dims.iter_mut().enumerate() {
        *d = i16::from_le_bytes(
            header[offsets::DIM + 2 * i..offsets::DIM + 2 * i + 2]
                .try_into()
                .expect("fixed slice"),
        ) as usize;
    }
    if dims != reference.dims {
        return Err(TractusError::VolumeDimensionMismatch {
            expected: reference.dims,
            found: dims,
        });
    }

    let mut voxel_size = [0f64; 3];
    for (i, s) in voxel_size.iter_mut().enumerate() {
        *s = f32::from_le_bytes(
            header[offsets::VOXEL_SIZE + 4 * i..offsets::VOXEL_SIZE + 4 * i + 4]
                .try_into()
                .expect("fixed slice"),
        ) as f64;
    }

    let n_count = i32::from_le_bytes(
        header[offsets::N_COUNT..offsets::N_COUNT + 4]
            .try_into()
            .expect("fixed slice"),
    );

    let mut streamlines = Vec::new();
    loop {
        let n_points = match reader.read_i32::<LittleEndian>() {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if n_points < 0 {
            return Err(malformed(format!("{path}: negative point count")));
        }
        let mut points = Vec::with_capacity(n_points as usize);
        for _ in 0..n_points {
            let x = reader.read_f32::<LittleEndian>()? as f64;
            let y = reader.read_f32::<LittleEndian>()? as f64;
            let z = reader.read_f32::<LittleEndian>()? as f64;
            let voxel = Point3::new(
                x / voxel_size[0] - 0.5,
                y / voxel_size[1] - 0.5,
                z / voxel_size[2] - 0.5,
            );
            points.push(reference.affine.voxel_to_world(&voxel));
        }
        streamlines.push(Streamline::new(points));
    }

    if n_count > 0 && streamlines.len() != n_count as usize {
        return Err(malformed(format!(
            "{path}: header announces {n_count} tracks, found {}",
            streamlines.len()
        )));
    }

    Ok(Tractogram::new(streamlines, reference.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VoxelAffine;
    use approx::assert_relative_eq;
    use camino::Utf8PathBuf;

    fn space() -> ReferenceSpace {
        ReferenceSpace {
            dims: [10, 12, 14],
            voxel_size: [2.0, 2.0, 2.0],
            affine: VoxelAffine::from_spacing([2.0, 2.0, 2.0]).unwrap(),
        }
    }

    fn sample_tractogram() -> Tractogram {
        let s1 = Streamline::new(vec![
            Point3::new(2.0, 4.0, 6.0),
            Point3::new(4.0, 4.0, 6.0),
            Point3::new(6.0, 4.0, 8.0),
        ]);
        let s2 = Streamline::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)]);
        Tractogram::new(vec![s1, s2], space())
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bundle.trk")).unwrap();

        let original = sample_tractogram();
        write_trk(&original, &path).unwrap();
        let loaded = read_trk(&path, &space()).unwrap();

        assert_eq!(loaded.len(), original.len());
        for (a, b) in loaded.streamlines().iter().zip(original.streamlines()) {
            assert_eq!(a.len(), b.len());
            for (pa, pb) in a.points().iter().zip(b.points()) {
                assert_relative_eq!(pa, pb, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn wrong_grid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bundle.trk")).unwrap();
        write_trk(&sample_tractogram(), &path).unwrap();

        let other = ReferenceSpace {
            dims: [5, 5, 5],
            ..space()
        };
        assert!(matches!(
            read_trk(&path, &other),
            Err(TractusError::VolumeDimensionMismatch { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("junk.trk")).unwrap();
        std::fs::write(&path, vec![0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(
            read_trk(&path, &space()),
            Err(TractusError::MalformedTrackFile(_))
        ));
    }
}
