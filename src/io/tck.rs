//! Modern MRtrix `.tck` container.
//!
//! Layout: a text header (`mrtrix tracks` magic line, `key: value` lines,
//! `END`), then Float32LE coordinate triplets in **world (scanner) mm**.
//! Streamlines are separated by a `(NaN, NaN, NaN)` triplet; the stream is
//! terminated by `(Inf, Inf, Inf)`. The mandatory `file: . <offset>` entry
//! points at the first binary byte.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use camino::Utf8Path;
use nalgebra::Point3;

use crate::streamline::{ReferenceSpace, Streamline, Tractogram};
use crate::tractus_errors::TractusError;

const MAGIC_LINE: &str = "mrtrix tracks";

fn malformed(msg: impl Into<String>) -> TractusError {
    TractusError::MalformedTrackFile(msg.into())
}

/// Build the header text, iterating until the self-referential byte offset
/// stabilizes (the offset's digit count feeds back into the header length).
fn build_header(count: usize) -> String {
    let body = |offset: usize| {
        format!(
            "{MAGIC_LINE}\ndatatype: Float32LE\ncount: {count}\nfile: . {offset}\nEND\n"
        )
    };
    let mut offset = body(0).len();
    loop {
        let text = body(offset);
        if text.len() == offset {
            return text;
        }
        offset = text.len();
    }
}

/// Write a tractogram as MRtrix `.tck`.
pub fn write_tck(tractogram: &Tractogram, path: &Utf8Path) -> Result<(), TractusError> {
    let mut writer = BufWriter::new(File::create(path.as_std_path())?);
    writer.write_all(build_header(tractogram.len()).as_bytes())?;

    for streamline in tractogram.streamlines() {
        for point in streamline.points() {
            writer.write_f32::<LittleEndian>(point.x as f32)?;
            writer.write_f32::<LittleEndian>(point.y as f32)?;
            writer.write_f32::<LittleEndian>(point.z as f32)?;
        }
        for _ in 0..3 {
            writer.write_f32::<LittleEndian>(f32::NAN)?;
        }
    }
    for _ in 0..3 {
        writer.write_f32::<LittleEndian>(f32::INFINITY)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an MRtrix `.tck` tractogram.
///
/// TCK stores bare world coordinates without grid geometry, so the caller
/// supplies the [`ReferenceSpace`] the tractogram belongs to.
pub fn read_tck(path: &Utf8Path, reference: &ReferenceSpace) -> Result<Tractogram, TractusError> {
    let mut reader = BufReader::new(File::open(path.as_std_path())?);
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    // The header is ASCII `key: value` lines up to the END marker.
    let header_end = find_header_end(&raw)
        .ok_or_else(|| malformed(format!("{path}: no END marker in header")))?;
    let header_text = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| malformed(format!("{path}: non-UTF8 header")))?;

    let mut lines = header_text.lines();
    if lines.next().map(str::trim) != Some(MAGIC_LINE) {
        return Err(malformed(format!("{path}: missing '{MAGIC_LINE}' magic")));
    }

    let mut datatype = None;
    let mut offset = None;
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "datatype" => datatype = Some(value.trim().to_string()),
            "file" => {
                let entry = value.trim();
                let Some((".", off)) = entry.split_once(' ') else {
                    return Err(malformed(format!("{path}: unsupported file entry '{entry}'")));
                };
                offset = Some(off.trim().parse::<usize>().map_err(|_| {
                    malformed(format!("{path}: bad file offset '{off}'"))
                })?);
            }
            _ => {}
        }
    }

    match datatype.as_deref() {
        Some("Float32LE") => {}
        other => {
            return Err(malformed(format!(
                "{path}: unsupported datatype {other:?} (only Float32LE)"
            )))
        }
    }
    let offset = offset.ok_or_else(|| malformed(format!("{path}: missing file entry")))?;
    if offset > raw.len() {
        return Err(malformed(format!("{path}: file offset past end of file")));
    }

    let mut cursor = &raw[offset..];
    let mut streamlines = Vec::new();
    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut terminated = false;

    while cursor.len() >= 12 {
        let x = cursor.read_f32::<LittleEndian>()?;
        let y = cursor.read_f32::<LittleEndian>()?;
        let z = cursor.read_f32::<LittleEndian>()?;

        if x.is_infinite() && y.is_infinite() && z.is_infinite() {
            terminated = true;
            break;
        }
        if x.is_nan() && y.is_nan() && z.is_nan() {
            streamlines.push(Streamline::new(std::mem::take(&mut points)));
            continue;
        }
        points.push(Point3::new(x as f64, y as f64, z as f64));
    }

    if !terminated {
        return Err(malformed(format!("{path}: missing end-of-stream marker")));
    }
    if !points.is_empty() {
        // Track data after the last separator but before EOF marker.
        streamlines.push(Streamline::new(points));
    }

    Ok(Tractogram::new(streamlines, reference.clone()))
}

/// Byte offset just past the `END` line of the text header.
fn find_header_end(raw: &[u8]) -> Option<usize> {
    let needle = b"\nEND\n";
    raw.windows(needle.len())
        .position(|w| w == needle)
        .map(|at| at + needle.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VoxelAffine;
    use approx::assert_relative_eq;
    use camino::Utf8PathBuf;

    fn space() -> ReferenceSpace {
        ReferenceSpace {
            dims: [16, 16, 16],
            voxel_size: [1.0, 1.0, 1.0],
            affine: VoxelAffine::identity(),
        }
    }

    #[test]
    fn header_offset_is_stable() {
        for count in [0usize, 1, 999, 123_456] {
            let header = build_header(count);
            let offset: usize = header
                .lines()
                .find_map(|l| l.strip_prefix("file: . "))
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(offset, header.len());
        }
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bundle.tck")).unwrap();

        let original = Tractogram::new(
            vec![
                Streamline::new(vec![
                    Point3::new(1.0, 2.0, 3.0),
                    Point3::new(1.5, 2.0, 3.0),
                ]),
                Streamline::new(vec![
                    Point3::new(5.0, 5.0, 5.0),
                    Point3::new(6.0, 5.5, 5.0),
                    Point3::new(7.0, 6.0, 5.0),
                ]),
            ],
            space(),
        );

        write_tck(&original, &path).unwrap();
        let loaded = read_tck(&path, &space()).unwrap();

        assert_eq!(loaded.len(), 2);
        for (a, b) in loaded.streamlines().iter().zip(original.streamlines()) {
            assert_eq!(a.len(), b.len());
            for (pa, pb) in a.points().iter().zip(b.points()) {
                assert_relative_eq!(pa, pb, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("cut.tck")).unwrap();

        let tractogram = Tractogram::new(
            vec![Streamline::new(vec![Point3::new(0.0, 0.0, 0.0)])],
            space(),
        );
        write_tck(&tractogram, &path).unwrap();

        // chop off the end-of-stream marker
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 12]).unwrap();

        assert!(matches!(
            read_tck(&path, &space()),
            Err(TractusError::MalformedTrackFile(_))
        ));
    }
}
