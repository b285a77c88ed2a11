// src/engine/wire.rs
//
// Raw hand-off byte shape: width (u32 LE), height (u32 LE), then exactly
// width*height*4 RGBA bytes. No compression, no other header.

use crate::engine::buffer::{expected_len, RawImageBuffer};
use crate::error::{RawImageError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const HEADER_LEN: usize = 8;

pub fn to_wire_bytes(buffer: &RawImageBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + buffer.pixels().len());
    out.extend_from_slice(&buffer.width().to_le_bytes());
    out.extend_from_slice(&buffer.height().to_le_bytes());
    out.extend_from_slice(buffer.pixels());
    out
}

/// Parse the wire shape. A short header or a payload of the wrong length is a
/// `ShapeMismatch`; trailing bytes are not tolerated.
pub fn from_wire_bytes(bytes: &[u8]) -> Result<RawImageBuffer> {
    let Some((header, payload)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(RawImageError::shape_mismatch(
            0,
            0,
            HEADER_LEN as u64,
            bytes.len() as u64,
        ));
    };
    let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    match expected_len(width, height) {
        Some(len) if len == payload.len() => RawImageBuffer::new(width, height, payload.to_vec()),
        _ => Err(RawImageError::shape_mismatch(
            width,
            height,
            (width as u64)
                .saturating_mul(height as u64)
                .saturating_mul(4),
            payload.len() as u64,
        )),
    }
}

pub fn write_wire_file(path: impl AsRef<Path>, buffer: &RawImageBuffer) -> Result<()> {
    let path = path.as_ref();
    let write_err = |e| RawImageError::file_write_failed(path.to_string_lossy().to_string(), e);
    let mut file = File::create(path).map_err(write_err)?;
    file.write_all(&to_wire_bytes(buffer)).map_err(write_err)?;
    file.sync_all().map_err(write_err)
}

/// Memory-map a wire file and parse it. The mapping is only held while parsing.
pub fn read_wire_file(path: impl AsRef<Path>) -> Result<RawImageBuffer> {
    let path = path.as_ref();
    let read_err = |e| RawImageError::file_read_failed(path.to_string_lossy().to_string(), e);
    let file = File::open(path).map_err(read_err)?;
    let len = file.metadata().map_err(read_err)?.len();
    if len < HEADER_LEN as u64 {
        return Err(RawImageError::shape_mismatch(0, 0, HEADER_LEN as u64, len));
    }

    // SAFETY: the file is opened read-only and the mapping does not outlive this
    // call. Concurrent truncation by another process is not supported.
    let mmap = unsafe { Mmap::map(&file).map_err(read_err)? };
    from_wire_bytes(&mmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> RawImageBuffer {
        RawImageBuffer::from_fn(3, 2, |x, y| [x as u8, y as u8, 9, 200]).unwrap()
    }

    #[test]
    fn test_wire_layout() {
        let bytes = to_wire_bytes(&sample());
        assert_eq!(&bytes[..8], &[3, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(bytes.len(), 8 + 24);
        assert_eq!(&bytes[8..12], &[0, 0, 9, 200]);
    }

    #[test]
    fn test_from_wire_bytes_parses_back() {
        let buf = sample();
        assert_eq!(from_wire_bytes(&to_wire_bytes(&buf)).unwrap(), buf);
    }

    #[test]
    fn test_short_header_is_shape_mismatch() {
        for bytes in [&[][..], &[1, 0, 0][..], &[1, 0, 0, 0, 1, 0, 0][..]] {
            assert!(matches!(
                from_wire_bytes(bytes),
                Err(RawImageError::ShapeMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_wrong_payload_length_is_shape_mismatch() {
        let mut bytes = to_wire_bytes(&sample());
        bytes.pop();
        assert!(matches!(
            from_wire_bytes(&bytes),
            Err(RawImageError::ShapeMismatch { expected: 24, actual: 23, .. })
        ));
        let mut bytes = to_wire_bytes(&sample());
        bytes.push(0);
        assert!(from_wire_bytes(&bytes).is_err());
    }

    #[test]
    fn test_huge_header_does_not_allocate() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 1, 2, 3, 4];
        assert!(matches!(
            from_wire_bytes(&bytes),
            Err(RawImageError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.raw");
        let buf = sample();
        write_wire_file(&path, &buf).unwrap();
        assert_eq!(read_wire_file(&path).unwrap(), buf);
    }

    #[test]
    fn test_read_missing_and_short_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_wire_file(dir.path().join("missing.raw")),
            Err(RawImageError::FileReadFailed { .. })
        ));
        let short = dir.path().join("short.raw");
        std::fs::write(&short, [1, 2, 3]).unwrap();
        assert!(matches!(
            read_wire_file(&short),
            Err(RawImageError::ShapeMismatch { .. })
        ));
    }
}
