//! Minimal NPY (v1.0) reader/writer for 2-D little-endian f32 matrices.

use std::path::Path;

use crate::IndexError;

const MAGIC: &[u8] = b"\x93NUMPY";

fn io_err(path: &Path, err: impl std::fmt::Display) -> IndexError {
    IndexError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn corrupt(path: &Path, message: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Write `rows` as a C-order `<f4` matrix. Row widths must agree.
pub fn write_matrix(path: &Path, rows: &[Vec<f32>]) -> Result<(), IndexError> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|row| row.len() != n_cols) {
        return Err(corrupt(
            path,
            format!("ragged matrix: expected {n_cols} columns, found {}", bad.len()),
        ));
    }

    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({n_rows}, {n_cols}), }}");
    // Pad so magic + version + length-prefix + header align to 64 bytes.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut buf = Vec::with_capacity(MAGIC.len() + 4 + header.len() + n_rows * n_cols * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(header.len() as u16).to_le_bytes());
    buf.extend_from_slice(header.as_bytes());
    for row in rows {
        // Supported targets are little-endian, matching '<f4'.
        buf.extend_from_slice(bytemuck::cast_slice(row));
    }
    std::fs::write(path, buf).map_err(|err| io_err(path, err))
}

/// Read a C-order `<f4` matrix back into row vectors.
pub fn read_matrix(path: &Path) -> Result<Vec<Vec<f32>>, IndexError> {
    let bytes = std::fs::read(path).map_err(|err| io_err(path, err))?;
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt(path, "missing NPY magic"));
    }
    let version = (bytes[6], bytes[7]);
    if version.0 != 1 {
        return Err(corrupt(path, format!("unsupported NPY version {version:?}")));
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = 10 + header_len;
    if bytes.len() < data_start {
        return Err(corrupt(path, "truncated NPY header"));
    }
    let header = std::str::from_utf8(&bytes[10..data_start])
        .map_err(|_| corrupt(path, "non-UTF-8 NPY header"))?;

    if !header.contains("'descr': '<f4'") {
        return Err(corrupt(path, "expected little-endian f32 matrix"));
    }
    if !header.contains("'fortran_order': False") {
        return Err(corrupt(path, "expected C-order matrix"));
    }
    let (n_rows, n_cols) = parse_shape(header).ok_or_else(|| corrupt(path, "unparsable shape"))?;

    let data = &bytes[data_start..];
    let expected = n_rows * n_cols * 4;
    if data.len() < expected {
        return Err(corrupt(
            path,
            format!("expected {expected} data bytes, found {}", data.len()),
        ));
    }

    let mut rows = Vec::with_capacity(n_rows);
    for r in 0..n_rows {
        let mut row = Vec::with_capacity(n_cols);
        for c in 0..n_cols {
            let at = (r * n_cols + c) * 4;
            row.push(f32::from_le_bytes([
                data[at],
                data[at + 1],
                data[at + 2],
                data[at + 3],
            ]));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_shape(header: &str) -> Option<(usize, usize)> {
    let start = header.find("'shape': (")? + "'shape': (".len();
    let rest = &header[start..];
    let end = rest.find(')')?;
    let mut dims = rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty());
    let rows = dims.next()?.parse().ok()?;
    let cols = dims.next().and_then(|d| d.parse().ok()).unwrap_or(0);
    Some((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrices_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.npy");
        let rows = vec![vec![1.0f32, -2.5, 0.25], vec![3.5, 4.0, 1e-3]];
        write_matrix(&path, &rows).unwrap();
        assert_eq!(read_matrix(&path).unwrap(), rows);
    }

    #[test]
    fn empty_matrices_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.npy");
        write_matrix(&path, &[]).unwrap();
        assert!(read_matrix(&path).unwrap().is_empty());
    }

    #[test]
    fn ragged_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.npy");
        let err = write_matrix(&path, &[vec![1.0], vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { .. }));
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.npy");
        std::fs::write(&path, b"not an npy file at all").unwrap();
        assert!(read_matrix(&path).is_err());
    }
}
