//! ASCII grid fixtures for mask tests: `#` is set, `.` is clear.

use ndarray::{Array2, Array3, ArrayBase, Data, Ix2, s};

use crate::geometry::GridGeometry;
use crate::mask::MaskVolume;

/// Parses one slice, one text row per pixel row.
pub(crate) fn mask_from_ascii(grid: &str) -> Array2<u8> {
    let rows: Vec<&str> = grid
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let height = rows.len();
    let width = rows.first().map_or(0, |row| row.chars().count());
    let mut mask = Array2::zeros((height, width));
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            if ch == '#' {
                mask[[y, x]] = 1;
            }
        }
    }
    mask
}

pub(crate) fn mask_to_ascii<S: Data<Elem = u8>>(mask: &ArrayBase<S, Ix2>) -> String {
    let mut out = String::new();
    for row in mask.rows() {
        for &value in row {
            out.push(if value != 0 { '#' } else { '.' });
        }
        out.push('\n');
    }
    out
}

/// Stacks per-slice ASCII grids into a `(nz, ny, nx)` volume.
pub(crate) fn volume_from_ascii(slices: &[&str]) -> Array3<u8> {
    let parsed: Vec<Array2<u8>> = slices.iter().map(|s| mask_from_ascii(s)).collect();
    let (height, width) = parsed.first().map_or((0, 0), |slice| slice.dim());
    let mut volume = Array3::zeros((parsed.len(), height, width));
    for (z, slice) in parsed.iter().enumerate() {
        volume.slice_mut(s![z, .., ..]).assign(slice);
    }
    volume
}

/// Mask volume on a unit-spacing grid at the origin.
pub(crate) fn unit_mask(slices: &[&str]) -> MaskVolume {
    let data = volume_from_ascii(slices);
    let (nz, ny, nx) = data.dim();
    MaskVolume::new(
        data,
        GridGeometry::axis_aligned((1.0, 1.0, 1.0), (0.0, 0.0, 0.0), (nx, ny, nz)),
    )
}
