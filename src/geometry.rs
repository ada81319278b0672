/// Row-major identity cosine matrix, the axis-aligned default.
pub const IDENTITY_DIRECTION: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Coordinate comparison with absolute and relative slack,
/// `|a - b| <= 1e-8 + 1e-5 * |b|`.
#[inline]
pub(crate) fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Geometry of a voxel grid in patient space.
///
/// `size` is ordered `(columns, rows, slices)` following the DICOM
/// convention, while the voxel arrays built on top of it are indexed
/// `(slice, row, column)`. Equality is exact per component; mask algebra
/// relies on it as the shared-grid precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    /// Voxel spacing in mm, `(x, y, z)`.
    pub spacing: (f64, f64, f64),
    /// Position of the first voxel center in mm, `(x, y, z)`.
    pub origin: (f64, f64, f64),
    /// Direction cosines, row-major 3x3.
    pub direction: [f64; 9],
    /// Grid extent in voxels, `(nx, ny, nz)`.
    pub size: (usize, usize, usize),
}

impl GridGeometry {
    pub fn new(
        spacing: (f64, f64, f64),
        origin: (f64, f64, f64),
        direction: [f64; 9],
        size: (usize, usize, usize),
    ) -> Self {
        Self {
            spacing,
            origin,
            direction,
            size,
        }
    }

    /// Grid with identity direction cosines.
    pub fn axis_aligned(
        spacing: (f64, f64, f64),
        origin: (f64, f64, f64),
        size: (usize, usize, usize),
    ) -> Self {
        Self::new(spacing, origin, IDENTITY_DIRECTION, size)
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.direction == IDENTITY_DIRECTION
    }

    /// Array dimensions in storage order `(nz, ny, nx)`.
    pub fn array_dim(&self) -> (usize, usize, usize) {
        (self.size.2, self.size.1, self.size.0)
    }

    /// Volume of a single voxel in mm^3.
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.0 * self.spacing.1 * self.spacing.2
    }

    /// Resolves a physical Z position to a slice index.
    ///
    /// Returns `None` when the rounded index falls outside `[0, nz)`; an
    /// out-of-range contour is skippable, not an error.
    pub fn slice_index(&self, z_physical: f64) -> Option<usize> {
        let index = ((z_physical - self.origin.2) / self.spacing.2).round();
        if !index.is_finite() || index < 0.0 || index >= self.size.2 as f64 {
            return None;
        }
        Some(index as usize)
    }

    /// Physical Z of a slice center, the inverse of [`Self::slice_index`].
    pub fn slice_z(&self, index: usize) -> f64 {
        self.origin.2 + index as f64 * self.spacing.2
    }

    /// Projects an in-plane physical point to continuous voxel coordinates.
    pub fn to_voxel_xy(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin.0) / self.spacing.0,
            (y - self.origin.1) / self.spacing.1,
        )
    }
}
