/// Contour geometric type as declared in the structure set.
///
/// A contour without a declared type is treated as `ClosedPlanar`; an
/// unrecognized value is treated as `OpenPlanar` (filled, never auto-closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourGeometry {
    #[default]
    ClosedPlanar,
    OpenPlanar,
    OpenNonplanar,
    Point,
}

impl ContourGeometry {
    /// Maps a DICOM `ContourGeometricType` value onto the enum.
    pub fn from_dicom(value: &str) -> Self {
        match value.trim() {
            "CLOSED_PLANAR" => ContourGeometry::ClosedPlanar,
            "OPEN_PLANAR" => ContourGeometry::OpenPlanar,
            "OPEN_NONPLANAR" => ContourGeometry::OpenNonplanar,
            "POINT" => ContourGeometry::Point,
            _ => ContourGeometry::OpenPlanar,
        }
    }
}

/// How overlapping positive and hole contours on one slice are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoleRule {
    /// Union all positive contours first, then subtract all holes.
    /// Independent of contour order.
    #[default]
    UnionThenSubtract,
    /// Paint or clear in encounter order, as stored in the source sequence.
    SequenceOrder,
}

/// Voxel adjacency used when labeling connected components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// 6-neighborhood, shared faces only.
    Face,
    /// 26-neighborhood, shared faces, edges and corners.
    #[default]
    Full,
}
