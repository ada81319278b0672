use crate::geometry::GridGeometry;

use dicom::object::{FileDicomObject, InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryLoadError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Per-image geometry attributes, before the series is assembled.
#[derive(Debug, Clone)]
struct SliceRecord {
    position: [f64; 3],
    orientation: [f64; 6],
    /// PixelSpacing is ordered `[row, column]`, so this is the Y step.
    row_spacing: f64,
    column_spacing: f64,
    rows: u32,
    columns: u32,
}

pub struct GeometryLoader;

impl GeometryLoader {
    /// Build the reference grid geometry from DICOM image objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects of one image series
    ///
    /// # Errors
    ///
    /// Returns error if no object carries complete geometry, if dimensions
    /// differ between slices, or if the slice spacing cannot be determined
    pub fn from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Result<GridGeometry, GeometryLoadError> {
        let mut records: Vec<SliceRecord> = dicom_objects
            .iter()
            .filter_map(|dicom_object| {
                let record = Self::extract_record(dicom_object);
                if record.is_none() {
                    log::warn!("skipping image without complete geometry information");
                }
                record
            })
            .collect();

        if records.is_empty() {
            return Err(GeometryLoadError::NoValidImages);
        }

        Self::validate_records(&records)?;

        let normal = Self::normal_of(&records[0].orientation);
        Self::sort_records(&mut records, normal);

        let projections: Vec<f64> = records
            .iter()
            .map(|record| Self::dot(record.position, normal))
            .collect();
        let spacing_z = match Self::spacing_from_projections(&projections) {
            Some(spacing) => spacing,
            None => Self::slice_thickness(dicom_objects).ok_or(GeometryLoadError::MissingSpacing)?,
        };

        Ok(Self::geometry_from_records(&records, spacing_z))
    }

    /// Load the reference grid geometry from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
    ) -> Result<GridGeometry, GeometryLoadError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::from_dicom_objects(&objects?)
    }

    /// Load the reference grid geometry from a directory containing .dcm files
    pub fn load_from_directory(path: impl AsRef<Path>) -> Result<GridGeometry, GeometryLoadError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(GeometryLoadError::NoValidImages);
        }

        Self::load_from_file_paths(&paths)
    }

    fn extract_record(dicom_object: &InMemDicomObject) -> Option<SliceRecord> {
        let position = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        let orientation = dicom_object
            .element(tags::IMAGE_ORIENTATION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        let pixel_spacing = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()?
            .to_multi_float64()
            .ok()?;
        let rows = dicom_object.element(tags::ROWS).ok()?.to_int::<u32>().ok()?;
        let columns = dicom_object
            .element(tags::COLUMNS)
            .ok()?
            .to_int::<u32>()
            .ok()?;

        if position.len() < 3 || orientation.len() < 6 || pixel_spacing.len() < 2 {
            return None;
        }

        Some(SliceRecord {
            position: [position[0], position[1], position[2]],
            orientation: [
                orientation[0],
                orientation[1],
                orientation[2],
                orientation[3],
                orientation[4],
                orientation[5],
            ],
            row_spacing: pixel_spacing[0],
            column_spacing: pixel_spacing[1],
            rows,
            columns,
        })
    }

    fn validate_records(records: &[SliceRecord]) -> Result<(), GeometryLoadError> {
        let first = &records[0];
        if records.iter().any(|record| {
            record.rows != first.rows
                || record.columns != first.columns
                || record.row_spacing != first.row_spacing
                || record.column_spacing != first.column_spacing
        }) {
            return Err(GeometryLoadError::InconsistentDimensions);
        }
        Ok(())
    }

    fn sort_records(records: &mut [SliceRecord], normal: [f64; 3]) {
        records.sort_by(|a, b| {
            let pa = Self::dot(a.position, normal);
            let pb = Self::dot(b.position, normal);
            pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Mean gap between consecutive slice projections, `None` for fewer
    /// than two slices.
    fn spacing_from_projections(projections: &[f64]) -> Option<f64> {
        if projections.len() < 2 {
            return None;
        }
        let gaps: Vec<f64> = projections.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if gaps.iter().any(|gap| (gap - mean).abs() > 1e-3) {
            log::warn!("slice positions are not uniformly spaced");
        }
        Some(mean)
    }

    fn slice_thickness(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<f64> {
        dicom_objects.iter().find_map(|dicom_object| {
            dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float64()
                .ok()
        })
    }

    /// Assembles the grid from sorted records. Spacing and size follow the
    /// `(x, y, z)` convention, so PixelSpacing's `[row, column]` order and
    /// Rows/Columns swap places here.
    fn geometry_from_records(records: &[SliceRecord], spacing_z: f64) -> GridGeometry {
        let first = &records[0];
        GridGeometry::new(
            (first.column_spacing, first.row_spacing, spacing_z),
            (first.position[0], first.position[1], first.position[2]),
            Self::direction_from_orientation(&first.orientation),
            (first.columns as usize, first.rows as usize, records.len()),
        )
    }

    /// Direction cosine matrix with row, column and normal vectors as
    /// columns, the normal being row x column.
    fn direction_from_orientation(orientation: &[f64; 6]) -> [f64; 9] {
        let row = [orientation[0], orientation[1], orientation[2]];
        let col = [orientation[3], orientation[4], orientation[5]];
        let normal = Self::cross(row, col);
        [
            row[0], col[0], normal[0], row[1], col[1], normal[1], row[2], col[2], normal[2],
        ]
    }

    fn normal_of(orientation: &[f64; 6]) -> [f64; 3] {
        Self::cross(
            [orientation[0], orientation[1], orientation[2]],
            [orientation[3], orientation[4], orientation[5]],
        )
    }

    fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }
}
