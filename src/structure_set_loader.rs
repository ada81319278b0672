use crate::{
    enums::ContourGeometry,
    structure_set::{Contour, Roi, RoiObservation, StructureSet, StructureSetError},
};

use dicom::object::{InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureSetLoadError {
    #[error("No StructureSetROISequence present")]
    NotAStructureSet,

    #[error("No DICOM files found")]
    NoDicomFiles,

    #[error("Structure set error: {0}")]
    StructureSet(#[from] StructureSetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

pub struct StructureSetLoader;

impl StructureSetLoader {
    /// Load a structure set from an RTSTRUCT file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or carries no
    /// StructureSetROISequence
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<StructureSet, StructureSetLoadError> {
        let object = open_file(path.as_ref())?;
        Self::from_dicom_object(&object)
    }

    /// Load a structure set from a file path or from the first `.dcm` entry
    /// of a directory (sorted by name)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<StructureSet, StructureSetLoadError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Self::load_from_file(path);
        }
        let mut paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        paths.sort();
        let first = paths.first().ok_or(StructureSetLoadError::NoDicomFiles)?;
        Self::load_from_file(first)
    }

    /// Extract a structure set from a DICOM object already in memory
    ///
    /// ROIs keep their sequence order. Contours attach to ROIs through
    /// ReferencedROINumber; malformed sequence items are skipped with a
    /// warning rather than failing the whole read.
    pub fn from_dicom_object(
        object: &InMemDicomObject,
    ) -> Result<StructureSet, StructureSetLoadError> {
        let roi_items = object
            .element(tags::STRUCTURE_SET_ROI_SEQUENCE)
            .ok()
            .and_then(|element| element.items())
            .ok_or(StructureSetLoadError::NotAStructureSet)?;

        let mut contours_by_number = Self::extract_contours(object);

        let mut rois = Vec::new();
        let mut seen_names = HashSet::new();
        for item in roi_items {
            let Some((number, name)) = Self::extract_identity(item) else {
                log::warn!("skipping structure set ROI item without number or name");
                continue;
            };
            if !seen_names.insert(name.clone()) {
                log::warn!("skipping duplicate ROI name '{name}'");
                continue;
            }
            let contours = contours_by_number.remove(&number).unwrap_or_default();
            if contours.is_empty() {
                log::warn!("ROI '{name}' carries no contour data");
            }
            rois.push(Roi::new(name, number, contours));
        }

        for number in contours_by_number.keys() {
            log::warn!("discarding contours referencing unknown ROI number {number}");
        }

        let label = object
            .element(tags::STRUCTURE_SET_LABEL)
            .ok()
            .and_then(|element| element.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(StructureSet::new(
            label,
            rois,
            Self::extract_observations(object),
        )?)
    }

    fn extract_identity(item: &InMemDicomObject) -> Option<(u32, String)> {
        let number = item.element(tags::ROI_NUMBER).ok()?.to_int::<u32>().ok()?;
        let name = item
            .element(tags::ROI_NAME)
            .ok()?
            .to_str()
            .ok()?
            .trim()
            .to_string();
        Some((number, name))
    }

    fn extract_contours(object: &InMemDicomObject) -> HashMap<u32, Vec<Contour>> {
        let mut by_number: HashMap<u32, Vec<Contour>> = HashMap::new();

        let roi_contour_items = object
            .element(tags::ROI_CONTOUR_SEQUENCE)
            .ok()
            .and_then(|element| element.items());

        for item in roi_contour_items.into_iter().flatten() {
            let Some(number) = item
                .element(tags::REFERENCED_ROI_NUMBER)
                .ok()
                .and_then(|element| element.to_int::<u32>().ok())
            else {
                log::warn!("skipping ROI contour item without ReferencedROINumber");
                continue;
            };

            let collected = by_number.entry(number).or_default();
            let contour_items = item
                .element(tags::CONTOUR_SEQUENCE)
                .ok()
                .and_then(|element| element.items());
            for contour_item in contour_items.into_iter().flatten() {
                match Self::extract_contour(contour_item) {
                    Some(contour) => collected.push(contour),
                    None => log::warn!("skipping malformed contour of ROI {number}"),
                }
            }
        }

        by_number
    }

    /// Reads one ContourSequence item.
    ///
    /// ContourData must hold at least two complete `(x, y, z)` triples;
    /// a missing ContourGeometricType means CLOSED_PLANAR. The hole flag
    /// comes from the nonstandard ContourStatus attribute some planning
    /// systems write ("SUB" marks a subtraction contour). ContourStatus is
    /// not in the standard dictionary, so the by-name probe only resolves
    /// when the consumer registers the private attribute; otherwise the
    /// flag stays false and holes must be set on the `Contour` directly.
    fn extract_contour(item: &InMemDicomObject) -> Option<Contour> {
        let data = item
            .element(tags::CONTOUR_DATA)
            .ok()?
            .to_multi_float64()
            .ok()?;
        if data.len() < 6 || data.len() % 3 != 0 {
            return None;
        }
        let points = data.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();

        let geometry = item
            .element(tags::CONTOUR_GEOMETRIC_TYPE)
            .ok()
            .and_then(|element| element.to_str().ok())
            .map(|value| ContourGeometry::from_dicom(&value))
            .unwrap_or_default();

        let is_hole = item
            .element_by_name("ContourStatus")
            .ok()
            .and_then(|element| element.to_str().ok())
            .is_some_and(|value| value.trim() == "SUB");

        Some(Contour::new(points, geometry, is_hole))
    }

    fn extract_observations(object: &InMemDicomObject) -> Vec<RoiObservation> {
        let items = object
            .element(tags::RTROI_OBSERVATIONS_SEQUENCE)
            .ok()
            .and_then(|element| element.items());

        let mut observations = Vec::new();
        for item in items.into_iter().flatten() {
            let Some(number) = item
                .element(tags::REFERENCED_ROI_NUMBER)
                .ok()
                .and_then(|element| element.to_int::<u32>().ok())
            else {
                log::warn!("skipping RT ROI observation without ReferencedROINumber");
                continue;
            };
            observations.push(RoiObservation {
                referenced_roi_number: number,
                label: Self::item_string(item, tags::ROI_OBSERVATION_LABEL),
                interpreted_type: Self::item_string(item, tags::RTROI_INTERPRETED_TYPE),
            });
        }
        observations
    }

    fn item_string(item: &InMemDicomObject, tag: dicom::core::Tag) -> Option<String> {
        item.element(tag)
            .ok()
            .and_then(|element| element.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
