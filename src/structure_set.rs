use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::enums::ContourGeometry;
use crate::geometry::nearly_equal;

#[derive(Debug, Error)]
pub enum StructureSetError {
    #[error("ROI '{0}' not found in structure set")]
    RoiNotFound(String),
    #[error("Duplicate ROI name '{0}'")]
    DuplicateName(String),
    #[error("ROI '{0}' has no usable contour data")]
    RoiHasNoContours(String),
}

/// One planar contour in physical coordinates (mm).
///
/// Contours are read-only once extracted: registry operations filter or
/// re-own them but never edit the point data.
#[derive(Debug, Clone)]
pub struct Contour {
    /// `[x, y, z]` triples; all points of a planar contour share one Z.
    pub points: Vec<[f64; 3]>,
    pub geometry: ContourGeometry,
    /// True when the source marked this contour as a subtraction region.
    pub is_hole: bool,
}

impl Contour {
    pub fn new(points: Vec<[f64; 3]>, geometry: ContourGeometry, is_hole: bool) -> Self {
        Self {
            points,
            geometry,
            is_hole,
        }
    }

    /// Z position of the contour plane, taken from the first point.
    pub fn z(&self) -> Option<f64> {
        self.points.first().map(|p| p[2])
    }

    /// Whether the point list already repeats its first point at the end.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => first
                .iter()
                .zip(last.iter())
                .all(|(a, b)| nearly_equal(*a, *b)),
            _ => false,
        }
    }
}

/// A region of interest: identity plus its owned contours.
#[derive(Debug, Clone)]
pub struct Roi {
    /// Unique within a structure set.
    pub name: String,
    /// Cross-reference key used by dependent records.
    pub number: u32,
    pub contours: Vec<Contour>,
}

impl Roi {
    pub fn new(name: impl Into<String>, number: u32, contours: Vec<Contour>) -> Self {
        Self {
            name: name.into(),
            number,
            contours,
        }
    }
}

/// Per-ROI observation record, keyed by ROI number.
#[derive(Debug, Clone)]
pub struct RoiObservation {
    pub referenced_roi_number: u32,
    pub label: Option<String>,
    pub interpreted_type: Option<String>,
}

/// Owner of all ROIs of one structure set, with a name registry on top.
///
/// Storage is a flat arena (`Vec<Roi>` plus observation records); the
/// name index is derived and rebuilt after every mutating operation, so
/// there are no back-references to keep consistent.
#[derive(Debug, Clone, Default)]
pub struct StructureSet {
    label: Option<String>,
    rois: Vec<Roi>,
    observations: Vec<RoiObservation>,
    index: HashMap<String, (usize, u32)>,
}

impl StructureSet {
    /// Builds a structure set and its name index.
    ///
    /// Fails with [`StructureSetError::DuplicateName`] when two ROIs share
    /// a name; lookup by name must stay unambiguous.
    pub fn new(
        label: Option<String>,
        rois: Vec<Roi>,
        observations: Vec<RoiObservation>,
    ) -> Result<Self, StructureSetError> {
        let mut seen = HashSet::with_capacity(rois.len());
        for roi in &rois {
            if !seen.insert(roi.name.as_str()) {
                return Err(StructureSetError::DuplicateName(roi.name.clone()));
            }
        }
        let mut set = Self {
            label,
            rois,
            observations,
            index: HashMap::new(),
        };
        set.rebuild_index();
        Ok(set)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    pub fn observations(&self) -> &[RoiObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// ROI names in sequence order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rois.iter().map(|roi| roi.name.as_str())
    }

    /// Resolves an ROI name to `(sequence index, ROI number)`.
    pub fn lookup(&self, name: &str) -> Result<(usize, u32), StructureSetError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StructureSetError::RoiNotFound(name.to_string()))
    }

    pub fn roi(&self, name: &str) -> Result<&Roi, StructureSetError> {
        let (index, _) = self.lookup(name)?;
        Ok(&self.rois[index])
    }

    /// Renames ROIs according to an old-name to new-name map.
    ///
    /// The whole map is applied atomically: if any resulting name would
    /// collide, the call fails with [`StructureSetError::DuplicateName`]
    /// and nothing changes. Old names absent from the set are ignored;
    /// swaps (`A -> B`, `B -> A`) are legal.
    pub fn rename(&mut self, rename_map: &HashMap<String, String>) -> Result<(), StructureSetError> {
        if rename_map.is_empty() {
            return Ok(());
        }
        let mut seen = HashSet::with_capacity(self.rois.len());
        for roi in &self.rois {
            let target = rename_map
                .get(&roi.name)
                .map(String::as_str)
                .unwrap_or(roi.name.as_str());
            if !seen.insert(target) {
                return Err(StructureSetError::DuplicateName(target.to_string()));
            }
        }
        for roi in &mut self.rois {
            if let Some(new_name) = rename_map.get(&roi.name) {
                log::info!("renamed ROI '{}' to '{}'", roi.name, new_name);
                roi.name = new_name.clone();
            }
        }
        self.rebuild_index();
        Ok(())
    }

    /// Keeps only the named ROIs, cascading the removal.
    ///
    /// Contours die with their ROI; observation records referencing a
    /// removed ROI number are dropped so no record dangles. Names that
    /// match nothing are ignored.
    pub fn prune(&mut self, keep: &[&str]) {
        let keep: HashSet<&str> = keep.iter().copied().collect();
        self.rois.retain(|roi| keep.contains(roi.name.as_str()));
        let numbers: HashSet<u32> = self.rois.iter().map(|roi| roi.number).collect();
        self.observations
            .retain(|obs| numbers.contains(&obs.referenced_roi_number));
        self.rebuild_index();
        log::info!("pruned structure set to {} ROIs", self.rois.len());
    }

    /// Reports whether an ROI's contour planes are equally spaced in Z.
    ///
    /// Consecutive gaps between sorted plane positions are rounded to five
    /// decimals and compared; fewer than two positions is trivially
    /// uniform. An ROI without contour data cannot be judged and fails
    /// with [`StructureSetError::RoiHasNoContours`].
    pub fn roi_has_uniform_spacing(&self, name: &str) -> Result<bool, StructureSetError> {
        let roi = self.roi(name)?;
        if roi.contours.is_empty() {
            return Err(StructureSetError::RoiHasNoContours(name.to_string()));
        }
        let mut z_values: Vec<f64> = roi.contours.iter().filter_map(Contour::z).collect();
        if z_values.len() < 2 {
            return Ok(true);
        }
        z_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mut gaps = z_values
            .windows(2)
            .map(|pair| ((pair[1] - pair[0]) * 1e5).round() / 1e5);
        let first = match gaps.next() {
            Some(gap) => gap,
            None => return Ok(true),
        };
        Ok(gaps.all(|gap| gap == first))
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .rois
            .iter()
            .enumerate()
            .map(|(index, roi)| (roi.name.clone(), (index, roi.number)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar_contour(z: f64) -> Contour {
        Contour::new(
            vec![[0.0, 0.0, z], [10.0, 0.0, z], [10.0, 10.0, z]],
            ContourGeometry::ClosedPlanar,
            false,
        )
    }

    fn roi_at(name: &str, number: u32, z_positions: &[f64]) -> Roi {
        Roi::new(
            name,
            number,
            z_positions.iter().map(|&z| planar_contour(z)).collect(),
        )
    }

    fn observation(number: u32) -> RoiObservation {
        RoiObservation {
            referenced_roi_number: number,
            label: Some(format!("obs-{number}")),
            interpreted_type: Some("ORGAN".to_string()),
        }
    }

    fn sample_set() -> StructureSet {
        StructureSet::new(
            Some("pelvis".to_string()),
            vec![
                roi_at("GTV", 1, &[0.0, 2.5, 5.0]),
                roi_at("Bladder", 2, &[0.0, 2.5]),
                roi_at("Rectum", 3, &[2.5]),
            ],
            vec![observation(1), observation(2), observation(3)],
        )
        .unwrap()
    }

    #[test]
    fn lookup_returns_index_and_number() {
        let set = sample_set();
        assert_eq!(set.lookup("Bladder").unwrap(), (1, 2));
        assert_eq!(set.lookup("GTV").unwrap(), (0, 1));
    }

    #[test]
    fn lookup_unknown_name_fails() {
        let err = sample_set().lookup("Femur_L").unwrap_err();
        assert!(matches!(err, StructureSetError::RoiNotFound(name) if name == "Femur_L"));
    }

    #[test]
    fn construction_rejects_duplicate_names() {
        let err = StructureSet::new(
            None,
            vec![roi_at("GTV", 1, &[0.0]), roi_at("GTV", 2, &[0.0])],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StructureSetError::DuplicateName(_)));
    }

    #[test]
    fn rename_remaps_names_and_keeps_numbers() {
        let mut set = sample_set();
        let map = HashMap::from([("GTV".to_string(), "GTV_primary".to_string())]);
        set.rename(&map).unwrap();
        assert_eq!(set.lookup("GTV_primary").unwrap(), (0, 1));
        assert!(set.lookup("GTV").is_err());
    }

    #[test]
    fn rename_collision_fails_without_mutating() {
        let mut set = sample_set();
        let map = HashMap::from([("GTV".to_string(), "Rectum".to_string())]);
        let err = set.rename(&map).unwrap_err();
        assert!(matches!(err, StructureSetError::DuplicateName(name) if name == "Rectum"));
        // Nothing moved.
        assert_eq!(set.lookup("GTV").unwrap(), (0, 1));
        assert_eq!(set.lookup("Rectum").unwrap(), (2, 3));
    }

    #[test]
    fn rename_swap_is_legal() {
        let mut set = sample_set();
        let map = HashMap::from([
            ("GTV".to_string(), "Bladder".to_string()),
            ("Bladder".to_string(), "GTV".to_string()),
        ]);
        set.rename(&map).unwrap();
        assert_eq!(set.lookup("Bladder").unwrap(), (0, 1));
        assert_eq!(set.lookup("GTV").unwrap(), (1, 2));
    }

    #[test]
    fn rename_to_same_target_twice_fails() {
        let mut set = sample_set();
        let map = HashMap::from([
            ("GTV".to_string(), "Target".to_string()),
            ("Bladder".to_string(), "Target".to_string()),
        ]);
        assert!(set.rename(&map).is_err());
    }

    #[test]
    fn prune_cascades_to_observations_and_reindexes() {
        let mut set = sample_set();
        set.prune(&["Rectum", "NotPresent"]);
        assert_eq!(set.len(), 1);
        // Index positions are rebuilt, not carried over.
        assert_eq!(set.lookup("Rectum").unwrap(), (0, 3));
        assert!(set.lookup("GTV").is_err());
        assert_eq!(set.observations().len(), 1);
        assert_eq!(set.observations()[0].referenced_roi_number, 3);
    }

    #[test]
    fn prune_with_empty_keep_clears_everything() {
        let mut set = sample_set();
        set.prune(&[]);
        assert!(set.is_empty());
        assert!(set.observations().is_empty());
    }

    #[test]
    fn uniform_spacing_accepts_equal_gaps() {
        let set = sample_set();
        assert!(set.roi_has_uniform_spacing("GTV").unwrap());
        assert!(set.roi_has_uniform_spacing("Rectum").unwrap());
    }

    #[test]
    fn uniform_spacing_rejects_a_missing_plane() {
        let set = StructureSet::new(
            None,
            vec![roi_at("PTV", 7, &[0.0, 2.5, 7.5])],
            Vec::new(),
        )
        .unwrap();
        assert!(!set.roi_has_uniform_spacing("PTV").unwrap());
    }

    #[test]
    fn uniform_spacing_tolerates_sub_micron_jitter() {
        let set = StructureSet::new(
            None,
            vec![roi_at("PTV", 7, &[0.0, 2.500001, 5.000002])],
            Vec::new(),
        )
        .unwrap();
        assert!(set.roi_has_uniform_spacing("PTV").unwrap());
    }

    #[test]
    fn uniform_spacing_needs_contour_data() {
        let set = StructureSet::new(None, vec![Roi::new("Empty", 9, Vec::new())], Vec::new()).unwrap();
        let err = set.roi_has_uniform_spacing("Empty").unwrap_err();
        assert!(matches!(err, StructureSetError::RoiHasNoContours(_)));
    }

    #[test]
    fn contour_closure_test_uses_tolerance() {
        let open = planar_contour(0.0);
        assert!(!open.is_closed());
        let mut closed = planar_contour(0.0);
        closed.points.push([1e-9, -1e-9, 0.0]);
        assert!(closed.is_closed());
    }
}
