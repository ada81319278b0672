use std::collections::BTreeMap;

use image::ImageBuffer;
use image::Luma;
use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

use crate::enums::HoleRule;
use crate::geometry::GridGeometry;
use crate::rasterize::{SliceContour, compose_slice};
use crate::structure_set::{Roi, StructureSet, StructureSetError};

/// A binary voxel volume tied to its grid geometry.
///
/// Voxels are stored as `u8` in `(z, y, x)` order; any nonzero value
/// counts as set. Algebra operations treat volumes as read-only and
/// require operands to share one geometry.
#[derive(Debug, Clone)]
pub struct MaskVolume {
    data: Array3<u8>,
    geometry: GridGeometry,
}

impl MaskVolume {
    pub fn new(data: Array3<u8>, geometry: GridGeometry) -> Self {
        debug_assert_eq!(data.dim(), geometry.array_dim());
        Self { data, geometry }
    }

    /// All-false volume over the given grid.
    pub fn empty(geometry: GridGeometry) -> Self {
        let data = Array3::zeros(geometry.array_dim());
        Self { data, geometry }
    }

    /// Get the dimensions of the volume (slices, rows, columns)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// Number of set voxels.
    pub fn voxel_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Physical volume of the set voxels in mm^3.
    pub fn physical_volume(&self) -> f64 {
        self.voxel_count() as f64 * self.geometry.voxel_volume()
    }

    pub fn slice(&self, index: usize) -> Option<ArrayView2<'_, u8>> {
        if index >= self.data.dim().0 {
            return None;
        }
        Some(self.data.slice(s![index, .., ..]))
    }

    /// Renders one slice as an 8-bit grayscale image, set voxels white.
    pub fn slice_image(&self, index: usize) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let slice = self.slice(index)?;
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = slice.iter().map(|&v| if v != 0 { 255 } else { 0 }).collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

/// Assembly options for [`MaskBuilder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskOptions {
    /// Fill enclosed background on each composed slice.
    pub fill_holes: bool,
    pub hole_rule: HoleRule,
}

/// Assembles binary mask volumes from ROI contours.
pub struct MaskBuilder;

impl MaskBuilder {
    /// Looks up an ROI by name and assembles its mask.
    pub fn build(
        set: &StructureSet,
        roi_name: &str,
        geometry: &GridGeometry,
        options: MaskOptions,
    ) -> Result<MaskVolume, StructureSetError> {
        let roi = set.roi(roi_name)?;
        Self::assemble(roi, geometry, options)
    }

    /// Rasterizes one ROI onto the grid.
    ///
    /// Contours are grouped by resolved slice index; one that is malformed
    /// or lands outside the grid is skipped with a warning and never fails
    /// the rest. Grouped slices compose independently (in parallel) and
    /// untouched slices stay all-false. An ROI whose every contour was
    /// skipped fails with [`StructureSetError::RoiHasNoContours`].
    pub fn assemble(
        roi: &Roi,
        geometry: &GridGeometry,
        options: MaskOptions,
    ) -> Result<MaskVolume, StructureSetError> {
        if !geometry.is_axis_aligned() {
            log::warn!(
                "grid for ROI '{}' is not axis aligned; in-plane projection ignores direction cosines",
                roi.name
            );
        }

        let slice_contours = Self::group_by_slice(roi, geometry);
        if slice_contours.is_empty() {
            return Err(StructureSetError::RoiHasNoContours(roi.name.clone()));
        }

        let (nz, ny, nx) = geometry.array_dim();
        let jobs: Vec<(usize, Vec<SliceContour>)> = slice_contours.into_iter().collect();
        let composed: Vec<(usize, Array2<u8>)> = jobs
            .into_par_iter()
            .map(|(slice_index, contours)| {
                let slice =
                    compose_slice(&contours, (ny, nx), options.hole_rule, options.fill_holes);
                (slice_index, slice)
            })
            .collect();

        let mut volume = Array3::zeros((nz, ny, nx));
        for (slice_index, slice) in composed {
            volume.slice_mut(s![slice_index, .., ..]).assign(&slice);
        }
        Ok(MaskVolume::new(volume, geometry.clone()))
    }

    /// Projects usable contours into voxel coordinates, keyed by slice.
    fn group_by_slice(roi: &Roi, geometry: &GridGeometry) -> BTreeMap<usize, Vec<SliceContour>> {
        let mut grouped: BTreeMap<usize, Vec<SliceContour>> = BTreeMap::new();
        for (position, contour) in roi.contours.iter().enumerate() {
            if contour.points.len() < 2 {
                log::warn!(
                    "contour {position} of ROI '{}' has fewer than 2 points, skipping",
                    roi.name
                );
                continue;
            }
            // The length guard above guarantees a first point.
            let z = contour.points[0][2];
            let slice_index = match geometry.slice_index(z) {
                Some(index) => index,
                None => {
                    log::warn!(
                        "contour {position} of ROI '{}' at z={z:.3} is outside the grid, skipping",
                        roi.name
                    );
                    continue;
                }
            };
            let points = contour
                .points
                .iter()
                .map(|p| geometry.to_voxel_xy(p[0], p[1]))
                .collect();
            grouped
                .entry(slice_index)
                .or_default()
                .push(SliceContour::new(points, contour.geometry, contour.is_hole));
        }
        grouped
    }
}
