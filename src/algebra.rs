use ndarray::Array3;
use thiserror::Error;

use crate::enums::Connectivity;
use crate::mask::MaskVolume;

#[derive(Debug, Error)]
pub enum AlgebraError {
    #[error("Mask {index} does not share the reference grid geometry")]
    GeometryMismatch { index: usize },
    #[error("No input masks were provided")]
    EmptyInput,
    #[error("Parameter '{name}' must lie in [0, 1], got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// One labeled component of a mask.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInfo {
    /// Label value in the component image, starting at 1.
    pub label: u32,
    pub voxels: usize,
    pub volume_mm3: f64,
}

/// Voxelwise union of the input masks.
///
/// Commutative and associative; operands are read-only. Every operand
/// must share the first operand's grid geometry. An all-false operand
/// contributes nothing and logs a warning; when every operand is
/// all-false the union is all-false, with a warning. An empty operand
/// list fails with [`AlgebraError::EmptyInput`].
pub fn combine(masks: &[&MaskVolume]) -> Result<MaskVolume, AlgebraError> {
    let reference = *masks.first().ok_or(AlgebraError::EmptyInput)?;
    ensure_shared_geometry(reference, masks)?;

    let mut result = MaskVolume::empty(reference.geometry().clone());
    let mut any_set = false;
    for (index, mask) in masks.iter().enumerate() {
        if mask.is_empty() {
            log::warn!("mask {index} is empty and contributes nothing to the union");
            continue;
        }
        any_set = true;
        result
            .data_mut()
            .zip_mut_with(mask.data(), |out, &v| *out |= (v != 0) as u8);
    }
    if !any_set {
        log::warn!("all input masks were empty; the union is empty");
    }
    Ok(result)
}

/// Removes `b`'s set voxels from `a`, voxelwise `a AND NOT b`.
///
/// Inputs are read-only and must share one grid geometry. An all-false
/// `b` changes nothing and logs a warning; an all-false `a` yields an
/// all-false result without one, that outcome is legitimate.
pub fn subtract(a: &MaskVolume, b: &MaskVolume) -> Result<MaskVolume, AlgebraError> {
    if b.geometry() != a.geometry() {
        return Err(AlgebraError::GeometryMismatch { index: 1 });
    }
    let mut result = a.clone();
    if b.is_empty() {
        log::warn!("subtrahend mask is empty; no voxels were removed");
        return Ok(result);
    }
    if a.is_empty() {
        return Ok(result);
    }
    result.data_mut().zip_mut_with(b.data(), |out, &v| {
        if v != 0 {
            *out = 0;
        }
    });
    Ok(result)
}

/// Drops connected components smaller than `threshold` times the largest.
///
/// Components connect with full 26-neighborhood adjacency and compare by
/// physical volume (voxel count times voxel volume). Every component with
/// volume at least `threshold * max` survives: `0.0` keeps everything,
/// `1.0` keeps only maximal components, ties included. `threshold`
/// outside `[0.0, 1.0]` fails with [`AlgebraError::InvalidParameter`];
/// an all-false input comes back unchanged.
pub fn remove_small_islands(
    mask: &MaskVolume,
    threshold: f64,
) -> Result<MaskVolume, AlgebraError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AlgebraError::InvalidParameter {
            name: "threshold",
            value: threshold,
        });
    }

    let (labels, components) = label_components(mask, Connectivity::Full);
    if components.is_empty() {
        return Ok(mask.clone());
    }

    let max_volume = components
        .iter()
        .map(|component| component.volume_mm3)
        .fold(0.0, f64::max);
    let cutoff = max_volume * threshold;
    let keep: Vec<bool> = components
        .iter()
        .map(|component| component.volume_mm3 >= cutoff)
        .collect();
    log::debug!(
        "keeping {} of {} components at threshold {threshold}",
        keep.iter().filter(|&&k| k).count(),
        components.len()
    );

    let mut result = MaskVolume::empty(mask.geometry().clone());
    result.data_mut().zip_mut_with(&labels, |out, &label| {
        if label != 0 && keep[(label - 1) as usize] {
            *out = 1;
        }
    });
    Ok(result)
}

/// Labels connected foreground components; 0 stays background.
///
/// Raster-scan seeding with an explicit stack flood. Labels count up from
/// 1 in scan order, and the info entry for label `n` sits at `n - 1`.
pub fn label_components(
    mask: &MaskVolume,
    connectivity: Connectivity,
) -> (Array3<u32>, Vec<ComponentInfo>) {
    let data = mask.data();
    let (dim_z, dim_y, dim_x) = data.dim();
    let mut labels = Array3::<u32>::zeros((dim_z, dim_y, dim_x));
    let mut components: Vec<ComponentInfo> = Vec::new();
    let voxel_volume = mask.geometry().voxel_volume();
    let offsets = neighbor_offsets(connectivity);
    let mut stack: Vec<(usize, usize, usize)> =
        Vec::with_capacity(dim_z * dim_y * dim_x / 10 + 64);

    for z in 0..dim_z {
        for y in 0..dim_y {
            for x in 0..dim_x {
                if data[[z, y, x]] == 0 || labels[[z, y, x]] != 0 {
                    continue;
                }

                let label = components.len() as u32 + 1;
                let mut voxels = 0usize;
                labels[[z, y, x]] = label;
                stack.push((z, y, x));

                while let Some((cz, cy, cx)) = stack.pop() {
                    voxels += 1;
                    for &(dz, dy, dx) in &offsets {
                        let nz = cz as i64 + dz;
                        let ny = cy as i64 + dy;
                        let nx = cx as i64 + dx;
                        if nz < 0
                            || nz >= dim_z as i64
                            || ny < 0
                            || ny >= dim_y as i64
                            || nx < 0
                            || nx >= dim_x as i64
                        {
                            continue;
                        }
                        let next = (nz as usize, ny as usize, nx as usize);
                        if data[[next.0, next.1, next.2]] != 0
                            && labels[[next.0, next.1, next.2]] == 0
                        {
                            labels[[next.0, next.1, next.2]] = label;
                            stack.push(next);
                        }
                    }
                }

                components.push(ComponentInfo {
                    label,
                    voxels,
                    volume_mm3: voxels as f64 * voxel_volume,
                });
            }
        }
    }
    (labels, components)
}

fn neighbor_offsets(connectivity: Connectivity) -> Vec<(i64, i64, i64)> {
    let mut offsets = Vec::new();
    for dz in -1..=1i64 {
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                if dz == 0 && dy == 0 && dx == 0 {
                    continue;
                }
                if connectivity == Connectivity::Face && dz.abs() + dy.abs() + dx.abs() != 1 {
                    continue;
                }
                offsets.push((dz, dy, dx));
            }
        }
    }
    offsets
}

fn ensure_shared_geometry(
    reference: &MaskVolume,
    masks: &[&MaskVolume],
) -> Result<(), AlgebraError> {
    for (index, mask) in masks.iter().enumerate() {
        if mask.geometry() != reference.geometry() {
            return Err(AlgebraError::GeometryMismatch { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ContourGeometry;
    use crate::geometry::GridGeometry;
    use crate::mask::{MaskBuilder, MaskOptions};
    use crate::structure_set::{Contour, Roi};
    use crate::test_grids::unit_mask;

    #[test]
    fn combine_is_order_independent() {
        let a = unit_mask(&["
            ##..
            ....
            ....
        "]);
        let b = unit_mask(&["
            ...#
            ...#
            ....
        "]);
        let c = unit_mask(&["
            ....
            ....
            .##.
        "]);
        let forward = combine(&[&a, &b, &c]).unwrap();
        let backward = combine(&[&c, &b, &a]).unwrap();
        assert_eq!(forward.data(), backward.data());
        assert_eq!(forward.voxel_count(), 6);
    }

    #[test]
    fn combine_requires_at_least_one_mask() {
        assert!(matches!(combine(&[]).unwrap_err(), AlgebraError::EmptyInput));
    }

    #[test]
    fn combine_rejects_mismatched_geometry() {
        let a = unit_mask(&["
            ##
            ##
        "]);
        let b = MaskVolume::new(
            a.data().clone(),
            GridGeometry::axis_aligned((1.0, 1.0, 2.0), (0.0, 0.0, 0.0), (2, 2, 1)),
        );
        let err = combine(&[&a, &b]).unwrap_err();
        assert!(matches!(err, AlgebraError::GeometryMismatch { index: 1 }));
    }

    #[test]
    fn combine_of_all_empty_masks_is_empty() {
        let a = unit_mask(&["
            ..
            ..
        "]);
        let union = combine(&[&a, &a]).unwrap();
        assert!(union.is_empty());
    }

    #[test]
    fn subtract_of_a_mask_from_itself_is_empty() {
        let a = unit_mask(&["
            ##.
            .#.
            ...
        "]);
        assert!(subtract(&a, &a).unwrap().is_empty());
    }

    #[test]
    fn subtract_of_an_empty_mask_changes_nothing() {
        let a = unit_mask(&["
            ##.
            .#.
            ...
        "]);
        let empty = MaskVolume::empty(a.geometry().clone());
        let result = subtract(&a, &empty).unwrap();
        assert_eq!(result.data(), a.data());
        // The other way around stays empty.
        assert!(subtract(&empty, &a).unwrap().is_empty());
    }

    #[test]
    fn subtract_leaves_inputs_untouched() {
        let a = unit_mask(&["
            ###
            ###
            ###
        "]);
        let b = unit_mask(&["
            .#.
            .#.
            .#.
        "]);
        let result = subtract(&a, &b).unwrap();
        assert_eq!(result.voxel_count(), 6);
        assert_eq!(a.voxel_count(), 9);
        assert_eq!(b.voxel_count(), 3);
    }

    #[test]
    fn subtract_rejects_mismatched_geometry() {
        let a = unit_mask(&["
            ##
            ##
        "]);
        let b = unit_mask(&["
            ##
            ##
            ##
        "]);
        assert!(matches!(
            subtract(&a, &b).unwrap_err(),
            AlgebraError::GeometryMismatch { index: 1 }
        ));
    }

    #[test]
    fn labeling_separates_disconnected_regions() {
        let mask = unit_mask(&["
            #..#
            ....
            #..#
        "]);
        let (_, components) = label_components(&mask, Connectivity::Full);
        assert_eq!(components.len(), 4);
        assert!(components.iter().all(|c| c.voxels == 1));
    }

    #[test]
    fn full_connectivity_joins_diagonal_voxels() {
        let diagonal = unit_mask(&["
            #..
            .#.
            ..#
        "]);
        let (_, full) = label_components(&diagonal, Connectivity::Full);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].voxels, 3);
        let (_, face) = label_components(&diagonal, Connectivity::Face);
        assert_eq!(face.len(), 3);
    }

    #[test]
    fn labeling_connects_across_slices() {
        // The same in-plane voxel on three consecutive slices is one column.
        let column = unit_mask(&[
            "
            #.
            ..
            ",
            "
            #.
            ..
            ",
            "
            #.
            ..
            ",
        ]);
        let (_, components) = label_components(&column, Connectivity::Face);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].voxels, 3);
    }

    #[test]
    fn island_threshold_zero_keeps_everything() {
        let mask = unit_mask(&["
            #..#
            #...
            ....
        "]);
        let result = remove_small_islands(&mask, 0.0).unwrap();
        assert_eq!(result.data(), mask.data());
    }

    #[test]
    fn island_threshold_one_keeps_maximal_components_with_ties() {
        let tied = unit_mask(&["
            ##..
            ....
            ..##
        "]);
        let result = remove_small_islands(&tied, 1.0).unwrap();
        assert_eq!(result.voxel_count(), 4);

        let skewed = unit_mask(&["
            ##.#
            ##..
            ....
        "]);
        let result = remove_small_islands(&skewed, 1.0).unwrap();
        assert_eq!(result.voxel_count(), 4);
    }

    #[test]
    fn island_threshold_filters_by_relative_volume() {
        // Components of 4 and 1 voxels: cutoff at half the maximum keeps
        // only the large one.
        let mask = unit_mask(&["
            ##.#
            ##..
            ....
        "]);
        let result = remove_small_islands(&mask, 0.5).unwrap();
        assert_eq!(result.voxel_count(), 4);
    }

    #[test]
    fn island_removal_rejects_out_of_range_thresholds() {
        let mask = unit_mask(&["#."]);
        for bad in [-0.1, 1.1, f64::NAN] {
            let err = remove_small_islands(&mask, bad).unwrap_err();
            assert!(matches!(
                err,
                AlgebraError::InvalidParameter {
                    name: "threshold",
                    ..
                }
            ));
        }
    }

    #[test]
    fn island_removal_passes_empty_masks_through() {
        let empty = unit_mask(&["
            ....
            ....
        "]);
        let result = remove_small_islands(&empty, 0.7).unwrap();
        assert!(result.is_empty());
    }

    fn rect_contour(geometry: &GridGeometry, lo: f64, hi: f64, slice: usize) -> Contour {
        let z = geometry.slice_z(slice);
        let (sx, sy) = (geometry.spacing.0, geometry.spacing.1);
        let (ox, oy) = (geometry.origin.0, geometry.origin.1);
        Contour::new(
            vec![
                [ox + lo * sx, oy + lo * sy, z],
                [ox + hi * sx, oy + lo * sy, z],
                [ox + hi * sx, oy + hi * sy, z],
                [ox + lo * sx, oy + hi * sy, z],
            ],
            ContourGeometry::ClosedPlanar,
            false,
        )
    }

    #[test]
    fn split_and_recombined_roi_round_trips() {
        // Two disconnected squares assembled from contours, split by
        // component size, recombined, and compared against the original.
        let geometry =
            GridGeometry::axis_aligned((1.0, 1.0, 2.0), (-5.0, -5.0, 0.0), (12, 12, 3));
        let mut contours = Vec::new();
        for slice in 0..2 {
            contours.push(rect_contour(&geometry, 1.0, 4.0, slice));
            contours.push(rect_contour(&geometry, 8.0, 9.0, slice));
        }
        let roi = Roi::new("GTV", 1, contours);
        let original = MaskBuilder::assemble(&roi, &geometry, MaskOptions::default()).unwrap();

        let largest = remove_small_islands(&original, 1.0).unwrap();
        let remainder = subtract(&original, &largest).unwrap();
        assert!(!largest.is_empty());
        assert!(!remainder.is_empty());

        let recombined = combine(&[&largest, &remainder]).unwrap();
        assert!(subtract(&original, &recombined).unwrap().is_empty());
        assert!(subtract(&recombined, &original).unwrap().is_empty());
        assert_eq!(recombined.data(), original.data());
    }
}
