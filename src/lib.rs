//! # RTSTRUCT mask library
//!
//! This crate rasterizes the per-slice contour polygons of a DICOM RTSTRUCT
//! structure set into 3D binary voxel masks aligned to a reference image
//! grid, and provides set algebra over the resulting masks.
//!
//! This library is part of the dicom-rs ecosystem and leverages its
//! components to read structure sets and image-series geometry. A
//! [`structure_set::StructureSet`] owns the ROIs of one structure set and
//! serves as a name registry (lookup, rename, prune); a
//! [`geometry::GridGeometry`] describes the voxel grid of the reference
//! image series. [`mask::MaskBuilder`] turns one ROI's contours into a
//! [`mask::MaskVolume`], composing each touched slice with even-odd
//! scanline fill and positive/hole semantics (slices are composed in
//! parallel using rayon). The [`algebra`] module combines, subtracts, and
//! island-filters mask volumes; all operands of one operation must share
//! the same grid geometry, and inputs are never mutated.
//!
//! Input assumptions:
//!  - Contours are planar and lie on axial slices of the reference grid
//!  - Contours marked "SUB" by the planning system carve holes out of the
//!    positive area on the same slice
//!  - Images of the reference series share Rows, Columns and PixelSpacing
//!
//! Diagnostics go through the `log` facade and are silent unless the
//! consumer installs a logger.
//!
//!  Contributions are highly welcome!
//!
//! # Examples
//!
//! ## Rasterizing one ROI of a structure set
//!
//! Read an RTSTRUCT file and the image series it references, assemble the
//! binary mask of the "GTV" structure with hole filling, and save the
//! middle slice as an image.
//!
//! ```no_run
//! # use rtstruct_mask::geometry_loader::GeometryLoader;
//! # use rtstruct_mask::mask::{MaskBuilder, MaskOptions};
//! # use rtstruct_mask::structure_set_loader::StructureSetLoader;
//! # use std::path::PathBuf;
//! let set = StructureSetLoader::load_from_file(&PathBuf::from("rtstruct.dcm"))
//!     .expect("should have loaded the structure set");
//! let geometry = GeometryLoader::load_from_directory(&PathBuf::from("dicom"))
//!     .expect("should have loaded the reference geometry");
//! let options = MaskOptions {
//!     fill_holes: true,
//!     ..MaskOptions::default()
//! };
//! let mask = MaskBuilder::build(&set, "GTV", &geometry, options)
//!     .expect("should have assembled the mask");
//! let image = mask
//!     .slice_image(mask.dim().0 / 2)
//!     .expect("should have rendered the middle slice");
//! image.save("result.png");
//! ```

pub mod algebra;
pub mod enums;
pub mod geometry;
pub mod geometry_loader;
pub mod mask;
pub mod rasterize;
pub mod structure_set;
pub mod structure_set_loader;

#[cfg(test)]
mod test_grids;
