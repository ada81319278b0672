use std::env;
use std::path::PathBuf;

use rtstruct_mask::{
    geometry_loader::GeometryLoader,
    mask::{MaskBuilder, MaskOptions},
    structure_set_loader::StructureSetLoader,
};

fn main() {
    let mut args = env::args().skip(1);
    let rtstruct = PathBuf::from(
        args.next()
            .expect("usage: rtstruct-mask <rtstruct> <image-dir> <roi-name> [out.png]"),
    );
    let image_dir = PathBuf::from(args.next().expect("missing image directory argument"));
    let roi_name = args.next().expect("missing ROI name argument");
    let output = args.next().unwrap_or_else(|| "mask.png".to_string());

    let set = StructureSetLoader::load_from_path(&rtstruct)
        .expect("should have loaded the structure set");
    let geometry = GeometryLoader::load_from_directory(&image_dir)
        .expect("should have loaded the reference image geometry");
    let options = MaskOptions {
        fill_holes: true,
        ..MaskOptions::default()
    };
    let mask = MaskBuilder::build(&set, &roi_name, &geometry, options)
        .expect("should have assembled the ROI mask");

    println!(
        "ROI '{roi_name}': {} voxels, {:.1} mm^3",
        mask.voxel_count(),
        mask.physical_volume()
    );

    let busiest = (0..mask.dim().0)
        .max_by_key(|&z| {
            mask.slice(z)
                .map_or(0, |slice| slice.iter().filter(|&&v| v != 0).count())
        })
        .unwrap_or(0);
    let image = mask
        .slice_image(busiest)
        .expect("should have rendered the busiest slice");
    image
        .save(&output)
        .expect("should have saved the preview image");
}
