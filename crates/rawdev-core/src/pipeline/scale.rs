//! White-balance scaling
//!
//! Multiplies every sensor sample by its Bayer color's scaling multiplier
//! and clamps to 16 bits. Each row alternates between two colors, so the
//! two multipliers are resolved once per row.

use rayon::prelude::*;

use crate::image::GrayImage;

pub fn scale_colors(image: &mut GrayImage) {
    let data = image.camera().color_conversion_data();
    let filters = image.filters();
    let width = image.width();

    image
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, pixels)| {
            let c1 = crate::image::filter_color(filters, row as i32, 0);
            let c2 = crate::image::filter_color(filters, row as i32, 1);
            let m1 = data.scaling_multipliers[c1];
            let m2 = data.scaling_multipliers[c2];

            let mut pairs = pixels.chunks_exact_mut(2);
            for pair in &mut pairs {
                pair[0].0[0] = clamp16(m1 * pair[0].0[0] as f64);
                pair[1].0[0] = clamp16(m2 * pair[1].0[0] as f64);
            }
            if let [last] = pairs.into_remainder() {
                last.0[0] = clamp16(m1 * last.0[0] as f64);
            }
        });
}

fn clamp16(value: f64) -> u16 {
    (value as i64).clamp(0, 0xffff) as u16
}
