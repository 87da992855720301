//! The raw development pipeline
//!
//! Stage order, leaves first: NEF decode → white-balance scaling →
//! demosaic → camera-to-sRGB conversion → histogram-driven gamma.
//! `develop` runs the whole chain; the stages are public for callers that
//! want to stop partway.

mod gamma;
mod interpolate;
mod scale;
mod srgb;

#[cfg(test)]
mod tests;

pub use gamma::{apply_gamma, GammaCurve, Histogram};
pub use interpolate::{ahd_interpolate, bilinear_interpolate, interpolate};
pub use scale::scale_colors;
pub use srgb::convert_to_rgb;

use std::io::{Read, Seek};

use crate::decoders::nef;
use crate::error::Result;
use crate::exif::ExifData;
use crate::image::RgbImage;
use crate::models::DevelopOptions;

/// Clamps a wide intermediate back into 16 bits.
#[inline]
pub(crate) fn clamp16(value: i32) -> u16 {
    value.clamp(0, 0xffff) as u16
}

/// Renders a raw stream to a gamma-corrected sRGB image.
pub fn develop<R: Read + Seek>(
    source: &mut R,
    exif: &dyn ExifData,
    options: &DevelopOptions,
) -> Result<RgbImage> {
    let mut gray = nef::read_gray_image(source, exif, options.honor_linearization_split)?;
    scale_colors(&mut gray);

    let mut rgb = interpolate(&gray, options.interpolation);
    convert_to_rgb(&mut rgb);

    let histogram = Histogram::<3>::new(&rgb);
    let curve = GammaCurve::from_histogram(&histogram, options.gamma_power, options.gamma_toe_slope);
    apply_gamma(&mut rgb, &curve);

    Ok(rgb)
}
