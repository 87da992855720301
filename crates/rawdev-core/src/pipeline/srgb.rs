//! Camera-space to sRGB conversion
//!
//! Multiplies every pixel by the camera's 3×4 conversion matrix (the
//! fourth sensor color contributes zero on three-color cameras) and
//! clamps the result back to 16 bits.

use rayon::prelude::*;

use crate::camera::ColorConverter;
use crate::image::RgbImage;
use crate::pipeline::clamp16;

pub fn convert_to_rgb(image: &mut RgbImage) {
    let data = image.camera().color_conversion_data();
    let converter = ColorConverter::<4, 3>::new(&data.camera_to_rgb);

    image.pixels_mut().par_iter_mut().for_each(|pixel| {
        let input = [
            pixel.0[0] as f32,
            pixel.0[1] as f32,
            pixel.0[2] as f32,
        ];
        let rgb = converter.convert(&input);
        for c in 0..3 {
            pixel.0[c] = clamp16(rgb[c] as i32);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraData;
    use crate::exif::MemoryExifData;
    use crate::image::{Pixel, RgbImage};

    fn d5000_rgb(width: usize, height: usize) -> RgbImage {
        let mut exif = MemoryExifData::new();
        exif.set_string("Exif.Image.Model", "NIKON D5000");
        exif.set_int("Exif.Image.Orientation", 1);
        RgbImage::new(CameraData::from_exif(&exif).unwrap(), width, height)
    }

    #[test]
    fn test_matrix_multiply_with_clamp() {
        let inputs: [[u16; 3]; 2] = [[1000, 2000, 3000], [65535, 0, 65535]];

        let mut image = d5000_rgb(2, 1);
        for (col, input) in inputs.iter().enumerate() {
            *image.at_mut(0, col) = Pixel(*input);
        }

        let matrix = image.camera().color_conversion_data().camera_to_rgb;
        convert_to_rgb(&mut image);

        for (col, input) in inputs.iter().enumerate() {
            for c in 0..3 {
                let expected: f32 = (0..3)
                    .map(|k| matrix[c][k] as f32 * input[k] as f32)
                    .sum();
                let expected = (expected as i32).clamp(0, 0xffff) as u16;
                assert_eq!(image.at(0, col).0[c], expected, "({}, {})", col, c);
            }
        }
    }

    #[test]
    fn test_gray_input_stays_gray() {
        // The normalized matrix maps equal channels to equal channels.
        let mut image = d5000_rgb(1, 1);
        *image.at_mut(0, 0) = Pixel([10000, 10000, 10000]);

        convert_to_rgb(&mut image);

        let p = image.at(0, 0);
        let spread = p.0.iter().max().unwrap() - p.0.iter().min().unwrap();
        assert!(spread <= 2, "gray drifted: {:?}", p.0);
    }
}
