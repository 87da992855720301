//! Image exporters
//!
//! PPM is the one output format: `P6`, then 8-bit samples or big-endian
//! 16-bit samples. The writer emits exactly the pixels it is given; tone
//! and color corrections happen in the pipeline beforehand.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::image::RgbImage;

/// Writes `image` as a binary PPM with `color_depth` of 8 or 16 bits per
/// sample. 16-bit samples are big-endian; 8-bit output keeps the high
/// byte of each sample.
pub fn write_ppm<W: Write>(image: &RgbImage, out: &mut W, color_depth: u32) -> Result<()> {
    write!(
        out,
        "P6\n{} {}\n{}\n",
        image.width(),
        image.height(),
        (1u32 << color_depth) - 1
    )?;

    let mut row_bytes = Vec::with_capacity(image.width() * 6);
    for row in 0..image.height() {
        row_bytes.clear();
        if color_depth == 8 {
            for pixel in image.row(row) {
                for c in 0..3 {
                    row_bytes.push((pixel.0[c] >> 8) as u8);
                }
            }
        } else {
            for pixel in image.row(row) {
                for c in 0..3 {
                    row_bytes.extend_from_slice(&pixel.0[c].to_be_bytes());
                }
            }
        }
        out.write_all(&row_bytes)?;
    }

    Ok(())
}

/// Writes `image` as a PPM file.
///
/// The file is only created here, with the image fully constructed, so a
/// failed pipeline never leaves a partial output behind.
pub fn write_ppm_file<P: AsRef<Path>>(
    image: &RgbImage,
    path: P,
    color_depth: u32,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_ppm(image, &mut writer, color_depth)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::ppm;
    use crate::image::RgbImage;

    /// A 225×75 image shaped like the reference sample renderings.
    fn sample_image() -> RgbImage {
        let camera = crate::image::tests::null_camera();
        let mut image = RgbImage::new(camera, 225, 75);
        for (i, pixel) in image.pixels_mut().iter_mut().enumerate() {
            let v = (i * 37) as u16;
            pixel.0 = [v, v.wrapping_add(0x1234), v.wrapping_mul(3)];
        }
        image
    }

    #[test]
    fn test_16_bit_output_layout() {
        let image = sample_image();
        let mut bytes = Vec::new();
        write_ppm(&image, &mut bytes, 16).unwrap();

        assert_eq!(&bytes[..16], b"P6\n225 75\n65535\n");
        assert_eq!(bytes.len(), 101266);
        // The first data byte is the MSB of pixel (0, 0) red.
        assert_eq!(bytes[16], (image.at(0, 0).r() >> 8) as u8);
        assert_eq!(bytes[17], (image.at(0, 0).r() & 0xff) as u8);
    }

    #[test]
    fn test_8_bit_output_layout() {
        let image = sample_image();
        let mut bytes = Vec::new();
        write_ppm(&image, &mut bytes, 8).unwrap();

        assert_eq!(&bytes[..14], b"P6\n225 75\n255\n");
        assert_eq!(bytes.len(), 50639);
        // 8-bit output keeps the high byte of each sample.
        assert_eq!(bytes[14], (image.at(0, 0).r() >> 8) as u8);
    }

    #[test]
    fn test_16_bit_round_trip_is_identity() {
        let image = sample_image();
        let mut bytes = Vec::new();
        write_ppm(&image, &mut bytes, 16).unwrap();

        let decoded = ppm::read_rgb_image(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.width(), image.width());
        assert_eq!(decoded.height(), image.height());
        assert_eq!(decoded.pixels(), image.pixels());
    }
}
