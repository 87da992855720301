//! PPM (P6) reading
//!
//! The binary PPM form: `P6\n<width> <height>\n<max>\n` followed by
//! width × height × 3 samples. A max value of 65535 means big-endian
//! 16-bit samples; anything lower means 8-bit samples, promoted to 16
//! bits by a left shift.

use std::io::Read;

use crate::camera::CameraData;
use crate::error::{Error, Result};
use crate::exif::MemoryExifData;
use crate::image::RgbImage;

fn bad_header(reason: &str) -> Error {
    Error::UnsupportedFormat(format!("image/x-portable-pixmap: {}", reason))
}

/// Reads one whitespace-delimited ASCII integer.
fn read_int<R: Read>(source: &mut R) -> Result<usize> {
    let mut byte = [0u8; 1];
    // Skip leading whitespace.
    loop {
        source.read_exact(&mut byte)?;
        if !byte[0].is_ascii_whitespace() {
            break;
        }
    }

    let mut value = 0usize;
    let mut any = false;
    loop {
        match byte[0] {
            b'0'..=b'9' => {
                value = value * 10 + (byte[0] - b'0') as usize;
                any = true;
            }
            b if b.is_ascii_whitespace() => break,
            _ => return Err(bad_header("malformed header number")),
        }
        source.read_exact(&mut byte)?;
    }

    if any {
        Ok(value)
    } else {
        Err(bad_header("malformed header number"))
    }
}

/// Reads a binary PPM into a 16-bit RGB image.
///
/// The image gets null-camera data; PPM input carries no metadata.
pub fn read_rgb_image<R: Read>(source: &mut R) -> Result<RgbImage> {
    let mut magic = [0u8; 2];
    source.read_exact(&mut magic)?;
    if &magic != b"P6" {
        return Err(bad_header("not a P6 file"));
    }

    let width = read_int(source)?;
    let height = read_int(source)?;
    let max_value = read_int(source)?;

    let camera = CameraData::from_exif(&MemoryExifData::new())?;
    let mut image = RgbImage::new(camera, width, height);

    if max_value == 65535 {
        let mut row_bytes = vec![0u8; width * 6];
        for row in 0..height {
            source.read_exact(&mut row_bytes)?;
            for (pixel, bytes) in image.row_mut(row).iter_mut().zip(row_bytes.chunks_exact(6)) {
                for c in 0..3 {
                    pixel.0[c] = ((bytes[c * 2] as u16) << 8) | bytes[c * 2 + 1] as u16;
                }
            }
        }
    } else {
        let mut row_bytes = vec![0u8; width * 3];
        for row in 0..height {
            source.read_exact(&mut row_bytes)?;
            for (pixel, bytes) in image.row_mut(row).iter_mut().zip(row_bytes.chunks_exact(3)) {
                for c in 0..3 {
                    pixel.0[c] = (bytes[c] as u16) << 8;
                }
            }
        }
    }

    Ok(image)
}
