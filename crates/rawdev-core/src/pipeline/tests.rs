//! Tests for the pipeline stages and their composition

use std::io::Cursor;

use super::*;
use crate::exif::MemoryExifData;
use crate::image::{Pixel, RgbImage};
use crate::models::Interpolation;

static RANDOM_4X3_SAMPLE: [[u16; 3]; 12] = [
    [0x1165, 0xb0d1, 0x018c],
    [0x20e5, 0xa15f, 0x00e9],
    [0x315c, 0x90d9, 0x1111],
    [0x40db, 0x8186, 0x113e],
    [0x51b0, 0x70f3, 0x219b],
    [0x60f3, 0x61b0, 0x218f],
    [0x728c, 0x51f2, 0x3288],
    [0x81a7, 0x42d4, 0x31a7],
    [0x92fc, 0x3240, 0x4367],
    [0xa1ea, 0x2330, 0x4135],
    [0xb1e3, 0x1126, 0x5238],
    [0xc104, 0x027c, 0x513b],
];

fn random_rgb_image() -> RgbImage {
    let camera = crate::image::tests::null_camera();
    let mut image = RgbImage::new(camera, 4, 3);
    for (pixel, sample) in image.pixels_mut().iter_mut().zip(RANDOM_4X3_SAMPLE.iter()) {
        *pixel = Pixel(*sample);
    }
    image
}

#[test]
fn test_histogram_counts_every_pixel_once() {
    let image = random_rgb_image();
    let histogram = Histogram::<3>::new(&image);

    assert_eq!(histogram.n_pixels(), 12);
    assert_eq!(histogram.n_slots(), 8192);
    for color in 0..3 {
        let total: u32 = (0..histogram.n_slots())
            .map(|slot| histogram.count(color, slot))
            .sum();
        assert_eq!(total, 12, "color {}", color);
    }
}

#[test]
fn test_histogram_coarseness_15() {
    let image = random_rgb_image();
    let histogram = Histogram::<15>::new(&image);

    assert_eq!(histogram.n_slots(), 2);
    assert_eq!(histogram.count(0, 0), 7);
    assert_eq!(histogram.count(1, 0), 8);
    assert_eq!(histogram.count(2, 0), 12);
    assert_eq!(histogram.count(0, 1), 5);
    assert_eq!(histogram.count(1, 1), 4);
    assert_eq!(histogram.count(2, 1), 0);
}

#[test]
fn test_gamma_curve_shape() {
    let curve = GammaCurve::new(0.45, 4.5, 0x2000);

    assert_eq!(curve.at(0), 0);
    assert_eq!(curve.at(0xffff), 0xffff);
    // Saturated from the white point up.
    assert_eq!(curve.at(0x2000), 0xffff);

    let mut previous = 0u16;
    for i in 0..=0xffffu16 {
        let v = curve.at(i);
        assert!(v >= previous, "curve dips at {}", i);
        previous = v;
    }
}

#[test]
fn test_gamma_from_histogram_white_detection() {
    // All pixels at one value: that value becomes the white point, so
    // everything at or above it maps to full white.
    let camera = crate::image::tests::null_camera();
    let mut image = RgbImage::new(camera, 100, 100);
    for pixel in image.pixels_mut() {
        *pixel = Pixel([0x4000, 0x4000, 0x4000]);
    }

    let histogram = Histogram::<3>::new(&image);
    let curve = GammaCurve::from_histogram(&histogram, 0.45, 4.5);

    assert_eq!(curve.at(0x4000), 0xffff);
    assert!(curve.at(0x1000) < 0xffff);
    assert_eq!(curve.at(0), 0);
}

#[test]
fn test_apply_gamma_remaps_all_channels() {
    let mut image = random_rgb_image();
    let curve = GammaCurve::new(0.45, 4.5, 0x8000);
    let expected: Vec<[u16; 3]> = image
        .pixels()
        .iter()
        .map(|p| [curve.at(p.0[0]), curve.at(p.0[1]), curve.at(p.0[2])])
        .collect();

    apply_gamma(&mut image, &curve);

    for (pixel, expected) in image.pixels().iter().zip(expected.iter()) {
        assert_eq!(pixel.0, *expected);
    }
}

/// A complete synthetic NEF: identity linearization curve, constant
/// predictors, all-zero differences.
fn synthetic_nef() -> (MemoryExifData, Vec<u8>) {
    let mut table = vec![0x46u8, 0x30];
    for v in [1000u16, 1000, 1000, 1000] {
        table.extend_from_slice(&v.to_be_bytes());
    }
    table.extend_from_slice(&2u16.to_be_bytes());
    table.extend_from_slice(&0u16.to_be_bytes());
    table.extend_from_slice(&4096u16.to_be_bytes());

    let mut exif = MemoryExifData::new();
    exif.set_string("Exif.Image.Model", "NIKON D5000");
    exif.set_int("Exif.Image.Orientation", 1);
    exif.set_int("Exif.SubImage2.BitsPerSample", 12);
    exif.set_int("Exif.SubImage2.StripOffsets", 0);
    exif.set_int("Exif.SubImage2.ImageWidth", 32);
    exif.set_int("Exif.SubImage2.ImageLength", 24);
    exif.set_bytes("Exif.SubImage2.CFAPattern", vec![1, 2, 0, 1]);
    exif.set_bytes("Exif.Nikon3.LinearizationTable", table);

    // 32 * 24 pixels of the five-bit zero-difference code, bit-packed.
    let n_bits: usize = 32 * 24 * 5;
    let mut stream = Vec::new();
    let mut acc = 0u16;
    let mut acc_bits = 0;
    for _ in 0..32 * 24 {
        acc = (acc << 5) | 0b11110;
        acc_bits += 5;
        while acc_bits >= 8 {
            stream.push((acc >> (acc_bits - 8)) as u8);
            acc_bits -= 8;
            acc &= (1 << acc_bits) - 1;
        }
    }
    if acc_bits > 0 {
        stream.push((acc << (8 - acc_bits)) as u8);
    }
    assert_eq!(stream.len(), n_bits.div_ceil(8));

    (exif, stream)
}

#[test]
fn test_develop_runs_the_whole_chain() {
    let (exif, stream) = synthetic_nef();
    let mut source = Cursor::new(stream);

    let image = develop(&mut source, &exif, &DevelopOptions::default()).unwrap();
    assert_eq!(image.width(), 32);
    assert_eq!(image.height(), 24);

    // A flat sensor field stays flat through scaling, demosaicing and
    // gamma: per channel, every pixel ends at the same value, and the
    // white-balance multipliers keep channels within range.
    let first = image.at(0, 0).0;
    for pixel in image.pixels() {
        assert_eq!(pixel.0, first);
    }
}

#[test]
fn test_develop_with_bilinear_options() {
    let (exif, stream) = synthetic_nef();
    let mut source = Cursor::new(stream);

    let options = DevelopOptions {
        interpolation: Interpolation::Bilinear,
        ..Default::default()
    };
    let image = develop(&mut source, &exif, &options).unwrap();

    let first = image.at(0, 0).0;
    for pixel in image.pixels() {
        assert_eq!(pixel.0, first);
    }
}
