//! Tests for camera detection and color conversion data

use super::*;
use crate::exif::MemoryExifData;

fn d5000_exif() -> MemoryExifData {
    let mut exif = MemoryExifData::new();
    exif.set_string("Exif.Image.Model", "NIKON D5000");
    exif.set_int("Exif.Image.Orientation", 1);
    exif
}

#[test]
fn test_detect_by_model_string() {
    let exif = d5000_exif();
    let camera = detect_camera(&exif).unwrap();
    assert_eq!(camera.name(), "NIKON D5000");
    assert_eq!(camera.colors(), 3);
}

#[test]
fn test_unknown_model_falls_back_to_null_camera() {
    let mut exif = MemoryExifData::new();
    exif.set_string("Exif.Image.Model", "ACME Shoebox 9000");
    let camera = detect_camera(&exif).unwrap();
    assert_eq!(camera.name(), "(null)");
    assert_eq!(camera.colors(), 3);
    assert_eq!(camera.orientation(&exif).unwrap(), 1);
}

#[test]
fn test_empty_exif_falls_back_to_null_camera() {
    let exif = MemoryExifData::new();
    assert_eq!(detect_camera(&exif).unwrap().name(), "(null)");
}

#[test]
fn test_camera_data_resolves_exif_values() {
    let mut exif = d5000_exif();
    exif.set_int("Exif.SubImage2.ImageWidth", 4352);
    exif.set_int("Exif.SubImage2.ImageLength", 2868);
    exif.set_bytes("Exif.SubImage2.CFAPattern", vec![1, 2, 0, 1]);

    let data = CameraData::from_exif(&exif).unwrap();
    assert_eq!(data.name(), "NIKON D5000");
    assert_eq!(data.raw_width(), 4352);
    assert_eq!(data.raw_height(), 2868);
    assert_eq!(data.orientation(), 1);
    assert_eq!(data.filters(), 0x49494949);
}

#[test]
fn test_filters_from_cfa_patterns() {
    // (G, B, R, G): the Nikon layout.
    assert_eq!(filters_from_cfa(&[1, 2, 0, 1]), 0x49494949);
    // (R, G, G, B): RGGB.
    assert_eq!(filters_from_cfa(&[0, 1, 1, 2]), 0x94949494);
    assert_eq!(filters_from_cfa(&[1, 2]), 0);
}

#[test]
fn test_d5000_conversion_data() {
    let exif = d5000_exif();
    let data = detect_camera(&exif).unwrap().color_conversion_data();

    assert_eq!(data.black, 0);
    assert_eq!(data.maximum, 0xf00);
    assert!((data.xyz_to_camera[0][0] - 0.7309).abs() < 1e-9);
    assert!((data.xyz_to_camera[2][2] - 0.8064).abs() < 1e-9);

    // Each rgb_to_camera row is normalized to sum 1.
    for row in &data.rgb_to_camera[..3] {
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "row sums to {}", sum);
    }

    // Multipliers are relative to the smallest one, and the scaling
    // multipliers stretch the camera's saturation point to 16 bits.
    let min = data.camera_multipliers[..3]
        .iter()
        .cloned()
        .fold(f64::MAX, f64::min);
    assert!((min - 1.0).abs() < 1e-9);
    for c in 0..3 {
        let expected = data.camera_multipliers[c] * 65535.0 / 0xf00 as f64;
        assert!((data.scaling_multipliers[c] - expected).abs() < 1e-9);
    }
}

#[test]
fn test_pseudo_inverse_round_trip_for_all_cameras() {
    for camera in registry() {
        if camera.name() == "(null)" {
            continue;
        }
        let data = camera.color_conversion_data();
        let colors = camera.colors();

        // camera_to_rgb is the left inverse of rgb_to_camera.
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = 0.0;
                for k in 0..colors {
                    sum += data.camera_to_rgb[i][k] * data.rgb_to_camera[k][j];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (sum - expected).abs() < 1e-6,
                    "{}: [{},{}] = {}",
                    camera.name(),
                    i,
                    j,
                    sum
                );
            }
        }
    }
}

#[test]
fn test_color_converter_four_to_three() {
    let matrix = [
        [1.0, 2.0, 3.0, 4.0],
        [5.0, 6.0, 7.0, 8.0],
        [9.0, 10.0, 11.0, 12.0],
    ];
    let converter = ColorConverter::<4, 3>::new(&matrix);

    let out = converter.convert(&[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(out, [30.0, 70.0, 110.0]);

    // Short inputs are zero-extended.
    let out = converter.convert(&[1.0, 2.0, 3.0]);
    assert_eq!(out, [14.0, 38.0, 62.0]);
}

#[test]
fn test_null_camera_conversion_data_is_identity_free() {
    let exif = MemoryExifData::new();
    let data = detect_camera(&exif).unwrap().color_conversion_data();
    assert_eq!(data.black, 0);
    assert_eq!(data.maximum, 0);
    assert_eq!(data.camera_multipliers, [0.0; 4]);
}
