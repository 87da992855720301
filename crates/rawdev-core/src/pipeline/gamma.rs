//! Histogram and gamma correction
//!
//! The output curve is chosen from the image itself: walk each channel's
//! histogram down from the top until one percent of the pixels lies above,
//! take the brightest such point as white, and build a power curve with a
//! linear toe that saturates there.

use rayon::prelude::*;

use crate::image::RgbImage;

/// Per-channel pixel-value counts.
///
/// `COARSENESS` groups values into slots of `2^COARSENESS`; the table has
/// `(65535 >> COARSENESS) + 1` slots per channel.
#[derive(Debug, Clone)]
pub struct Histogram<const COARSENESS: u32> {
    counts: [Vec<u32>; 3],
    n_pixels: usize,
}

impl<const COARSENESS: u32> Histogram<COARSENESS> {
    pub fn new(image: &RgbImage) -> Self {
        let n_slots = ((u16::MAX as usize) >> COARSENESS) + 1;
        let mut counts = [
            vec![0u32; n_slots],
            vec![0u32; n_slots],
            vec![0u32; n_slots],
        ];

        for pixel in image.pixels() {
            for c in 0..3 {
                counts[c][(pixel.0[c] >> COARSENESS) as usize] += 1;
            }
        }

        Histogram {
            counts,
            n_pixels: image.n_pixels(),
        }
    }

    pub fn n_slots(&self) -> usize {
        self.counts[0].len()
    }

    pub fn n_pixels(&self) -> usize {
        self.n_pixels
    }

    /// How many pixels hold a `color` value in `slot`.
    pub fn count(&self, color: usize, slot: usize) -> u32 {
        self.counts[color][slot]
    }
}

/// A 65536-entry lookup from linear to gamma-corrected values.
#[derive(Debug, Clone)]
pub struct GammaCurve {
    curve: Vec<u16>,
}

impl GammaCurve {
    /// Builds the curve for exponent `power` and linear toe slope
    /// `toe_slope`, saturating at input `max`.
    pub fn new(power: f64, toe_slope: f64, max: i32) -> Self {
        let mut g = [power, toe_slope, 0.0, 0.0, 0.0, 0.0];

        // Solve for the knee by bisection.
        let mut bounds = [0.0f64, 1.0];
        for _ in 0..48 {
            g[2] = (bounds[0] + bounds[1]) / 2.0;
            let t = (g[2] / g[1]).powf(-g[0]) - 1.0;
            bounds[usize::from(t / g[0] - 1.0 / g[2] > -1.0)] = g[2];
        }
        g[3] = g[2] / g[1];
        g[4] = g[2] * (1.0 / g[0] - 1.0);
        g[5] = 1.0
            / (g[1] * g[3] * g[3] / 2.0 + 1.0 - g[2] - g[3] - g[2] * g[3] * (g[3].ln() - 1.0))
            - 1.0;

        let mut curve = vec![0u16; 0x10000];
        for (i, entry) in curve.iter_mut().enumerate() {
            let r = i as f64 / max as f64;
            *entry = if r < 1.0 {
                let v = if r < g[3] {
                    r * g[1]
                } else {
                    r.powf(g[0]) * (1.0 + g[4]) - g[4]
                };
                (65536.0 * v) as u16
            } else {
                0xffff
            };
        }

        GammaCurve { curve }
    }

    /// Picks the white point from a histogram so one percent of the image
    /// clips, then builds the curve.
    pub fn from_histogram<const COARSENESS: u32>(
        histogram: &Histogram<COARSENESS>,
        power: f64,
        toe_slope: f64,
    ) -> Self {
        let target = (histogram.n_pixels() as f64 * 0.01) as u32;

        let mut white = 0usize;
        for color in 0..3 {
            let mut total = 0u32;
            let mut slot = (histogram.n_slots() - 1).min(0x1fff);
            while slot > 32 {
                total += histogram.count(color, slot);
                if total > target {
                    break;
                }
                slot -= 1;
            }
            white = white.max(slot);
        }

        Self::new(power, toe_slope, (white << COARSENESS) as i32)
    }

    #[inline]
    pub fn at(&self, value: u16) -> u16 {
        self.curve[value as usize]
    }
}

/// Remaps every channel of every pixel through the curve.
pub fn apply_gamma(image: &mut RgbImage, curve: &GammaCurve) {
    image.pixels_mut().par_iter_mut().for_each(|pixel| {
        for c in 0..3 {
            pixel.0[c] = curve.at(pixel.0[c]);
        }
    });
}
