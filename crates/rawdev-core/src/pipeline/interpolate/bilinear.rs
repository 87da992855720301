//! Bilinear demosaicing
//!
//! Each missing channel is the weighted average of the neighbors that
//! carry it: axis-aligned neighbors count double, diagonal neighbors
//! single. Weights and divisors depend only on the position's parity, so
//! they are precomputed into a 16×16 instruction table and looked up by
//! `(row & 15, col & 15)`.

use rayon::prelude::*;

use super::{expand_to_rgb, fill_border};
use crate::image::{filter_color, GrayImage, RgbImage};

#[derive(Debug, Clone, Copy, Default)]
struct PixelInstructions {
    adjacent_weights: [u32; 8],
    adjacent_colors: [usize; 8],
    other_colors: [usize; 2],
    divisions: [u32; 2],
}

struct WeightTable {
    pixels: [[PixelInstructions; 16]; 16],
}

impl WeightTable {
    fn new(filters: u32) -> Self {
        let mut pixels = [[PixelInstructions::default(); 16]; 16];
        for (row, table_row) in pixels.iter_mut().enumerate() {
            for (col, instructions) in table_row.iter_mut().enumerate() {
                let mut sums = [0u32; 4];

                let mut adjacent = 0;
                for y in -1i32..=1 {
                    for x in -1i32..=1 {
                        let weight = (x == 0) as u32 + (y == 0) as u32;
                        if weight == 2 {
                            continue;
                        }
                        let color = filter_color(filters, row as i32 + y, col as i32 + x);
                        instructions.adjacent_weights[adjacent] = weight;
                        instructions.adjacent_colors[adjacent] = color;
                        sums[color] += 1 << weight;
                        adjacent += 1;
                    }
                }

                let own = filter_color(filters, row as i32, col as i32);
                let mut index = 0;
                for color in 0..3 {
                    if color == own {
                        continue;
                    }
                    instructions.other_colors[index] = color;
                    instructions.divisions[index] = 256 / sums[color];
                    index += 1;
                }
            }
        }
        WeightTable { pixels }
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> &PixelInstructions {
        &self.pixels[row & 15][col & 15]
    }
}

/// Bilinear demosaicing over the whole interior; the single outermost
/// pixel ring is filled by the plain neighborhood average.
pub fn bilinear_interpolate(gray: &GrayImage) -> RgbImage {
    let width = gray.width();
    let height = gray.height();

    let mut rgb = expand_to_rgb(gray);
    fill_border(gray, &mut rgb, 1);
    if width < 3 || height < 3 {
        return rgb;
    }

    let table = WeightTable::new(gray.filters());
    let pixels = gray.pixels();
    let w = width as isize;
    let adjacent_offsets: [isize; 8] = [-w - 1, -w, -w + 1, -1, 1, w - 1, w, w + 1];

    rgb.pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            if row == 0 || row == height - 1 {
                return;
            }
            for col in 1..width - 1 {
                let instructions = table.at(row, col);
                let center = (row * width + col) as isize;

                let mut sums = [0u32; 4];
                for (&offset, (&weight, &color)) in adjacent_offsets.iter().zip(
                    instructions
                        .adjacent_weights
                        .iter()
                        .zip(instructions.adjacent_colors.iter()),
                ) {
                    let value = pixels[(center + offset) as usize].0[0] as u32;
                    sums[color] += value << weight;
                }

                for index in 0..2 {
                    let color = instructions.other_colors[index];
                    out_row[col].0[color] =
                        ((sums[color] * instructions.divisions[index]) >> 8) as u16;
                }
            }
        });

    rgb
}
