//! Demosaicing
//!
//! Reconstructs full RGB from a Bayer sensor image. The default is
//! adaptive homogeneity-directed (AHD) interpolation: the image is
//! reconstructed twice, once biased horizontally and once vertically, both
//! candidates are projected into CIELAB, and each pixel takes the
//! direction whose neighborhood is locally smoother in both luminance and
//! chroma. A plain bilinear interpolator is available as the fast path.
//!
//! The interior is processed in 256×256 tiles that overlap by a read-only
//! margin of three pixels; every tile writes a disjoint region of the
//! output, so rows of tiles run in parallel. The five outermost pixel
//! rings are filled by a simple neighborhood average instead.

mod bilinear;


pub use bilinear::bilinear_interpolate;

use std::sync::OnceLock;

use rayon::prelude::*;

use crate::image::{
    filter_color, GrayImage, HomogeneityTile, LabTile, Pixel, Point, RgbImage, RgbPixel, RgbTile,
};
use crate::models::Interpolation;
use crate::pipeline::clamp16;

pub(crate) const BORDER: usize = 5;
pub(crate) const MARGIN: usize = 3;
const TILE: usize = 256;

const G: usize = 1;

/// Demosaics `gray` with the requested method.
pub fn interpolate(gray: &GrayImage, method: Interpolation) -> RgbImage {
    match method {
        Interpolation::Ahd => ahd_interpolate(gray),
        Interpolation::Bilinear => bilinear_interpolate(gray),
    }
}

/// Spreads each sensor sample into its Bayer channel of an RGB raster.
fn expand_to_rgb(gray: &GrayImage) -> RgbImage {
    let mut rgb = RgbImage::new(gray.camera().clone(), gray.width(), gray.height());
    rgb.set_filters(gray.filters());

    let filters = gray.filters();
    let width = gray.width();
    for (i, (src, dst)) in gray
        .pixels()
        .iter()
        .zip(rgb.pixels_mut().iter_mut())
        .enumerate()
    {
        let row = (i / width) as i32;
        let col = (i % width) as i32;
        dst.0[filter_color(filters, row, col)] = src.0[0];
    }
    rgb
}

/// Fills the missing channels of the outer `border` pixel rings with the
/// average of the 3×3 neighbors carrying each color.
pub(crate) fn fill_border(gray: &GrayImage, rgb: &mut RgbImage, border: usize) {
    let width = gray.width();
    let height = gray.height();
    let filters = gray.filters();

    for row in 0..height {
        let mut col = 0;
        while col < width {
            // Jump across the interior once past the left band.
            if col == border
                && row >= border
                && row + border < height
                && width >= 2 * border
            {
                col = width - border;
            }

            let mut sum = [0u32; 4];
            let mut count = [0u32; 4];
            for y in row as i32 - 1..=row as i32 + 1 {
                if y < 0 || y >= height as i32 {
                    continue;
                }
                for x in col as i32 - 1..=col as i32 + 1 {
                    if x < 0 || x >= width as i32 {
                        continue;
                    }
                    let c = filter_color(filters, y, x);
                    sum[c] += gray.at(y as usize, x as usize).0[0] as u32;
                    count[c] += 1;
                }
            }

            let current = filter_color(filters, row as i32, col as i32);
            let pixel = rgb.at_mut(row, col);
            for c in 0..3 {
                if c != current && count[c] > 0 {
                    pixel.0[c] = (sum[c] / count[c]) as u16;
                }
            }

            col += 1;
        }
    }
}

/// Returns `v` bounded by `b1` and `b2`, whichever order they are in.
#[inline]
fn bound(v: u16, b1: u16, b2: u16) -> u16 {
    b1.max(v.min(b2)).min(b2.max(v.min(b1)))
}

/// The 131072-entry cube-root lookup behind the CIELAB projection.
///
/// Entries 0..0x10000 hold `64 * f(i / 65535)` with the usual CIELAB
/// `f(t) = t^(1/3)` above 0.008856 and the linear toe below. The upper
/// half handles out-of-range float inputs after the integer cast:
/// just-over-max positives land in `[0x10000, 0x17fff]` and clamp to
/// `f(1)`, small negatives wrap to `[0x18000, 0x1ffff]` and clamp to
/// `f(0)`.
fn xyz_cbrt_lookup() -> &'static [f32] {
    static LOOKUP: OnceLock<Vec<f32>> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut lookup = vec![0f32; 0x20000];
        for (i, entry) in lookup.iter_mut().enumerate().take(0x10000) {
            let r = i as f64 / 65535.0;
            let f = if r > 0.008856 {
                r.powf(1.0 / 3.0)
            } else {
                7.787 * r + 16.0 / 116.0
            };
            *entry = (64.0 * f) as f32;
        }
        let max = lookup[0xffff];
        let min = lookup[0];
        for entry in &mut lookup[0x10000..=0x17fff] {
            *entry = max;
        }
        for entry in &mut lookup[0x18000..] {
            *entry = min;
        }
        lookup
    })
}

#[inline]
fn xyz64_cbrt(lookup: &[f32], value: f32) -> f32 {
    lookup[((value as i32) as u32 & 0x1ffff) as usize]
}

/// The five scratch buffers one worker reuses across its tiles.
struct TileScratch {
    h_rgb: RgbTile,
    v_rgb: RgbTile,
    h_lab: LabTile,
    v_lab: LabTile,
    homogeneity: HomogeneityTile,
}

impl TileScratch {
    fn new(image_size: Point) -> Self {
        let origin = Point::new(0, 0);
        let size = Point::new(TILE as i32, TILE as i32);
        let border = BORDER as u32;
        let margin = MARGIN as u32;
        TileScratch {
            h_rgb: RgbTile::new(image_size, origin, size, border, margin),
            v_rgb: RgbTile::new(image_size, origin, size, border, margin),
            h_lab: LabTile::new(image_size, origin, size, border, margin),
            v_lab: LabTile::new(image_size, origin, size, border, margin),
            homogeneity: HomogeneityTile::new(image_size, origin, size, border, margin),
        }
    }

    fn set_top_left(&mut self, top_left: Point) {
        self.h_rgb.set_top_left(top_left);
        self.v_rgb.set_top_left(top_left);
        self.h_lab.set_top_left(top_left);
        self.v_lab.set_top_left(top_left);
        self.homogeneity.set_top_left(top_left);
    }
}

/// Adaptive homogeneity-directed demosaicing.
pub fn ahd_interpolate(gray: &GrayImage) -> RgbImage {
    let width = gray.width();
    let height = gray.height();

    let mut rgb = expand_to_rgb(gray);
    fill_border(gray, &mut rgb, BORDER);
    if width <= 2 * BORDER || height <= 2 * BORDER {
        return rgb;
    }

    let data = gray.camera().color_conversion_data();
    let colors = gray.camera().colors();
    let mut camera_to_xyz = [[0f32; 4]; 3];
    for i in 0..3 {
        for j in 0..colors {
            camera_to_xyz[i][j] = data.camera_to_xyz[i][j] as f32;
        }
    }

    // Warm the lookup before the workers race to it.
    let _ = xyz_cbrt_lookup();

    let stride = TILE - 2 * MARGIN;
    let origin = BORDER - MARGIN;
    let row_origins: Vec<usize> = (origin..height - BORDER).step_by(stride).collect();
    let col_origins: Vec<usize> = (origin..width - BORDER).step_by(stride).collect();

    // Each row of tiles writes a disjoint band of output rows
    // [origin + MARGIN, bottom - MARGIN); hand every band its own
    // mutable slice and run the bands in parallel.
    struct Band<'a> {
        origin_row: usize,
        write_top: usize,
        out: &'a mut [RgbPixel],
    }

    let mut bands: Vec<Band> = Vec::new();
    let mut remaining = rgb.pixels_mut();
    let mut consumed_rows = 0usize;
    for &origin_row in &row_origins {
        let write_top = origin_row + MARGIN;
        let write_bottom = (height - (BORDER - MARGIN)).min(origin_row + TILE) - MARGIN;
        if write_bottom <= write_top {
            continue;
        }
        let taken = std::mem::take(&mut remaining);
        let (_, rest) = taken.split_at_mut((write_top - consumed_rows) * width);
        let (band_pixels, rest) = rest.split_at_mut((write_bottom - write_top) * width);
        remaining = rest;
        consumed_rows = write_bottom;
        bands.push(Band {
            origin_row,
            write_top,
            out: band_pixels,
        });
    }

    let image_size = Point::new(height as i32, width as i32);
    bands.into_par_iter().for_each(|band| {
        let mut scratch = TileScratch::new(image_size);
        for &origin_col in &col_origins {
            scratch.set_top_left(Point::new(band.origin_row as i32, origin_col as i32));
            process_tile(gray, &camera_to_xyz, &mut scratch, band.out, band.write_top);
        }
    });

    rgb
}

fn process_tile(
    gray: &GrayImage,
    camera_to_xyz: &[[f32; 4]; 3],
    scratch: &mut TileScratch,
    out: &mut [RgbPixel],
    out_top_row: usize,
) {
    green_directional(gray, &mut scratch.h_rgb, &mut scratch.v_rgb);

    fill_directional(gray, &mut scratch.h_rgb);
    fill_directional(gray, &mut scratch.v_rgb);

    project_cielab(&scratch.h_rgb, &mut scratch.h_lab, camera_to_xyz);
    project_cielab(&scratch.v_rgb, &mut scratch.v_lab, camera_to_xyz);

    fill_homogeneity(&scratch.h_lab, &scratch.v_lab, &mut scratch.homogeneity);

    fuse(
        &scratch.h_rgb,
        &scratch.v_rgb,
        &mut scratch.homogeneity,
        out,
        out_top_row,
        gray.width(),
    );
}

/// Green estimates at every non-green photosite, biased along each axis.
///
/// The raw estimate is the axis average of the two green neighbors plus a
/// Laplacian correction from the same-color samples two steps out, then
/// bounded by the two green neighbors.
fn green_directional(gray: &GrayImage, h_tile: &mut RgbTile, v_tile: &mut RgbTile) {
    let (top, bottom, left, right) =
        (h_tile.top(), h_tile.bottom(), h_tile.left(), h_tile.right());
    let filters = gray.filters();
    let width = gray.width();
    let pixels = gray.pixels();

    for row in top..bottom {
        // Start at the row's first non-green photosite.
        let start = left + (filter_color(filters, row as i32, left as i32) & 1);
        let mut col = start;
        while col < right {
            let idx = row * width + col;
            let center = pixels[idx].0[0] as i32;

            let g_left = pixels[idx - 1].0[0];
            let g_right = pixels[idx + 1].0[0];
            let h_value = ((g_left as i32 + center + g_right as i32) * 2
                - pixels[idx - 2].0[0] as i32
                - pixels[idx + 2].0[0] as i32)
                >> 2;
            h_tile.at_mut(row, col).0[G] = bound(h_value as u16, g_left, g_right);

            let g_up = pixels[idx - width].0[0];
            let g_down = pixels[idx + width].0[0];
            let v_value = ((g_up as i32 + center + g_down as i32) * 2
                - pixels[idx - 2 * width].0[0] as i32
                - pixels[idx + 2 * width].0[0] as i32)
                >> 2;
            v_tile.at_mut(row, col).0[G] = bound(v_value as u16, g_up, g_down);

            col += 2;
        }
    }
}

/// Completes one directional candidate: copies the sensor samples through
/// and derives the two missing channels at every photosite from green
/// differences.
fn fill_directional(gray: &GrayImage, tile: &mut RgbTile) {
    let top = tile.top() + 1;
    let bottom = tile.bottom() - 1;
    let left = tile.left() + 1;
    let right = tile.right() - 1;
    let filters = gray.filters();
    let width = gray.width();
    let pixels = gray.pixels();

    for row in top..bottom {
        // A Bayer row interleaves green with one other color; its column
        // carries the third.
        let c = filter_color(filters, row as i32, left as i32);
        let (row_color, col_color) = if c == G {
            let rc = filter_color(filters, row as i32, left as i32 + 1);
            (rc, 2 - rc)
        } else {
            (c, 2 - c)
        };

        // Green photosites: both missing colors from axis-aligned
        // neighbors, corrected by the interpolated greens there.
        let mut col = left + usize::from(c != G);
        while col < right {
            let idx = row * width + col;
            let green = pixels[idx].0[0] as i32;

            let col_value = green
                + ((pixels[idx - width].0[0] as i32 + pixels[idx + width].0[0] as i32
                    - tile.at(row - 1, col).0[G] as i32
                    - tile.at(row + 1, col).0[G] as i32)
                    >> 1);
            let row_value = green
                + ((pixels[idx - 1].0[0] as i32 + pixels[idx + 1].0[0] as i32
                    - tile.at(row, col - 1).0[G] as i32
                    - tile.at(row, col + 1).0[G] as i32)
                    >> 1);

            let pixel = tile.at_mut(row, col);
            pixel.0[G] = green as u16;
            pixel.0[col_color] = clamp16(col_value);
            pixel.0[row_color] = clamp16(row_value);

            col += 2;
        }

        // Red/blue photosites: the opposite color from the four diagonal
        // samples, rounded.
        let mut col = left + usize::from(c == G);
        while col < right {
            let idx = row * width + col;

            let diagonal = pixels[idx - width - 1].0[0] as i32
                + pixels[idx - width + 1].0[0] as i32
                + pixels[idx + width - 1].0[0] as i32
                + pixels[idx + width + 1].0[0] as i32
                - tile.at(row - 1, col - 1).0[G] as i32
                - tile.at(row - 1, col + 1).0[G] as i32
                - tile.at(row + 1, col - 1).0[G] as i32
                - tile.at(row + 1, col + 1).0[G] as i32
                + 1;
            let col_value = tile.at(row, col).0[G] as i32 + (diagonal >> 2);

            let pixel = tile.at_mut(row, col);
            pixel.0[row_color] = pixels[idx].0[0];
            pixel.0[col_color] = clamp16(col_value);

            col += 2;
        }
    }
}

/// Projects a candidate tile into CIELAB, scaled by 64 into i16.
fn project_cielab(tile: &RgbTile, lab: &mut LabTile, camera_to_xyz: &[[f32; 4]; 3]) {
    let top = tile.top() + 1;
    let bottom = tile.bottom() - 1;
    let left = tile.left() + 1;
    let right = tile.right() - 1;
    let lookup = xyz_cbrt_lookup();

    for row in top..bottom {
        for col in left..right {
            let pixel = tile.at(row, col);
            let (r, g, b) = (
                pixel.0[0] as f32,
                pixel.0[1] as f32,
                pixel.0[2] as f32,
            );

            let cx = xyz64_cbrt(
                lookup,
                0.5 + camera_to_xyz[0][0] * r + camera_to_xyz[0][1] * g + camera_to_xyz[0][2] * b,
            );
            let cy = xyz64_cbrt(
                lookup,
                0.5 + camera_to_xyz[1][0] * r + camera_to_xyz[1][1] * g + camera_to_xyz[1][2] * b,
            );
            let cz = xyz64_cbrt(
                lookup,
                0.5 + camera_to_xyz[2][0] * r + camera_to_xyz[2][1] * g + camera_to_xyz[2][2] * b,
            );

            let out = lab.at_mut(row, col);
            out.0[0] = (116.0 * cy - 64.0 * 16.0) as i16;
            out.0[1] = (500.0 * (cx - cy)) as i16;
            out.0[2] = (200.0 * (cy - cz)) as i16;
        }
    }
}

/// The adaptive epsilon: the tighter of the horizontal pair and the
/// vertical pair of differences, plus one.
#[inline]
fn epsilon(diff: &[[i64; 4]; 2]) -> i64 {
    diff[0][0].max(diff[0][1]).min(diff[1][2].max(diff[1][3])) + 1
}

/// Counts, per direction, the 4-adjacent neighbors whose CIELAB distance
/// stays under the adaptive luminance and chroma epsilons.
fn fill_homogeneity(h_lab: &LabTile, v_lab: &LabTile, homogeneity: &mut HomogeneityTile) {
    let top = h_lab.top() + 2;
    let bottom = h_lab.bottom() - 2;
    let left = h_lab.left() + 2;
    let right = h_lab.right() - 2;

    for row in top..bottom {
        for col in left..right {
            let mut l_diff = [[0i64; 4]; 2];
            let mut ab_diff = [[0i64; 4]; 2];

            for (dir, lab) in [h_lab, v_lab].iter().enumerate() {
                let center = lab.at(row, col);
                let adjacent = [
                    lab.at(row, col - 1),
                    lab.at(row, col + 1),
                    lab.at(row - 1, col),
                    lab.at(row + 1, col),
                ];
                for (k, neighbor) in adjacent.iter().enumerate() {
                    l_diff[dir][k] = (center.0[0] as i64 - neighbor.0[0] as i64).abs();
                    let da = center.0[1] as i64 - neighbor.0[1] as i64;
                    let db = center.0[2] as i64 - neighbor.0[2] as i64;
                    ab_diff[dir][k] = da * da + db * db;
                }
            }

            let l_eps = epsilon(&l_diff);
            let ab_eps = epsilon(&ab_diff);

            let out = homogeneity.at_mut(row, col);
            for dir in 0..2 {
                let count = (0..4)
                    .filter(|&k| l_diff[dir][k] < l_eps && ab_diff[dir][k] < ab_eps)
                    .count();
                out.0[dir] = count as i8;
            }
        }
    }
}

/// Sums homogeneity over each pixel's 3×3 neighborhood and writes the
/// winning candidate (or the mean on a tie) into the output band.
fn fuse(
    h_tile: &RgbTile,
    v_tile: &RgbTile,
    homogeneity: &mut HomogeneityTile,
    out: &mut [RgbPixel],
    out_top_row: usize,
    width: usize,
) {
    let top = h_tile.top() + MARGIN;
    let bottom = h_tile.bottom() - MARGIN;
    let left = h_tile.left() + MARGIN;
    let right = h_tile.right() - MARGIN;

    for row in top..bottom {
        for col in left..right {
            let mut sums = [0i32; 2];
            for dr in -1i32..=1 {
                for dc in -1i32..=1 {
                    let p = homogeneity.at((row as i32 + dr) as usize, (col as i32 + dc) as usize);
                    sums[0] += p.0[0] as i32;
                    sums[1] += p.0[1] as i32;
                }
            }
            homogeneity.at_mut(row, col).0[2] = (sums[0] - sums[1]) as i8;
        }
    }

    for row in top..bottom {
        let out_row = &mut out[(row - out_top_row) * width..(row - out_top_row + 1) * width];
        for col in left..right {
            let h = h_tile.at(row, col);
            let v = v_tile.at(row, col);
            out_row[col] = match homogeneity.at(row, col).0[2] {
                d if d > 0 => *h,
                d if d < 0 => *v,
                _ => Pixel([
                    ((h.0[0] as u32 + v.0[0] as u32) >> 1) as u16,
                    ((h.0[1] as u32 + v.0[1] as u32) >> 1) as u16,
                    ((h.0[2] as u32 + v.0[2] as u32) >> 1) as u16,
                ]),
            };
        }
    }
}
