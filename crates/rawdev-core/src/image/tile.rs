//! Tile scratch buffers
//!
//! A tile is a fixed-size scratch raster addressed in full-image
//! coordinates. Workers allocate their tiles once and walk them across the
//! image with `set_top_left`; the backing storage is never reallocated.
//! Adjacent tiles overlap by a read-only margin, so the writable interior
//! reported by `top`/`left`/`bottom`/`right` stitches gap-free.

use super::{LabPixel, Pixel, Point, RgbPixel};

/// Horizontal/vertical homogeneity counts plus their signed difference.
pub type HomogeneityPixel = Pixel<i8, 3>;

/// A rectangular scratch buffer with image-coordinate addressing.
#[derive(Debug, Clone)]
pub struct ImageTile<P> {
    image_size: Point,
    top_left: Point,
    size: Point,
    edge_size: i32,
    pixels: Vec<P>,
}

pub type RgbTile = ImageTile<RgbPixel>;
pub type LabTile = ImageTile<LabPixel>;
pub type HomogeneityTile = ImageTile<HomogeneityPixel>;

impl<P: Copy + Default> ImageTile<P> {
    /// Allocates a tile.
    ///
    /// `image_size` is one past the bottom-right of the full image,
    /// `top_left` the image pixel corresponding to this tile's origin,
    /// `size` the tile extent. `border` is the count of image-edge pixels
    /// the tile never touches and `margin` the overlap with neighboring
    /// tiles; the writable region is clamped by `border - margin`.
    pub fn new(
        image_size: Point,
        top_left: Point,
        size: Point,
        border: u32,
        margin: u32,
    ) -> Self {
        ImageTile {
            image_size,
            top_left,
            size,
            edge_size: (border - margin) as i32,
            pixels: vec![P::default(); (size.row * size.col) as usize],
        }
    }
}

impl<P> ImageTile<P> {
    /// Moves the tile to a new image position, repurposing the storage.
    pub fn set_top_left(&mut self, top_left: Point) {
        self.top_left = top_left;
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn width(&self) -> usize {
        self.size.col as usize
    }

    pub fn height(&self) -> usize {
        self.size.row as usize
    }

    /// Topmost image row this tile may modify.
    pub fn top(&self) -> usize {
        self.top_left.row.max(self.edge_size) as usize
    }

    /// Leftmost image column this tile may modify.
    pub fn left(&self) -> usize {
        self.top_left.col.max(self.edge_size) as usize
    }

    /// One past the bottommost image row this tile may modify.
    pub fn bottom(&self) -> usize {
        (self.image_size.row - self.edge_size).min(self.top_left.row + self.size.row) as usize
    }

    /// One past the rightmost image column this tile may modify.
    pub fn right(&self) -> usize {
        (self.image_size.col - self.edge_size).min(self.top_left.col + self.size.col) as usize
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        let tile_row = row as i32 - self.top_left.row;
        let tile_col = col as i32 - self.top_left.col;
        (tile_row * self.size.col + tile_col) as usize
    }

    /// The pixel at full-image coordinates `(row, col)`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> &P {
        &self.pixels[self.index(row, col)]
    }

    #[inline]
    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut P {
        let index = self.index(row, col);
        &mut self.pixels[index]
    }
}
