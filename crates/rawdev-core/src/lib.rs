//! rawdev core library
//!
//! Decodes camera raw files (lossy-compressed Nikon NEF, plus PPM for
//! testing) and renders them to gamma-corrected sRGB: Huffman-driven raw
//! decode, white-balance scaling, AHD or bilinear demosaicing, camera
//! color conversion, and histogram-driven gamma.

pub mod camera;
pub mod decoders;
pub mod error;
pub mod exif;
pub mod exporters;
pub mod image;
pub mod models;
pub mod pipeline;

// Re-export the types most callers touch
pub use error::{Error, Result};
pub use exif::{ExifData, MemoryExifData};
pub use models::{DevelopOptions, Interpolation};
