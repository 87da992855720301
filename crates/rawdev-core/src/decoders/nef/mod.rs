//! Lossy-compressed NEF decoding
//!
//! Turns a compressed Nikon raw stream into a single-channel sensor image:
//! Huffman-coded differences feed a row/column predictor chain, and the
//! predictor values index the linearization curve to produce 16-bit
//! intensities.

mod huffman;
mod linearization;


pub use huffman::HuffmanDecoder;
pub use linearization::LinearizationCurve;

use std::io::{Read, Seek, SeekFrom};

use crate::camera::CameraData;
use crate::error::{Error, Result};
use crate::exif::ExifData;
use crate::image::{fold_green, GrayImage};

/// The six canonical Nikon Huffman trees, as 32-byte specifications
/// (16 length counts, then leaves). Taken from dcraw.
pub(crate) static NIKON_TREES: [[u8; 32]; 6] = [
    // 12-bit lossy
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, //
        5, 4, 3, 6, 2, 7, 1, 0, 8, 9, 11, 10, 12, 0, 0, 0,
    ],
    // 12-bit lossy after split
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, //
        0x39, 0x5a, 0x38, 0x27, 0x16, 5, 4, 3, 2, 1, 0, 11, 12, 12, 0, 0,
    ],
    // 12-bit lossless
    [
        0, 1, 4, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
        5, 4, 6, 3, 7, 2, 8, 1, 9, 0, 10, 11, 12, 0, 0, 0,
    ],
    // 14-bit lossy
    [
        0, 1, 4, 3, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, //
        5, 6, 4, 7, 8, 3, 9, 2, 1, 0, 10, 11, 12, 13, 14, 0,
    ],
    // 14-bit lossy after split
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, //
        8, 0x5c, 0x4b, 0x3a, 0x29, 7, 6, 5, 4, 3, 2, 1, 0, 13, 14, 0,
    ],
    // 14-bit lossless
    [
        0, 1, 4, 2, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, //
        7, 6, 8, 5, 9, 4, 10, 3, 11, 12, 2, 0, 1, 13, 14, 0,
    ],
];

/// Decodes one Huffman-coded difference.
///
/// The leaf packs the difference's bit length in its low nibble and a
/// left-shift amount in its high nibble.
fn decode_diff<R: Read + Seek>(decoder: &mut HuffmanDecoder<R>) -> i32 {
    let leaf = decoder.next_huffman() as i32;
    let len = leaf & 0xf;
    let shl = leaf >> 4;

    let bits = decoder.next_bits((len - shl) as u32) as i32;
    if len == 0 {
        return 0;
    }

    let mut diff = ((bits << 1) | 1) << shl >> 1;
    if diff & (1 << (len - 1)) == 0 {
        diff -= (1 << len) - (shl == 0) as i32;
    }
    diff
}

/// The running predictor state for one decode pass.
struct PredictorChain {
    vpred: [[u16; 2]; 2],
    hpred: [u16; 2],
    min: i32,
    max: i32,
}

impl PredictorChain {
    /// Decodes rows `rows` into `image`, consuming one difference per
    /// pixel. Columns 0 and 1 carry vertically, later columns carry
    /// horizontally by column parity.
    fn decode_rows<R: Read + Seek>(
        &mut self,
        decoder: &mut HuffmanDecoder<R>,
        rows: std::ops::Range<usize>,
        curve: &[u16],
        image: &mut GrayImage,
    ) -> Result<()> {
        let width = image.width();
        // The range check runs against max - min, which the post-split
        // adjustment can push past the table length; the index clamp keeps
        // the lookup in bounds either way.
        let top = curve.len() - 1;
        for row in rows {
            let pixels = image.row_mut(row);
            for col in 0..width.min(2) {
                let diff = decode_diff(decoder);
                let v = self.vpred[row & 1][col].wrapping_add(diff as u16);
                self.vpred[row & 1][col] = v;
                self.hpred[col] = v;
                self.check(row, col)?;
                pixels[col].0[0] = curve[(v as usize).min(top)];
            }
            for col in 2..width {
                let diff = decode_diff(decoder);
                let parity = col & 1;
                self.hpred[parity] = self.hpred[parity].wrapping_add(diff as u16);
                self.check(row, col)?;
                pixels[col].0[0] = curve[(self.hpred[parity] as usize).min(top)];
            }
        }
        Ok(())
    }

    fn check(&self, row: usize, col: usize) -> Result<()> {
        let hpred = self.hpred[col & 1];
        if (hpred as i32) >= self.max - self.min {
            return Err(Error::PredictorOutOfRange { row, col, hpred });
        }
        Ok(())
    }
}

/// Decodes a lossy-compressed NEF stream into a sensor image.
///
/// `source` may be positioned anywhere; the compressed data offset comes
/// from the metadata. When `honor_split` is set and the linearization
/// curve carries a split row, decoding re-keys to the post-split tree
/// there; the switch is off by default because the available reference
/// renderings were produced without it.
pub fn read_gray_image<R: Read + Seek>(
    source: &mut R,
    exif: &dyn ExifData,
    honor_split: bool,
) -> Result<GrayImage> {
    let camera = CameraData::from_exif(exif)?;

    let bits_per_sample = exif.int("Exif.SubImage2.BitsPerSample")? as u32;
    let data_offset = exif.int("Exif.SubImage2.StripOffsets")? as u64;
    let width = exif.int("Exif.SubImage2.ImageWidth")? as usize;
    let height = exif.int("Exif.SubImage2.ImageLength")? as usize;

    let curve = LinearizationCurve::parse(
        &exif.bytes("Exif.Nikon3.LinearizationTable")?,
        bits_per_sample,
    )?;

    source.seek(SeekFrom::Start(data_offset))?;

    let mut image = GrayImage::new(camera, width, height);

    let mut chain = PredictorChain {
        vpred: curve.vpred,
        hpred: [0; 2],
        min: 0,
        max: curve.max,
    };

    let split_row = if honor_split { curve.split as usize } else { 0 };
    let first_rows = if split_row > 0 && split_row < height {
        split_row
    } else {
        height
    };

    {
        let mut decoder = HuffmanDecoder::new(&mut *source, &NIKON_TREES[0]);
        chain.decode_rows(&mut decoder, 0..first_rows, &curve.table, &mut image)?;
    }

    if first_rows < height {
        chain.min = 16;
        chain.max += 32;
        let mut decoder = HuffmanDecoder::new(&mut *source, &NIKON_TREES[1]);
        chain.decode_rows(&mut decoder, first_rows..height, &curve.table, &mut image)?;
    }

    let filters = image.filters();
    image.set_filters(fold_green(filters));

    Ok(image)
}
