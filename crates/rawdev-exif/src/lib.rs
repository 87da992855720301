//! NEF metadata extraction
//!
//! Walks a NEF file's TIFF structure and produces the in-memory Exif view
//! the rawdev-core pipeline consumes: the raw sub-image's dimensions, bit
//! depth, strip offset and CFA pattern, the camera model and orientation,
//! and the Nikon linearization table from the MakerNote's embedded TIFF.
//! Only those keys are extracted; this is not a general Exif reader.

mod tiff;

use std::io::{Read, Seek};

use rawdev_core::MemoryExifData;
use thiserror::Error;
use tiff::TiffParser;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not a TIFF container")]
    NotTiff,

    #[error("no raw sub-image directory")]
    NoRawImage,

    #[error("missing tag: {0}")]
    MissingTag(&'static str),

    #[error("unsupported MakerNote layout")]
    UnsupportedMakerNote,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// IFD0
const TAG_MAKE: u16 = 0x010f;
const TAG_MODEL: u16 = 0x0110;
const TAG_ORIENTATION: u16 = 0x0112;
const TAG_SUB_IFDS: u16 = 0x014a;
const TAG_EXIF_IFD: u16 = 0x8769;

// Raw sub-IFD
const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_CFA_PATTERN: u16 = 0x828e;

// Exif IFD / MakerNote
const TAG_MAKER_NOTE: u16 = 0x927c;
const TAG_LINEARIZATION_TABLE: u16 = 0x0096;

/// Nikon's NEF compression scheme id.
const COMPRESSION_NEF: u32 = 34713;

/// The raw sub-image's fields, as collected from one sub-IFD.
#[derive(Debug, Default, Clone, Copy)]
struct RawIfd {
    width: u32,
    height: u32,
    bits_per_sample: u32,
    compression: u32,
    strip_offset: u32,
    cfa_pattern: Option<[u8; 4]>,
}

/// Reads the metadata the pipeline needs from a NEF stream.
///
/// The stream position is unspecified afterwards; the caller re-seeks
/// through the strip offset in the returned data.
pub fn read_nef_metadata<R: Read + Seek>(
    source: &mut R,
) -> Result<MemoryExifData, MetadataError> {
    let (mut parser, ifd0_offset) = TiffParser::open(source, 0)?;
    let ifd0 = parser.read_ifd(ifd0_offset)?;

    let make = match TiffParser::<R>::find(&ifd0, TAG_MAKE) {
        Some(entry) => parser.ascii(entry)?,
        None => String::new(),
    };
    let model = TiffParser::<R>::find(&ifd0, TAG_MODEL)
        .ok_or(MetadataError::MissingTag("Model"))
        .and_then(|entry| parser.ascii(entry))?;
    let orientation = match TiffParser::<R>::find(&ifd0, TAG_ORIENTATION) {
        Some(entry) => parser.uint(entry, 0)?,
        None => 1,
    };

    // The raw image lives in one of IFD0's sub-IFDs: prefer the
    // NEF-compressed one, fall back to the largest.
    let sub_ifds = TiffParser::<R>::find(&ifd0, TAG_SUB_IFDS).ok_or(MetadataError::NoRawImage)?;
    let mut raw: Option<RawIfd> = None;
    for index in 0..sub_ifds.count {
        let offset = parser.uint(sub_ifds, index)? as u64;
        let candidate = read_sub_ifd(&mut parser, offset)?;
        let better = match raw {
            None => true,
            Some(best) => {
                let best_is_nef = best.compression == COMPRESSION_NEF;
                let candidate_is_nef = candidate.compression == COMPRESSION_NEF;
                candidate_is_nef > best_is_nef
                    || (candidate_is_nef == best_is_nef
                        && candidate.width * candidate.height > best.width * best.height)
            }
        };
        if better {
            raw = Some(candidate);
        }
    }
    let raw = raw.ok_or(MetadataError::NoRawImage)?;

    let mut exif = MemoryExifData::new();
    exif.set_string("Exif.Image.Model", &full_model_name(&make, &model));
    exif.set_int("Exif.Image.Orientation", orientation as i64);
    exif.set_int("Exif.SubImage2.ImageWidth", raw.width as i64);
    exif.set_int("Exif.SubImage2.ImageLength", raw.height as i64);
    exif.set_int("Exif.SubImage2.BitsPerSample", raw.bits_per_sample as i64);
    exif.set_int("Exif.SubImage2.StripOffsets", raw.strip_offset as i64);
    if let Some(cfa) = raw.cfa_pattern {
        exif.set_bytes("Exif.SubImage2.CFAPattern", cfa.to_vec());
    }

    if let Some(table) = read_linearization_table(&mut parser, &ifd0)? {
        exif.set_bytes("Exif.Nikon3.LinearizationTable", table);
    }

    Ok(exif)
}

fn read_sub_ifd<R: Read + Seek>(
    parser: &mut TiffParser<R>,
    offset: u64,
) -> Result<RawIfd, MetadataError> {
    let entries = parser.read_ifd(offset)?;
    let mut ifd = RawIfd::default();

    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_IMAGE_WIDTH) {
        ifd.width = parser.uint(entry, 0)?;
    }
    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_IMAGE_LENGTH) {
        ifd.height = parser.uint(entry, 0)?;
    }
    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_BITS_PER_SAMPLE) {
        ifd.bits_per_sample = parser.uint(entry, 0)?;
    }
    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_COMPRESSION) {
        ifd.compression = parser.uint(entry, 0)?;
    }
    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_STRIP_OFFSETS) {
        ifd.strip_offset = parser.uint(entry, 0)?;
    }
    if let Some(entry) = TiffParser::<R>::find(&entries, TAG_CFA_PATTERN) {
        if entry.count == 4 {
            let bytes = parser.bytes(entry)?;
            ifd.cfa_pattern = Some([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
    }

    Ok(ifd)
}

/// Pulls the linearization table out of the Nikon MakerNote: a "Nikon"
/// signature, four version bytes, then a complete embedded TIFF whose
/// offsets are relative to its own header.
fn read_linearization_table<R: Read + Seek>(
    parser: &mut TiffParser<R>,
    ifd0: &[tiff::IfdEntry],
) -> Result<Option<Vec<u8>>, MetadataError> {
    let exif_ifd = match TiffParser::<R>::find(ifd0, TAG_EXIF_IFD) {
        Some(entry) => parser.uint(entry, 0)? as u64,
        None => return Ok(None),
    };
    let exif_entries = parser.read_ifd(exif_ifd)?;
    let maker_note = match TiffParser::<R>::find(&exif_entries, TAG_MAKER_NOTE) {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let (note_offset, signature) = parser.value_location_and_prefix(maker_note)?;
    if signature != *b"Nikon\0" {
        return Err(MetadataError::UnsupportedMakerNote);
    }

    let source = parser.source_mut();
    let (mut note_parser, note_ifd) = TiffParser::open(source, note_offset + 10)?;
    let entries = note_parser.read_ifd(note_ifd)?;
    match TiffParser::<R>::find(&entries, TAG_LINEARIZATION_TABLE) {
        Some(entry) => Ok(Some(note_parser.bytes(entry)?)),
        None => Ok(None),
    }
}

/// "NIKON CORPORATION" + "NIKON D5000" collapse to "NIKON D5000"; other
/// make/model splits are joined on the make's first word.
fn full_model_name(make: &str, model: &str) -> String {
    let make_word = make.split_whitespace().next().unwrap_or("");
    if make_word.is_empty() || model.starts_with(make_word) {
        model.to_owned()
    } else {
        format!("{} {}", make_word, model)
    }
}
