//! Pipeline error types
//!
//! Every stage reports through one enum. There is no local recovery: errors
//! surface to the driver, which prints them and exits nonzero.

use thiserror::Error;

/// Errors raised while decoding and rendering a raw file.
#[derive(Debug, Error)]
pub enum Error {
    /// A required metadata entry is absent. Fatal at decode setup.
    #[error("missing Exif key: {0}")]
    ExifKeyMissing(String),

    /// A metadata entry exists but cannot be read as the expected type.
    #[error("Exif key {key} is not readable as {expected}")]
    ExifTypeMismatch { key: String, expected: &'static str },

    /// No registry entry matched the image. Not reachable while the null
    /// camera terminates the registry, but reserved.
    #[error("no camera model matches this image")]
    UnknownCamera,

    /// The NEF predictor chain left the valid range; the stream is corrupt
    /// beyond this point.
    #[error("predictor out of range at ({row}, {col}): hpred = {hpred}")]
    PredictorOutOfRange { row: usize, col: usize, hpred: u16 },

    /// The input is neither a decodable raw file nor a PPM.
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
