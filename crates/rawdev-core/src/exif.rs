//! Exif metadata facade
//!
//! The pipeline never parses Exif itself; it consumes a key/value view of
//! whatever the caller extracted from the file. Keys use the dotted
//! `Exif.Group.Tag` notation, e.g. `Exif.SubImage2.StripOffsets`.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Read-only key/value access to an image's metadata.
pub trait ExifData: Sync {
    /// True iff the metadata contains `key`.
    fn has(&self, key: &str) -> bool;

    /// The value of `key` as a string.
    fn string(&self, key: &str) -> Result<String>;

    /// The raw bytes of `key` (for blob-valued tags such as
    /// `Exif.Nikon3.LinearizationTable`).
    fn bytes(&self, key: &str) -> Result<Vec<u8>>;

    /// The value of `key` as an integer.
    fn int(&self, key: &str) -> Result<i64>;

    /// The value of `key` as a float.
    fn float(&self, key: &str) -> Result<f64>;
}

/// One stored metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// An in-memory metadata container.
///
/// Values are set programmatically. Used by the tests and as the output of
/// the NEF metadata reader.
#[derive(Debug, Clone, Default)]
pub struct MemoryExifData {
    entries: HashMap<String, ExifValue>,
}

impl MemoryExifData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.entries.insert(key.to_owned(), ExifValue::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f64) {
        self.entries.insert(key.to_owned(), ExifValue::Float(value));
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.entries
            .insert(key.to_owned(), ExifValue::Text(value.to_owned()));
    }

    pub fn set_bytes(&mut self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_owned(), ExifValue::Bytes(value));
    }

    fn get(&self, key: &str) -> Result<&ExifValue> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::ExifKeyMissing(key.to_owned()))
    }
}

impl ExifData for MemoryExifData {
    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            ExifValue::Text(s) => Ok(s.clone()),
            ExifValue::Int(i) => Ok(i.to_string()),
            _ => Err(Error::ExifTypeMismatch {
                key: key.to_owned(),
                expected: "string",
            }),
        }
    }

    fn bytes(&self, key: &str) -> Result<Vec<u8>> {
        match self.get(key)? {
            ExifValue::Bytes(b) => Ok(b.clone()),
            _ => Err(Error::ExifTypeMismatch {
                key: key.to_owned(),
                expected: "bytes",
            }),
        }
    }

    fn int(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            ExifValue::Int(i) => Ok(*i),
            _ => Err(Error::ExifTypeMismatch {
                key: key.to_owned(),
                expected: "integer",
            }),
        }
    }

    fn float(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            ExifValue::Float(f) => Ok(*f),
            ExifValue::Int(i) => Ok(*i as f64),
            _ => Err(Error::ExifTypeMismatch {
                key: key.to_owned(),
                expected: "float",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_exif_round_trip() {
        let mut exif = MemoryExifData::new();
        exif.set_string("Exif.Image.Model", "NIKON D5000");
        exif.set_int("Exif.Image.Orientation", 1);
        exif.set_bytes("Exif.SubImage2.CFAPattern", vec![1, 2, 0, 1]);

        assert!(exif.has("Exif.Image.Model"));
        assert!(!exif.has("Exif.Image.Artist"));
        assert_eq!(exif.string("Exif.Image.Model").unwrap(), "NIKON D5000");
        assert_eq!(exif.int("Exif.Image.Orientation").unwrap(), 1);
        assert_eq!(
            exif.bytes("Exif.SubImage2.CFAPattern").unwrap(),
            vec![1, 2, 0, 1]
        );
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let exif = MemoryExifData::new();
        match exif.int("Exif.SubImage2.StripOffsets") {
            Err(Error::ExifKeyMissing(key)) => {
                assert_eq!(key, "Exif.SubImage2.StripOffsets")
            }
            other => panic!("expected ExifKeyMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut exif = MemoryExifData::new();
        exif.set_string("Exif.Image.Model", "NIKON D5000");
        assert!(matches!(
            exif.int("Exif.Image.Model"),
            Err(Error::ExifTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_int_promotes_to_float() {
        let mut exif = MemoryExifData::new();
        exif.set_int("Exif.Image.XResolution", 300);
        assert_eq!(exif.float("Exif.Image.XResolution").unwrap(), 300.0);
    }
}
