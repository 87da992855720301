//! Minimal TIFF structure walker
//!
//! Reads just enough of the TIFF container to pull named tags out of its
//! IFDs: byte-order-aware integer reads, IFD entry tables, and value
//! access by entry. A parser can be based anywhere in the file, which is
//! how the Nikon MakerNote's embedded TIFF is walked with its own byte
//! order and offset origin.

use std::io::{Read, Seek, SeekFrom};

use crate::MetadataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

/// One IFD entry with the absolute file position of its value data.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IfdEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    data_offset: u64,
}

fn type_size(field_type: u16) -> u64 {
    match field_type {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

/// A byte-order-aware reader over one TIFF structure.
pub(crate) struct TiffParser<'a, R: Read + Seek> {
    source: &'a mut R,
    order: ByteOrder,
    base: u64,
}

impl<'a, R: Read + Seek> TiffParser<'a, R> {
    /// Reads the TIFF header at `base` and returns the parser plus the
    /// offset of the first IFD (relative to `base`).
    pub fn open(source: &'a mut R, base: u64) -> Result<(Self, u64), MetadataError> {
        source.seek(SeekFrom::Start(base))?;
        let mut header = [0u8; 4];
        source.read_exact(&mut header)?;

        let order = match &header[..2] {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return Err(MetadataError::NotTiff),
        };
        let magic = match order {
            ByteOrder::Little => u16::from_le_bytes([header[2], header[3]]),
            ByteOrder::Big => u16::from_be_bytes([header[2], header[3]]),
        };
        if magic != 42 {
            return Err(MetadataError::NotTiff);
        }

        let mut parser = TiffParser {
            source,
            order,
            base,
        };
        let first_ifd = parser.read_u32()? as u64;
        Ok((parser, first_ifd))
    }

    fn read_u16(&mut self) -> Result<u16, MetadataError> {
        let mut bytes = [0u8; 2];
        self.source.read_exact(&mut bytes)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&mut self) -> Result<u32, MetadataError> {
        let mut bytes = [0u8; 4];
        self.source.read_exact(&mut bytes)?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Reads the entry table of the IFD at `offset` (relative to the
    /// parser's base).
    pub fn read_ifd(&mut self, offset: u64) -> Result<Vec<IfdEntry>, MetadataError> {
        self.source.seek(SeekFrom::Start(self.base + offset))?;
        let n_entries = self.read_u16()?;

        let mut entries = Vec::with_capacity(n_entries as usize);
        for i in 0..n_entries as u64 {
            let entry_offset = self.base + offset + 2 + i * 12;
            self.source.seek(SeekFrom::Start(entry_offset))?;

            let tag = self.read_u16()?;
            let field_type = self.read_u16()?;
            let count = self.read_u32()?;

            // Small values live in the entry itself; larger ones behind
            // an offset from the TIFF base.
            let size = type_size(field_type) * count as u64;
            let data_offset = if size <= 4 {
                entry_offset + 8
            } else {
                self.base + self.read_u32()? as u64
            };

            entries.push(IfdEntry {
                tag,
                field_type,
                count,
                data_offset,
            });
        }
        Ok(entries)
    }

    pub fn find(entries: &[IfdEntry], tag: u16) -> Option<IfdEntry> {
        entries.iter().copied().find(|entry| entry.tag == tag)
    }

    /// The `index`-th integer value of an entry (BYTE, SHORT or LONG).
    pub fn uint(&mut self, entry: IfdEntry, index: u32) -> Result<u32, MetadataError> {
        let size = type_size(entry.field_type);
        self.source
            .seek(SeekFrom::Start(entry.data_offset + index as u64 * size))?;
        match entry.field_type {
            1 | 6 | 7 => {
                let mut byte = [0u8; 1];
                self.source.read_exact(&mut byte)?;
                Ok(byte[0] as u32)
            }
            3 | 8 => Ok(self.read_u16()? as u32),
            _ => self.read_u32(),
        }
    }

    /// The raw value bytes of an entry.
    pub fn bytes(&mut self, entry: IfdEntry) -> Result<Vec<u8>, MetadataError> {
        self.source.seek(SeekFrom::Start(entry.data_offset))?;
        let mut bytes = vec![0u8; entry.count as usize];
        self.source.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// The absolute position of an entry's value data, plus its first
    /// six bytes (enough to sniff a MakerNote signature).
    pub fn value_location_and_prefix(
        &mut self,
        entry: IfdEntry,
    ) -> Result<(u64, [u8; 6]), MetadataError> {
        self.source.seek(SeekFrom::Start(entry.data_offset))?;
        let mut prefix = [0u8; 6];
        self.source.read_exact(&mut prefix)?;
        Ok((entry.data_offset, prefix))
    }

    /// Hands the underlying source back, ending this parser's borrow.
    pub fn source_mut(&mut self) -> &mut R {
        self.source
    }

    /// An ASCII entry as a string, trailing NULs and blanks trimmed.
    pub fn ascii(&mut self, entry: IfdEntry) -> Result<String, MetadataError> {
        let bytes = self.bytes(entry)?;
        let text: String = bytes
            .into_iter()
            .take_while(|&b| b != 0)
            .map(|b| b as char)
            .collect();
        Ok(text.trim_end().to_owned())
    }
}
