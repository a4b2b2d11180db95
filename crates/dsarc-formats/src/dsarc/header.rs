//! DSARC header and record structures

use crate::dsarc::error::{DsarcError, DsarcResult};
use crate::names::{NAME_SIZE, decode_name, pad_name};
use binrw::{BinRead, BinWrite};

/// DSARC magic bytes: "DSARC FL"
pub const MAGIC_DSARC: [u8; 8] = *b"DSARC FL";

/// The only supported version
pub const VERSION: i32 = 1;

/// Fixed header length
pub const HEADER_SIZE: usize = 16;

/// Length of one entry record
pub const RECORD_SIZE: usize = NAME_SIZE + 8;

/// DSARC file header (16 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DsarcHeader {
    /// Magic bytes: "DSARC FL"
    pub magic: [u8; 8],
    /// Number of records following the header
    pub count: i32,
    /// Format version (always 1)
    pub version: i32,
}

impl DsarcHeader {
    /// Create a header for `count` records
    pub fn new(count: i32) -> Self {
        Self {
            magic: MAGIC_DSARC,
            count,
            version: VERSION,
        }
    }

    /// Validate magic, version and count
    pub fn validate(&self) -> DsarcResult<()> {
        if self.magic != MAGIC_DSARC {
            return Err(DsarcError::NotDsarc(self.magic.to_vec()));
        }
        if self.version != VERSION {
            return Err(DsarcError::UnsupportedVersion(self.version));
        }
        if self.count < 0 {
            return Err(DsarcError::InvalidCount(self.count));
        }
        Ok(())
    }

    /// Offset of the first payload byte for a canonically built archive
    pub fn data_start(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.count.unsigned_abs()) * RECORD_SIZE as u64
    }
}

/// One entry record (48 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct DsarcRecord {
    /// NUL-padded UTF-8 name
    pub name: [u8; NAME_SIZE],
    /// Payload size
    pub size: i32,
    /// Absolute payload offset
    pub offset: i32,
}

impl DsarcRecord {
    /// Create a record, truncating the name to the field width
    pub fn new(name: &str, size: i32, offset: i32) -> Self {
        Self {
            name: pad_name(name),
            size,
            offset,
        }
    }

    /// Decoded name, or `file_<index>` when the field is empty
    pub fn decoded_name(&self, index: usize) -> String {
        decode_name(&self.name, index)
    }

    /// Check the declared range against the archive length
    ///
    /// Returns `(offset, size)` as unsigned values on success.
    pub fn check_bounds(&self, name: &str, len: u64) -> DsarcResult<(u32, u32)> {
        let offset = i64::from(self.offset);
        let size = i64::from(self.size);

        if offset < 0 || size < 0 || (offset + size) as u64 > len {
            return Err(DsarcError::EntryOutOfBounds {
                name: name.to_string(),
                offset,
                size,
                len,
            });
        }

        Ok((self.offset as u32, self.size as u32))
    }
}
