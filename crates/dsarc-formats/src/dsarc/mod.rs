//! DSARC named-entry archive implementation
//!
//! # Format Structure
//!
//! ```text
//! DSARC File:
//! ├── Header (16 bytes, little-endian)
//! │   ├── Magic: "DSARC FL" (8 bytes)
//! │   ├── Entry count (4 bytes)
//! │   └── Version: 1 (4 bytes)
//! ├── Records (48 bytes each)
//! │   ├── Name (40 bytes, NUL-padded UTF-8)
//! │   ├── Size (4 bytes)
//! │   └── Offset (4 bytes, absolute)
//! └── Payloads at their declared offsets
//! ```
//!
//! Parsing runs in two passes. The first reads and bounds-checks every record
//! so that a corrupt table is rejected before any payload is read. The second
//! sniffs each payload for the MSND magic and decodes matching entries into
//! three child chunks whose offsets are relative to the entry payload.

mod builder;
mod error;
mod header;

pub use builder::{DsarcBuilder, build_from_pairs, build_from_pairs_with};
pub use error::{DsarcError, DsarcResult};
pub use header::{DsarcHeader, DsarcRecord, HEADER_SIZE, MAGIC_DSARC, RECORD_SIZE, VERSION};

use crate::entry::Entry;
use crate::msnd::{self, MAGIC_MSND};
use binrw::BinRead;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::Path;

/// Parse an in-memory DSARC buffer
pub fn parse(data: &[u8]) -> DsarcResult<Vec<Entry>> {
    parse_with(data, |_, _| ControlFlow::Continue(()))
}

/// Parse an in-memory DSARC buffer, consulting `observer` before each record
///
/// The observer receives `(index, total)`. Returning `Break` aborts the parse
/// with [`DsarcError::Interrupted`].
pub fn parse_with<F>(data: &[u8], observer: F) -> DsarcResult<Vec<Entry>>
where
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    parse_reader(&mut Cursor::new(data), data.len() as u64, observer)
}

/// Parse a DSARC archive file
pub fn parse_file<P: AsRef<Path>>(path: P) -> DsarcResult<Vec<Entry>> {
    parse_file_with(path, |_, _| ControlFlow::Continue(()))
}

/// Parse a DSARC archive file with a record observer
pub fn parse_file_with<P, F>(path: P, observer: F) -> DsarcResult<Vec<Entry>>
where
    P: AsRef<Path>,
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    parse_reader(&mut BufReader::new(file), len, observer)
}

/// Parse a DSARC archive from a seekable source of known total length
///
/// Every record's range is checked against `len`, so `len` must be the true
/// length of the source.
pub fn parse_reader<R, F>(reader: &mut R, len: u64, mut observer: F) -> DsarcResult<Vec<Entry>>
where
    R: Read + Seek,
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    reader.seek(SeekFrom::Start(0))?;
    let mut magic = Vec::with_capacity(MAGIC_DSARC.len());
    reader
        .by_ref()
        .take(MAGIC_DSARC.len() as u64)
        .read_to_end(&mut magic)?;
    if magic != MAGIC_DSARC {
        return Err(DsarcError::NotDsarc(magic));
    }
    if len < HEADER_SIZE as u64 {
        return Err(DsarcError::TruncatedHeader(len));
    }

    reader.seek(SeekFrom::Start(0))?;
    let header = DsarcHeader::read(reader)?;
    header.validate()?;

    let count = header.count as usize;
    let needed = header.data_start();
    if needed > len {
        return Err(DsarcError::TruncatedTable { count, needed, len });
    }

    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        if observer(index, count).is_break() {
            return Err(DsarcError::Interrupted { index });
        }

        let record = DsarcRecord::read(reader)?;
        let name = record.decoded_name(index);
        let (offset, size) = record.check_bounds(&name, len)?;
        entries.push(Entry::new(name, size, offset));
    }

    for entry in &mut entries {
        if entry.size < MAGIC_MSND.len() as u32 {
            continue;
        }

        reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_MSND {
            continue;
        }

        reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut payload = vec![0u8; entry.size as usize];
        reader.read_exact(&mut payload)?;

        let children =
            msnd::parse(&payload, entry.stem()).map_err(|source| DsarcError::EmbeddedMsnd {
                name: entry.name.clone(),
                source,
            })?;
        entry.children = children;
        entry.is_embedded_container = true;
    }

    Ok(entries)
}

/// Fully decoded DSARC archive with owned payloads
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DsarcArchive {
    /// `(name, payload)` pairs in table order
    pub entries: Vec<(String, Vec<u8>)>,
}

impl DsarcArchive {
    /// Decode a buffer, copying each payload out
    pub fn from_bytes(data: &[u8]) -> DsarcResult<Self> {
        let entries = parse(data)?
            .into_iter()
            .map(|entry| {
                let payload = data[entry.range()].to_vec();
                (entry.name, payload)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Payload of the first entry with the given name
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Encode back into a canonically laid out archive
    pub fn to_bytes(&self) -> DsarcResult<Vec<u8>> {
        build_from_pairs(&self.entries)
    }
}

impl crate::ContainerFormat for DsarcArchive {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::from_bytes(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.to_bytes()?)
    }
}
