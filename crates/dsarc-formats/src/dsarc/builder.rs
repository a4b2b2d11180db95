//! DSARC builder

use crate::dsarc::error::{DsarcError, DsarcResult};
use crate::dsarc::header::{DsarcHeader, DsarcRecord, HEADER_SIZE, RECORD_SIZE};
use binrw::BinWrite;
use binrw::io::Cursor;
use std::ops::ControlFlow;

/// Builder for DSARC archives
///
/// Entries are written in insertion order. Payloads start right after the
/// record table and are packed back to back with no alignment.
#[derive(Debug, Clone, Default)]
pub struct DsarcBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl DsarcBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named payload
    pub fn add(&mut self, name: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.entries.push((name.into(), data));
        self
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries have been added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the archive
    pub fn build(&self) -> DsarcResult<Vec<u8>> {
        build_from_pairs(&self.entries)
    }
}

/// Build a DSARC buffer from ordered `(name, bytes)` pairs
pub fn build_from_pairs<N, D>(pairs: &[(N, D)]) -> DsarcResult<Vec<u8>>
where
    N: AsRef<str>,
    D: AsRef<[u8]>,
{
    build_from_pairs_with(pairs, |_, _| ControlFlow::Continue(()))
}

/// Build a DSARC buffer, consulting `observer` before each record is laid out
///
/// The observer receives `(index, total)`. Returning `Break` stops the build
/// with [`DsarcError::Interrupted`].
pub fn build_from_pairs_with<N, D, F>(pairs: &[(N, D)], mut observer: F) -> DsarcResult<Vec<u8>>
where
    N: AsRef<str>,
    D: AsRef<[u8]>,
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    let count = i32::try_from(pairs.len())
        .map_err(|_| DsarcError::TooLarge(format!("{} entries", pairs.len())))?;

    let data_start = HEADER_SIZE + pairs.len() * RECORD_SIZE;
    let payload_len: usize = pairs.iter().map(|(_, data)| data.as_ref().len()).sum();

    let mut records = Vec::with_capacity(pairs.len());
    let mut offset = data_start;
    for (index, (name, data)) in pairs.iter().enumerate() {
        if observer(index, pairs.len()).is_break() {
            return Err(DsarcError::Interrupted { index });
        }

        let name = name.as_ref();
        let size = data.as_ref().len();
        let size_field = i32::try_from(size)
            .map_err(|_| DsarcError::TooLarge(format!("{name} is {size} bytes")))?;
        let offset_field = i32::try_from(offset)
            .map_err(|_| DsarcError::TooLarge(format!("{name} starts at offset {offset}")))?;

        records.push(DsarcRecord::new(name, size_field, offset_field));
        offset += size;
    }

    let mut output = Vec::with_capacity(data_start + payload_len);
    let mut cursor = Cursor::new(&mut output);
    DsarcHeader::new(count).write(&mut cursor)?;
    for record in &records {
        record.write(&mut cursor)?;
    }
    for (_, data) in pairs {
        output.extend_from_slice(data.as_ref());
    }

    Ok(output)
}
