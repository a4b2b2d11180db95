//! MSND sound container implementation
//!
//! An MSND buffer is a 48-byte header followed by three chunks that always
//! appear in the same order: SSEQ (sequence), SBNK (bank), SWAR (wave
//! archive).
//!
//! # Format Structure
//!
//! ```text
//! MSND File:
//! ├── Header (48 bytes, little-endian)
//! │   ├── Magic: "DSEQ" (4 bytes)
//! │   ├── Reserved (12 bytes)
//! │   ├── SSEQ offset + 16 (4 bytes)
//! │   ├── SBNK offset (4 bytes)
//! │   ├── SWAR offset (4 bytes)
//! │   ├── Reserved (4 bytes)
//! │   ├── SSEQ size (4 bytes)
//! │   ├── SBNK size (4 bytes)
//! │   ├── SWAR size (4 bytes)
//! │   └── Trailer (4 opaque bytes)
//! └── SSEQ, SBNK, SWAR payloads
//! ```

mod builder;
mod error;
mod header;

pub use builder::MsndBuilder;
pub use error::{MsndError, MsndResult};
pub use header::{HEADER_SIZE, MAGIC_MSND, MsndHeader, SSEQ_OFFSET_BIAS, TRAILER_RANGE};

use crate::entry::Entry;
use binrw::BinRead;
use binrw::io::Cursor;
use std::collections::HashMap;
use std::fmt;

/// One of the three fixed MSND chunk slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkKind {
    /// Sequence data
    Sseq,
    /// Instrument bank
    Sbnk,
    /// Wave archive
    Swar,
}

impl ChunkKind {
    /// All chunks in container order
    pub const ALL: [Self; 3] = [Self::Sseq, Self::Sbnk, Self::Swar];

    /// Position of the chunk in container order
    pub const fn index(self) -> usize {
        match self {
            Self::Sseq => 0,
            Self::Sbnk => 1,
            Self::Swar => 2,
        }
    }

    /// File extension including the dot
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Sseq => ".sseq",
            Self::Sbnk => ".sbnk",
            Self::Swar => ".swar",
        }
    }

    /// Parse an extension, with or without the leading dot, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension()[1..].eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sseq => f.write_str("SSEQ"),
            Self::Sbnk => f.write_str("SBNK"),
            Self::Swar => f.write_str("SWAR"),
        }
    }
}

/// Parse the header of an MSND buffer without touching the payloads
pub fn parse_header(data: &[u8]) -> MsndResult<MsndHeader> {
    if !data.starts_with(&MAGIC_MSND) {
        return Err(MsndError::NotMsnd(data[..data.len().min(4)].to_vec()));
    }
    if data.len() < HEADER_SIZE {
        return Err(MsndError::TooSmall(data.len()));
    }

    let header = MsndHeader::read(&mut Cursor::new(data))?;
    header.validate()?;
    Ok(header)
}

/// Parse an MSND buffer into its three chunk entries
///
/// The entries are named `<base_name>.sseq`, `<base_name>.sbnk` and
/// `<base_name>.swar` and carry offsets into `data`.
pub fn parse(data: &[u8], base_name: &str) -> MsndResult<Vec<Entry>> {
    let header = parse_header(data)?;

    let mut entries = Vec::with_capacity(ChunkKind::ALL.len());
    for kind in ChunkKind::ALL {
        let (offset, size) = header.check_chunk_bounds(kind, data.len())?;
        entries.push(Entry::new(
            format!("{base_name}{}", kind.extension()),
            size,
            offset,
        ));
    }

    Ok(entries)
}

/// Build an MSND buffer from extension-keyed chunks
///
/// Keys are matched case-insensitively, with or without the leading dot.
/// Keys that name no chunk are ignored; two keys naming the same chunk are
/// rejected. A trailer of any length other than four bytes is treated as
/// absent.
pub fn build(chunks: &HashMap<String, Vec<u8>>, trailer: Option<&[u8]>) -> MsndResult<Vec<u8>> {
    let mut payloads: [Option<&Vec<u8>>; 3] = [None; 3];
    for (ext, data) in chunks {
        if let Some(kind) = ChunkKind::from_extension(ext)
            && payloads[kind.index()].replace(data).is_some()
        {
            return Err(MsndError::DuplicateChunk(kind));
        }
    }

    let mut builder = MsndBuilder::new().trailer_bytes(trailer);
    for kind in ChunkKind::ALL {
        if let Some(data) = payloads[kind.index()] {
            builder = builder.chunk(kind, data.clone());
        }
    }
    builder.build()
}

/// Replace one chunk of an existing MSND buffer
///
/// The other two chunks are copied unchanged and the trailer is preserved.
pub fn replace_chunk(data: &[u8], extension: &str, new_data: Vec<u8>) -> MsndResult<Vec<u8>> {
    let target = ChunkKind::from_extension(extension)
        .ok_or_else(|| MsndError::UnsupportedExtension(extension.to_string()))?;

    let entries = parse(data, "temp")?;
    let mut builder = MsndBuilder::new().trailer_bytes(data.get(TRAILER_RANGE));
    let mut replacement = Some(new_data);
    for (kind, entry) in ChunkKind::ALL.into_iter().zip(&entries) {
        let payload = if kind == target {
            replacement.take().unwrap_or_default()
        } else {
            data[entry.range()].to_vec()
        };
        builder = builder.chunk(kind, payload);
    }

    builder.build()
}

/// Fully decoded MSND container with owned chunk payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsndFile {
    /// Chunk payloads in SSEQ, SBNK, SWAR order
    pub chunks: [Vec<u8>; 3],
    /// Opaque header trailer
    pub trailer: [u8; 4],
}

impl MsndFile {
    /// Decode a buffer, copying each chunk out
    pub fn from_bytes(data: &[u8]) -> MsndResult<Self> {
        let entries = parse(data, "")?;
        let mut trailer = [0u8; 4];
        trailer.copy_from_slice(&data[TRAILER_RANGE]);

        Ok(Self {
            chunks: [0, 1, 2].map(|i| data[entries[i].range()].to_vec()),
            trailer,
        })
    }

    /// Payload of one chunk
    pub fn chunk(&self, kind: ChunkKind) -> &[u8] {
        &self.chunks[kind.index()]
    }

    /// Encode back into a contiguous container
    pub fn to_bytes(&self) -> MsndResult<Vec<u8>> {
        ChunkKind::ALL
            .into_iter()
            .fold(MsndBuilder::new().trailer(self.trailer), |b, kind| {
                b.chunk(kind, self.chunks[kind.index()].clone())
            })
            .build()
    }
}

impl crate::ContainerFormat for MsndFile {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::from_bytes(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.to_bytes()?)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ContainerFormat;

    fn sample() -> Vec<u8> {
        MsndBuilder::new()
            .chunk(ChunkKind::Sseq, b"SSEQ-data".to_vec())
            .chunk(ChunkKind::Sbnk, b"SBNK-bank".to_vec())
            .chunk(ChunkKind::Swar, b"SWAR-waves".to_vec())
            .trailer(*b"\xDE\xAD\xBE\xEF")
            .build()
            .expect("Operation should succeed")
    }

    #[test]
    fn test_chunk_kind_extensions() {
        assert_eq!(ChunkKind::from_extension(".sseq"), Some(ChunkKind::Sseq));
        assert_eq!(ChunkKind::from_extension("SBNK"), Some(ChunkKind::Sbnk));
        assert_eq!(ChunkKind::from_extension(".Swar"), Some(ChunkKind::Swar));
        assert_eq!(ChunkKind::from_extension(".swav"), None);
        assert_eq!(ChunkKind::from_extension(""), None);
    }

    #[test]
    fn test_parse_names_and_ranges() {
        let data = sample();
        let entries = parse(&data, "bgm_001").expect("Operation should succeed");

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["bgm_001.sseq", "bgm_001.sbnk", "bgm_001.swar"]);
        assert_eq!(entries[0].slice(&data), Some(&b"SSEQ-data"[..]));
        assert_eq!(entries[1].slice(&data), Some(&b"SBNK-bank"[..]));
        assert_eq!(entries[2].slice(&data), Some(&b"SWAR-waves"[..]));
    }

    #[test]
    fn test_parse_rejects_wrong_magic() {
        let mut data = sample();
        data[0] = b'X';
        assert!(matches!(parse(&data, "x"), Err(MsndError::NotMsnd(_))));
        assert!(matches!(parse(b"DS", "x"), Err(MsndError::NotMsnd(_))));
    }

    #[test]
    fn test_parse_rejects_short_buffer() {
        let data = sample();
        assert!(matches!(
            parse(&data[..47], "x"),
            Err(MsndError::TooSmall(47))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_bounds_chunk() {
        let data = sample();
        // Drop the last byte of the SWAR payload
        let truncated = &data[..data.len() - 1];
        assert!(matches!(
            parse(truncated, "x"),
            Err(MsndError::OutOfBounds {
                chunk: ChunkKind::Swar,
                ..
            })
        ));
    }

    #[test]
    fn test_build_from_extension_map() {
        let mut chunks = HashMap::new();
        chunks.insert(".sseq".to_string(), b"SSEQ-data".to_vec());
        chunks.insert(".SBNK".to_string(), b"SBNK-bank".to_vec());
        chunks.insert("swar".to_string(), b"SWAR-waves".to_vec());
        chunks.insert(".txt".to_string(), b"ignored".to_vec());

        let data = build(&chunks, Some(b"\xDE\xAD\xBE\xEF")).expect("Operation should succeed");
        assert_eq!(data, sample());
    }

    #[test]
    fn test_build_missing_chunk() {
        let mut chunks = HashMap::new();
        chunks.insert(".sseq".to_string(), vec![1]);
        chunks.insert(".sbnk".to_string(), vec![2]);
        assert!(matches!(
            build(&chunks, None),
            Err(MsndError::MissingChunk(ChunkKind::Swar))
        ));
    }

    #[test]
    fn test_build_rejects_case_duplicate_keys() {
        let mut chunks = HashMap::new();
        chunks.insert(".SSEQ".to_string(), vec![1]);
        chunks.insert("sseq".to_string(), vec![2]);
        chunks.insert(".sbnk".to_string(), vec![3]);
        chunks.insert(".swar".to_string(), vec![4]);
        assert!(matches!(
            build(&chunks, None),
            Err(MsndError::DuplicateChunk(ChunkKind::Sseq))
        ));
    }

    #[test]
    fn test_replace_chunk() {
        let data = sample();
        let rebuilt =
            replace_chunk(&data, ".SBNK", b"new bank!!".to_vec()).expect("Operation should succeed");

        let file = MsndFile::from_bytes(&rebuilt).expect("Operation should succeed");
        assert_eq!(file.chunk(ChunkKind::Sseq), b"SSEQ-data");
        assert_eq!(file.chunk(ChunkKind::Sbnk), b"new bank!!");
        assert_eq!(file.chunk(ChunkKind::Swar), b"SWAR-waves");
        assert_eq!(file.trailer, *b"\xDE\xAD\xBE\xEF");
    }

    #[test]
    fn test_replace_chunk_unsupported_extension() {
        let data = sample();
        assert!(matches!(
            replace_chunk(&data, ".swav", vec![]),
            Err(MsndError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_msnd_file_round_trip() {
        MsndFile::verify_round_trip(&sample()).expect("Round-trip should succeed");
    }

    #[test]
    fn test_parse_accepts_non_contiguous_layout() {
        // Chunks stored out of order with a gap are still valid
        let mut header = MsndHeader::for_sizes([2, 2, 2], [0; 4]).expect("sizes fit");
        header.set_chunk(ChunkKind::Sseq, 56, 2);
        header.set_chunk(ChunkKind::Sbnk, 48, 2);
        header.set_chunk(ChunkKind::Swar, 52, 2);

        let mut data = Vec::new();
        binrw::BinWrite::write(&header, &mut Cursor::new(&mut data)).expect("write header");
        data.extend_from_slice(b"bb..ww..ss");

        let entries = parse(&data, "odd").expect("Operation should succeed");
        assert_eq!(entries[0].slice(&data), Some(&b"ss"[..]));
        assert_eq!(entries[1].slice(&data), Some(&b"bb"[..]));
        assert_eq!(entries[2].slice(&data), Some(&b"ww"[..]));
    }
}
