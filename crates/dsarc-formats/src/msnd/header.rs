//! MSND header structure

use crate::msnd::ChunkKind;
use crate::msnd::error::{MsndError, MsndResult};
use binrw::{BinRead, BinWrite};

/// MSND magic bytes: "DSEQ"
pub const MAGIC_MSND: [u8; 4] = *b"DSEQ";

/// Fixed MSND header length
pub const HEADER_SIZE: usize = 48;

/// Bias added to the stored SSEQ offset
///
/// The stored SSEQ offset is always 16 larger than the real one. Observed in
/// every shipped file; preserved exactly on both read and write.
pub const SSEQ_OFFSET_BIAS: i32 = 16;

/// Byte range of the opaque trailer inside the header
pub const TRAILER_RANGE: std::ops::Range<usize> = 44..48;

/// MSND header (48 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MsndHeader {
    /// Magic bytes: "DSEQ"
    pub magic: [u8; 4],

    /// Bytes 4..16, not interpreted
    pub reserved: [u8; 12],

    /// SSEQ offset plus [`SSEQ_OFFSET_BIAS`]
    pub sseq_offset_biased: i32,

    /// SBNK offset
    pub sbnk_offset: i32,

    /// SWAR offset
    pub swar_offset: i32,

    /// Bytes 28..32, not interpreted
    pub reserved2: [u8; 4],

    /// SSEQ size
    pub sseq_size: i32,

    /// SBNK size
    pub sbnk_size: i32,

    /// SWAR size
    pub swar_size: i32,

    /// Opaque trailer at offset 44
    pub trailer: [u8; 4],
}

impl MsndHeader {
    /// Create a header for contiguous chunks of the given sizes
    ///
    /// Chunks are laid out directly after the header in SSEQ, SBNK, SWAR order.
    pub fn for_sizes(sizes: [usize; 3], trailer: [u8; 4]) -> MsndResult<Self> {
        let mut header = Self {
            magic: MAGIC_MSND,
            reserved: [0; 12],
            sseq_offset_biased: 0,
            sbnk_offset: 0,
            swar_offset: 0,
            reserved2: [0; 4],
            sseq_size: 0,
            sbnk_size: 0,
            swar_size: 0,
            trailer,
        };

        let mut offset = HEADER_SIZE;
        for kind in ChunkKind::ALL {
            let size = sizes[kind.index()];
            let end = offset
                .checked_add(size)
                .filter(|&end| i32::try_from(end).is_ok())
                .ok_or(MsndError::TooLarge { chunk: kind, size })?;
            header.set_chunk(kind, offset as i32, size as i32);
            offset = end;
        }

        Ok(header)
    }

    /// Real (de-biased) offset of a chunk
    pub fn chunk_offset(&self, kind: ChunkKind) -> i64 {
        match kind {
            ChunkKind::Sseq => i64::from(self.sseq_offset_biased) - i64::from(SSEQ_OFFSET_BIAS),
            ChunkKind::Sbnk => i64::from(self.sbnk_offset),
            ChunkKind::Swar => i64::from(self.swar_offset),
        }
    }

    /// Stored size of a chunk
    pub fn chunk_size(&self, kind: ChunkKind) -> i64 {
        match kind {
            ChunkKind::Sseq => i64::from(self.sseq_size),
            ChunkKind::Sbnk => i64::from(self.sbnk_size),
            ChunkKind::Swar => i64::from(self.swar_size),
        }
    }

    /// Set a chunk's real offset and size, applying the SSEQ bias
    pub fn set_chunk(&mut self, kind: ChunkKind, offset: i32, size: i32) {
        match kind {
            ChunkKind::Sseq => {
                self.sseq_offset_biased = offset + SSEQ_OFFSET_BIAS;
                self.sseq_size = size;
            }
            ChunkKind::Sbnk => {
                self.sbnk_offset = offset;
                self.sbnk_size = size;
            }
            ChunkKind::Swar => {
                self.swar_offset = offset;
                self.swar_size = size;
            }
        }
    }

    /// Check a chunk's declared range against the containing buffer length
    pub fn check_chunk_bounds(&self, kind: ChunkKind, len: usize) -> MsndResult<(u32, u32)> {
        let offset = self.chunk_offset(kind);
        let size = self.chunk_size(kind);

        if offset < 0 || size < 0 || offset + size > len as i64 {
            return Err(MsndError::OutOfBounds {
                chunk: kind,
                offset,
                size,
                len,
            });
        }

        Ok((offset as u32, size as u32))
    }

    /// Validate the magic
    pub fn validate(&self) -> MsndResult<()> {
        if self.magic != MAGIC_MSND {
            return Err(MsndError::NotMsnd(self.magic.to_vec()));
        }
        Ok(())
    }
}
