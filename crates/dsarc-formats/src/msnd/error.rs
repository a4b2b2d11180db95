//! MSND error types

use crate::msnd::ChunkKind;
use thiserror::Error;

/// MSND-specific error type
#[derive(Debug, Error)]
pub enum MsndError {
    /// Leading bytes are not the MSND magic
    #[error("not an MSND container: expected [44 53 45 51], got {0:02X?}")]
    NotMsnd(Vec<u8>),

    /// Buffer is shorter than the fixed header
    #[error("MSND too small: {0} bytes, header needs 48")]
    TooSmall(usize),

    /// A chunk's declared range leaves the buffer
    #[error("{chunk} chunk exceeds bounds: offset {offset}, size {size}, buffer {len} bytes")]
    OutOfBounds {
        /// Offending chunk
        chunk: ChunkKind,
        /// De-biased offset as stored
        offset: i64,
        /// Size as stored
        size: i64,
        /// Length of the containing buffer
        len: usize,
    },

    /// One of the three required chunks was not supplied
    #[error("missing {} chunk", .0.extension())]
    MissingChunk(ChunkKind),

    /// Two keys name the same chunk, e.g. `.SSEQ` and `.sseq`
    #[error("{} chunk supplied more than once", .0.extension())]
    DuplicateChunk(ChunkKind),

    /// Extension does not name an MSND chunk
    #[error("unsupported chunk extension: {0:?}")]
    UnsupportedExtension(String),

    /// Chunk layout does not fit the 32-bit header fields
    #[error("{chunk} chunk too large: {size} bytes")]
    TooLarge {
        /// Offending chunk
        chunk: ChunkKind,
        /// Chunk length in bytes
        size: usize,
    },

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for MSND operations
pub type MsndResult<T> = Result<T, MsndError>;
