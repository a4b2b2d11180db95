//! DSARC error types

use crate::msnd::MsndError;
use thiserror::Error;

/// DSARC-specific error type
#[derive(Debug, Error)]
pub enum DsarcError {
    /// Leading bytes are not the DSARC magic
    #[error("not a DSARC archive: expected \"DSARC FL\", got {0:02X?}")]
    NotDsarc(Vec<u8>),

    /// Source ends inside the 16-byte header
    #[error("DSARC header truncated: {0} bytes, need 16")]
    TruncatedHeader(u64),

    /// Version field is not the supported value
    #[error("unsupported DSARC version {0}")]
    UnsupportedVersion(i32),

    /// Entry count is negative
    #[error("invalid DSARC entry count {0}")]
    InvalidCount(i32),

    /// Record table runs past the end of the source
    #[error("DSARC entry table truncated: {count} records need {needed} bytes, source has {len}")]
    TruncatedTable {
        /// Declared record count
        count: usize,
        /// Bytes required for header plus table
        needed: u64,
        /// Source length
        len: u64,
    },

    /// An entry's declared range leaves the archive
    #[error("{name} exceeds bounds: offset {offset}, size {size}, archive {len} bytes")]
    EntryOutOfBounds {
        /// Decoded entry name
        name: String,
        /// Offset as stored
        offset: i64,
        /// Size as stored
        size: i64,
        /// Archive length
        len: u64,
    },

    /// An entry carries the MSND magic but does not decode as MSND
    #[error("embedded MSND {name} is invalid: {source}")]
    EmbeddedMsnd {
        /// Entry name
        name: String,
        /// Underlying MSND failure
        #[source]
        source: MsndError,
    },

    /// Archive layout does not fit the 32-bit header fields
    #[error("DSARC too large: {0}")]
    TooLarge(String),

    /// Record observer asked to stop
    #[error("DSARC processing interrupted at record {index}")]
    Interrupted {
        /// Record about to be processed
        index: usize,
    },

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for DSARC operations
pub type DsarcResult<T> = Result<T, DsarcError>;
