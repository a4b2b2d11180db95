//! Parsers and builders for the DSARC and MSND container formats
//!
#![allow(clippy::cast_possible_wrap)] // Intentional for binary format fields
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides symmetric (parser and builder) implementations for the
//! two binary containers used by the game's asset packaging:
//!
//! - **DSARC**: a named-entry archive (magic `DSARC FL`) holding any number of
//!   payloads described by a fixed 48-byte record table
//! - **MSND**: a sound container (magic `DSEQ`) that always holds exactly three
//!   chunks (SSEQ, SBNK, SWAR) behind a 48-byte header
//!
//! A DSARC entry may itself be an MSND buffer. Parsing a DSARC sniffs every
//! entry for the MSND magic and decodes matching entries into three children.
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Offsets, not copies**: Parsed entries describe byte ranges of the
//!   containing buffer; callers slice the payloads they need
//! - **Strict bounds**: Every declared range is checked against the
//!   containing buffer before any payload is touched
//! - **Round-Trip Guarantee**: parse(build(data)) == data
//!
//! # Example
//!
//! ```rust
//! use dsarc_formats::dsarc::{self, DsarcBuilder};
//!
//! let mut builder = DsarcBuilder::new();
//! builder.add("hello.bin", b"world".to_vec());
//! let data = builder.build()?;
//!
//! let entries = dsarc::parse(&data)?;
//! assert_eq!(entries[0].name, "hello.bin");
//! assert_eq!(entries[0].offset, 64);
//! assert_eq!(entries[0].slice(&data), Some(&b"world"[..]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

/// Magic-number classification of files and buffers
pub mod detect;
/// DSARC named-entry archive format
///
/// Layout: 16-byte header (`DSARC FL`, entry count, version), one 48-byte
/// record per entry (40-byte NUL-padded name, size, offset), then the
/// payloads at their declared offsets.
pub mod dsarc;
mod entry;
/// MSND three-chunk sound container format
///
/// Layout: 48-byte header with the chunk offset/size table and a 4-byte
/// opaque trailer, followed by the SSEQ, SBNK and SWAR payloads.
pub mod msnd;
/// Fixed-width name encoding and payload extension sniffing
pub mod names;

pub use detect::{ArchiveKind, ContainerKind, DetectError};
pub use entry::Entry;
pub use msnd::ChunkKind;

/// Common format trait for containers that can be parsed from and built to bytes
pub trait ContainerFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
