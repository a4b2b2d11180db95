//! Container detection by leading magic bytes

use crate::dsarc::MAGIC_DSARC;
use crate::msnd::MAGIC_MSND;
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while classifying a file header
#[derive(Debug, Error)]
pub enum DetectError {
    /// Fewer than four bytes could be read
    #[error("unable to read file header: got {0} bytes, need at least 4")]
    TruncatedHeader(usize),

    /// The header matches neither container magic
    #[error("unknown archive format (magic mismatch): {0:02X?}")]
    UnknownFormat(Vec<u8>),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of a recognized container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Named-entry archive
    Dsarc,
    /// Three-chunk sound container
    Msnd,
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dsarc => f.write_str("DSARC"),
            Self::Msnd => f.write_str("MSND"),
        }
    }
}

/// Classification of an arbitrary in-memory payload
///
/// Unlike [`detect`], classifying a buffer never fails: anything that is not
/// a container is simply `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Not a recognized container
    Unknown,
    /// Starts with the DSARC magic
    Dsarc,
    /// Starts with the MSND magic
    Msnd,
}

impl ContainerKind {
    /// Classify a buffer by its leading bytes
    ///
    /// The MSND check runs first, so a buffer whose first four bytes are
    /// `DSEQ` is MSND regardless of what follows.
    pub fn of(data: &[u8]) -> Self {
        if data.starts_with(&MAGIC_MSND) {
            Self::Msnd
        } else if data.starts_with(&MAGIC_DSARC) {
            Self::Dsarc
        } else {
            Self::Unknown
        }
    }

    /// Recognized archive kind, if any
    pub fn archive_kind(self) -> Option<ArchiveKind> {
        match self {
            Self::Unknown => None,
            Self::Dsarc => Some(ArchiveKind::Dsarc),
            Self::Msnd => Some(ArchiveKind::Msnd),
        }
    }

    /// Whether the payload is a container of either kind
    pub fn is_container(self) -> bool {
        self != Self::Unknown
    }
}

/// Classify a byte source by reading up to eight bytes
///
/// # Errors
///
/// Returns [`DetectError::TruncatedHeader`] when fewer than four bytes are
/// available and [`DetectError::UnknownFormat`] when no magic matches.
pub fn detect<R: Read>(reader: R) -> Result<ArchiveKind, DetectError> {
    let mut header = Vec::with_capacity(MAGIC_DSARC.len());
    reader
        .take(MAGIC_DSARC.len() as u64)
        .read_to_end(&mut header)?;
    detect_bytes(&header)
}

/// Classify a file on disk
pub fn detect_file<P: AsRef<Path>>(path: P) -> Result<ArchiveKind, DetectError> {
    let file = std::fs::File::open(path)?;
    detect(file)
}

/// Classify the leading bytes of a buffer
pub fn detect_bytes(data: &[u8]) -> Result<ArchiveKind, DetectError> {
    let header = &data[..data.len().min(MAGIC_DSARC.len())];
    if header.len() < MAGIC_MSND.len() {
        return Err(DetectError::TruncatedHeader(header.len()));
    }

    ContainerKind::of(header)
        .archive_kind()
        .ok_or_else(|| DetectError::UnknownFormat(header.to_vec()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_msnd() {
        let kind = detect(Cursor::new(b"DSEQ\0\0\0\0rest")).expect("should detect");
        assert_eq!(kind, ArchiveKind::Msnd);
    }

    #[test]
    fn test_detect_msnd_with_short_source() {
        // Only the four MSND bytes are needed
        assert_eq!(detect_bytes(b"DSEQ").unwrap(), ArchiveKind::Msnd);
    }

    #[test]
    fn test_detect_msnd_wins_over_partial_dsarc() {
        assert_eq!(detect_bytes(b"DSEQC FL").unwrap(), ArchiveKind::Msnd);
    }

    #[test]
    fn test_detect_dsarc() {
        let kind = detect(Cursor::new(b"DSARC FL\x01\0\0\0")).expect("should detect");
        assert_eq!(kind, ArchiveKind::Dsarc);
    }

    #[test]
    fn test_detect_truncated() {
        assert!(matches!(
            detect_bytes(b"DSE"),
            Err(DetectError::TruncatedHeader(3))
        ));
        assert!(matches!(
            detect(Cursor::new(Vec::new())),
            Err(DetectError::TruncatedHeader(0))
        ));
    }

    #[test]
    fn test_detect_unknown() {
        assert!(matches!(
            detect_bytes(b"RIFF\0\0\0\0"),
            Err(DetectError::UnknownFormat(_))
        ));
        // Partial DSARC magic is not enough
        assert!(matches!(
            detect_bytes(b"DSARC"),
            Err(DetectError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_container_kind() {
        assert_eq!(ContainerKind::of(b"DSEQ"), ContainerKind::Msnd);
        assert_eq!(ContainerKind::of(b"DSARC FL"), ContainerKind::Dsarc);
        assert_eq!(ContainerKind::of(b"DSARC"), ContainerKind::Unknown);
        assert_eq!(ContainerKind::of(b""), ContainerKind::Unknown);
        assert!(!ContainerKind::Unknown.is_container());
        assert_eq!(
            ContainerKind::Dsarc.archive_kind(),
            Some(ArchiveKind::Dsarc)
        );
    }
}
