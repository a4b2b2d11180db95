//! Error types for archive operations

use dsarc_formats::DetectError;
use dsarc_formats::dsarc::DsarcError;
use dsarc_formats::msnd::MsndError;
use std::path::PathBuf;
use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by extraction, rebuild, save and import
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Container type could not be detected
    #[error(transparent)]
    Detect(#[from] DetectError),

    /// DSARC codec failure
    #[error(transparent)]
    Dsarc(#[from] DsarcError),

    /// MSND codec failure
    #[error(transparent)]
    Msnd(#[from] MsndError),

    /// No resolution priority produced bytes for an entry
    #[error("missing source for: {0}")]
    MissingSource(String),

    /// Mapping-driven save could not resolve one or more entries
    #[error("missing files:\n{}", .0.join("\n"))]
    MissingFiles(Vec<String>),

    /// Folder contents match no rebuild rule
    #[error("cannot determine archive type at {}", .0.display())]
    AmbiguousContainerType(PathBuf),

    /// Path expected to be a directory is not one
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Save was asked to write an archive with no entries
    #[error("no entries to save")]
    NoEntries,

    /// Entry address does not exist in the opened archive
    #[error("no entry at index {entry}{}", .chunk.map(|c| format!(", chunk {c}")).unwrap_or_default())]
    UnknownEntry {
        /// Top-level entry index
        entry: usize,
        /// Chunk index inside an embedded MSND
        chunk: Option<usize>,
    },

    /// Operation needs an opened archive
    #[error("no archive is open")]
    NoArchive,

    /// Archive has never been written to or read from a path
    #[error("archive has no file path; save it under a new name first")]
    NoArchivePath,

    /// Operation needs a working source folder and none could be chosen
    #[error("no source folder selected")]
    NoSourceFolder,

    /// Entry is not an embedded container
    #[error("{0} is not an embedded archive")]
    NotEmbeddedContainer(String),

    /// Cooperative cancellation observed
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be decoded
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Background worker panicked or was aborted
    #[error("background task failed: {0}")]
    Task(String),
}

/// Coarse error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing magic, wrong version, truncated header
    Format,
    /// Declared offset/size exceeds the containing buffer
    Bounds,
    /// MSND build or replace lacks one of the three chunks
    MissingChunk,
    /// Bytes for a named entry could not be located
    MissingSource,
    /// Folder contents do not indicate MSND, DSARC or single file
    AmbiguousContainerType,
    /// File system or worker failure
    Io,
    /// Cooperative cancellation
    Cancelled,
}

impl ArchiveError {
    /// Map this error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Detect(DetectError::Io(_)) | Self::Io(_) | Self::Task(_) => ErrorKind::Io,
            Self::Detect(_) | Self::Config(_) | Self::NoEntries | Self::NoArchive => {
                ErrorKind::Format
            }
            Self::Dsarc(err) => match err {
                DsarcError::EntryOutOfBounds { .. } => ErrorKind::Bounds,
                DsarcError::EmbeddedMsnd { source, .. } => msnd_kind(source),
                DsarcError::Interrupted { .. } => ErrorKind::Cancelled,
                DsarcError::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Format,
            },
            Self::Msnd(err) => msnd_kind(err),
            Self::MissingSource(_)
            | Self::MissingFiles(_)
            | Self::UnknownEntry { .. }
            | Self::NoArchivePath
            | Self::NoSourceFolder => ErrorKind::MissingSource,
            Self::NotEmbeddedContainer(_) => ErrorKind::Format,
            Self::AmbiguousContainerType(_) => ErrorKind::AmbiguousContainerType,
            Self::NotADirectory(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this error represents cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

fn msnd_kind(err: &MsndError) -> ErrorKind {
    match err {
        MsndError::OutOfBounds { .. } => ErrorKind::Bounds,
        MsndError::MissingChunk(_) => ErrorKind::MissingChunk,
        _ => ErrorKind::Format,
    }
}
