//! Extraction, rebuild and save engine for DSARC and MSND archives.
//!
//! This crate turns containers into editable folder trees and back:
//!
//! - **Extraction**: writes every entry to disk with a `mapper.txt` manifest
//!   (DSARC) or a `<base>.txt` trailer sidecar (MSND), optionally unpacking
//!   embedded containers into child folders
//! - **Rebuild**: inverts extraction, producing the container bytes a folder
//!   describes
//! - **Overlay save**: writes an archive from a partially exported folder,
//!   reading untouched entries from the archive it was opened from
//! - **Import**: infers the archive a folder would become without writing it
//!
//! # Folder Layout
//!
//! ```text
//! pack/                  extraction of pack.dsarc
//! ├── mapper.txt         "se_001.bin=se_001.swav" ... in table order
//! ├── se_001.swav
//! └── title/             embedded MSND unpacked in place of title.msnd
//!     ├── title.sseq
//!     ├── title.sbnk
//!     ├── title.swar
//!     └── title.txt      4-byte header trailer
//! ```
//!
//! All long-running calls go through [`ArchiveService`], which runs each
//! operation on a blocking worker and settles it into an [`Outcome`].
//! [`ArchiveSession`] adds the open archive, the working source folder and
//! cancel-previous-on-start semantics on top.
//!
//! # Example
//!
//! ```rust,ignore
//! use dsarc_archive::{ArchiveService, OpContext, ServiceConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ArchiveService::new(ServiceConfig::default().with_nested_extraction(true));
//! let loaded = service
//!     .load_archive("sound.dat", OpContext::default())
//!     .await?
//!     .into_result()?;
//!
//! let summary = service
//!     .extract_all(&loaded.path, loaded.kind, "out", OpContext::default())
//!     .await?
//!     .into_result()?;
//! println!("extracted to {}", summary.out_dir.display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)] // u32 entry fields widen to usize
#![allow(clippy::uninlined_format_args)]

// Cancellation tokens and outcomes
pub mod cancel;

// Service configuration
pub mod config;

// Per-operation cancellation and progress
pub mod context;

// Error types
pub mod error;

// Extraction engine
pub mod extract;

// File system helpers
pub mod files;

// Folder inspection for import
pub mod import;

// mapper.txt manifest
pub mod mapping;

// Collision-free output names
pub mod naming;

// Sparse-overlay save
pub mod overlay;

// Rebuild engine
pub mod rebuild;

// Async service facade
pub mod service;

// Editing session
pub mod session;

pub use cancel::{CancellationToken, Outcome};
pub use config::ServiceConfig;
pub use context::{NoProgress, OpContext, Progress};
pub use error::{ArchiveError, ArchiveResult, ErrorKind};
pub use extract::ExtractSummary;
pub use import::ImportResult;
pub use mapping::{MAPPING_FILE_NAME, MappingPair, NameMapping};
pub use naming::UniqueNamer;
pub use overlay::SaveRequest;
pub use service::{ArchiveService, LoadedArchive};
pub use session::{ArchiveSession, EntryId, OpenedArchive, SessionCanceller};
