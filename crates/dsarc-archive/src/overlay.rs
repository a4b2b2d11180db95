//! Sparse-overlay save
//!
//! A save rebuilds the whole archive, but only entries the user actually
//! exported or edited need to exist in the source folder. Every other entry is
//! read straight out of the archive the session was opened from.
//!
//! DSARC entries resolve in this order:
//!
//! ```text
//! <source>/<name>                file next to the manifest
//! <source>/**/<name>             file anywhere below, ignoring case
//! <source>/<name>/               folder with mapper.txt or MSND parts, rebuilt
//! original[offset..offset+size]  untouched entry of the opened archive
//! ```
//!
//! MSND chunks resolve from the entry-named part file, then any file with the
//! chunk's extension below the source folder, then the original chunk. The
//! trailer comes from `<stem>.txt` or the original header.

use crate::context::OpContext;
use crate::error::{ArchiveError, ArchiveResult};
use crate::extract::TRAILER_EXTENSION;
use crate::files::{self, FileIndex};
use crate::mapping::NameMapping;
use crate::rebuild;
use dsarc_formats::msnd::{ChunkKind, MsndBuilder, MsndError, TRAILER_RANGE};
use dsarc_formats::{ArchiveKind, Entry, dsarc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything needed to write an archive back to disk
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Destination archive path
    pub path: PathBuf,
    /// Output format
    pub kind: ArchiveKind,
    /// Logical entries in table order
    pub entries: Vec<Entry>,
    /// Working folder holding exported or edited entries
    pub source_folder: PathBuf,
    /// Archive the entries were loaded from, if any
    pub original_path: Option<PathBuf>,
}

impl SaveRequest {
    /// Create a request without an original archive
    pub fn new(
        path: impl Into<PathBuf>,
        kind: ArchiveKind,
        entries: Vec<Entry>,
        source_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            entries,
            source_folder: source_folder.into(),
            original_path: None,
        }
    }

    /// Fall back to slices of `original` for untouched entries
    #[must_use]
    pub fn with_original(mut self, original: impl Into<PathBuf>) -> Self {
        self.original_path = Some(original.into());
        self
    }
}

/// Outcome of resolving one entry's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Found(Vec<u8>),
    NotFound,
}

/// Build the archive described by `request` and write it in one piece
///
/// Returns the number of bytes written.
pub fn save_archive(
    request: &SaveRequest,
    fallback_to_original: bool,
    ctx: &OpContext,
) -> ArchiveResult<usize> {
    ctx.checkpoint()?;
    if request.entries.is_empty() {
        return Err(ArchiveError::NoEntries);
    }

    let original = request
        .original_path
        .as_deref()
        .filter(|path| fallback_to_original && path.is_file());

    info!(
        "Saving {} {} ({} entries) from {}",
        request.kind,
        request.path.display(),
        request.entries.len(),
        request.source_folder.display()
    );

    let data = match request.kind {
        ArchiveKind::Dsarc => build_dsarc(request, original, ctx)?,
        ArchiveKind::Msnd => build_msnd(request, original, ctx)?,
    };

    ctx.checkpoint()?;
    files::write_file(&request.path, &data)?;
    info!("Saved {} ({} bytes)", request.path.display(), data.len());
    Ok(data.len())
}

struct Overlay<'a> {
    folder: &'a Path,
    index: FileIndex,
    entries: &'a [Entry],
    original: Option<&'a Path>,
    ctx: &'a OpContext,
}

impl<'a> Overlay<'a> {
    fn new(request: &'a SaveRequest, original: Option<&'a Path>, ctx: &'a OpContext) -> Self {
        Self {
            folder: &request.source_folder,
            index: FileIndex::build(&request.source_folder),
            entries: &request.entries,
            original,
            ctx,
        }
    }

    /// Resolve the bytes for entry `key`, stored on disk as `file_name`
    ///
    /// `position` is the entry's table index when known; it disambiguates
    /// duplicate names when falling back to the original archive.
    fn resolve(
        &self,
        key: &str,
        file_name: &str,
        position: usize,
    ) -> ArchiveResult<Resolution> {
        let direct = self.folder.join(file_name);
        if direct.is_file() {
            debug!("{} <- {}", key, direct.display());
            return Ok(Resolution::Found(std::fs::read(direct)?));
        }

        if let Some(path) = self.index.get(files::name_of(Path::new(file_name)).as_str()) {
            debug!("{} <- {}", key, path.display());
            return Ok(Resolution::Found(std::fs::read(path)?));
        }

        if direct.is_dir() && (NameMapping::exists_in(&direct) || files::has_msnd_parts(&direct)) {
            debug!("{} <- rebuild of {}", key, direct.display());
            return Ok(Resolution::Found(rebuild::rebuild_from_folder(
                &direct, self.ctx,
            )?));
        }

        Ok(self.from_original(key, position))
    }

    fn from_original(&self, key: &str, position: usize) -> Resolution {
        let Some(original) = self.original else {
            return Resolution::NotFound;
        };

        let matches = |entry: &&Entry| {
            entry.name.eq_ignore_ascii_case(key) || entry.file_name().eq_ignore_ascii_case(key)
        };
        let entry = self
            .entries
            .get(position)
            .filter(matches)
            .or_else(|| self.entries.iter().find(matches));

        // Offset zero marks an entry that never came from an archive
        let Some(entry) = entry.filter(|e| e.offset > 0) else {
            return Resolution::NotFound;
        };

        match files::read_range(original, u64::from(entry.offset), entry.size as usize) {
            Ok(data) if data.len() == entry.size as usize => {
                debug!("{} <- original at {:#x}", key, entry.offset);
                Resolution::Found(data)
            }
            Ok(data) => {
                warn!(
                    "Original entry {} truncated: read {} of {} bytes",
                    key,
                    data.len(),
                    entry.size
                );
                Resolution::NotFound
            }
            Err(err) => {
                warn!("Failed to read original entry {}: {}", key, err);
                Resolution::NotFound
            }
        }
    }
}

fn build_dsarc(
    request: &SaveRequest,
    original: Option<&Path>,
    ctx: &OpContext,
) -> ArchiveResult<Vec<u8>> {
    let overlay = Overlay::new(request, original, ctx);
    let pairs = match NameMapping::read_from(&request.source_folder)? {
        Some(mapping) => pairs_from_mapping(&overlay, &mapping)?,
        None => pairs_from_entries(&overlay)?,
    };
    Ok(dsarc::build_from_pairs_with(&pairs, ctx.observer())?)
}

fn pairs_from_mapping(
    overlay: &Overlay<'_>,
    mapping: &NameMapping,
) -> ArchiveResult<Vec<(String, Vec<u8>)>> {
    let mut pairs = Vec::with_capacity(mapping.len());
    let mut missing = Vec::new();

    for (index, pair) in mapping.iter().enumerate() {
        overlay.ctx.checkpoint()?;
        match overlay.resolve(&pair.original, &pair.extracted, index)? {
            Resolution::Found(data) => pairs.push((pair.original.clone(), data)),
            Resolution::NotFound => missing.push(pair.extracted.clone()),
        }
        overlay.ctx.report(index + 1, mapping.len());
    }

    if missing.is_empty() {
        Ok(pairs)
    } else {
        Err(ArchiveError::MissingFiles(missing))
    }
}

fn pairs_from_entries(overlay: &Overlay<'_>) -> ArchiveResult<Vec<(String, Vec<u8>)>> {
    let total = overlay.entries.len();
    let mut pairs = Vec::with_capacity(total);

    for (index, entry) in overlay.entries.iter().enumerate() {
        overlay.ctx.checkpoint()?;
        match overlay.resolve(&entry.name, entry.file_name(), index)? {
            Resolution::Found(data) => pairs.push((entry.name.clone(), data)),
            Resolution::NotFound => return Err(ArchiveError::MissingSource(entry.name.clone())),
        }
        overlay.ctx.report(index + 1, total);
    }

    Ok(pairs)
}

fn build_msnd(
    request: &SaveRequest,
    original: Option<&Path>,
    ctx: &OpContext,
) -> ArchiveResult<Vec<u8>> {
    let folder = request.source_folder.as_path();
    let mut builder = MsndBuilder::new();

    for kind in ChunkKind::ALL {
        ctx.checkpoint()?;
        let entry = request
            .entries
            .iter()
            .find(|e| files::has_extension(Path::new(&e.name), kind.extension()));

        let data = match msnd_part_path(folder, entry, kind) {
            Some(path) => {
                debug!("{} <- {}", kind, path.display());
                std::fs::read(path)?
            }
            None => original_chunk(original, entry, kind)?,
        };
        builder = builder.chunk(kind, data);
        ctx.report(kind.index() + 1, ChunkKind::ALL.len());
    }

    let trailer = msnd_trailer(request, original);
    Ok(builder.trailer_bytes(trailer.as_deref()).build()?)
}

fn msnd_part_path(folder: &Path, entry: Option<&Entry>, kind: ChunkKind) -> Option<PathBuf> {
    entry
        .map(|e| folder.join(e.file_name()))
        .filter(|path| path.is_file())
        .or_else(|| files::first_with_extension(folder, kind.extension(), true))
}

fn original_chunk(
    original: Option<&Path>,
    entry: Option<&Entry>,
    kind: ChunkKind,
) -> ArchiveResult<Vec<u8>> {
    let (Some(original), Some(entry)) = (original, entry.filter(|e| e.offset > 0)) else {
        return Err(MsndError::MissingChunk(kind).into());
    };

    match files::read_range(original, u64::from(entry.offset), entry.size as usize) {
        Ok(data) if data.len() == entry.size as usize => {
            debug!("{} <- original at {:#x}", kind, entry.offset);
            Ok(data)
        }
        Ok(_) => Err(MsndError::MissingChunk(kind).into()),
        Err(err) => {
            warn!("Failed to read original {} chunk: {}", kind, err);
            Err(MsndError::MissingChunk(kind).into())
        }
    }
}

fn msnd_trailer(request: &SaveRequest, original: Option<&Path>) -> Option<Vec<u8>> {
    let folder = request.source_folder.as_path();
    let candidates = request
        .entries
        .first()
        .map(|e| e.stem().to_string())
        .into_iter()
        .chain(std::iter::once(files::stem_of(&request.path)));

    for stem in candidates {
        let path = folder.join(format!("{stem}{TRAILER_EXTENSION}"));
        if path.is_file() {
            match std::fs::read(&path) {
                Ok(data) => return Some(data),
                Err(err) => warn!("Failed to read trailer {}: {}", path.display(), err),
            }
        }
    }

    let original = original?;
    let len = TRAILER_RANGE.end - TRAILER_RANGE.start;
    match files::read_range(original, TRAILER_RANGE.start as u64, len) {
        Ok(data) if data.len() == len => Some(data),
        Ok(_) => None,
        Err(err) => {
            warn!("Failed to read original trailer: {}", err);
            None
        }
    }
}
