//! Folder inspection for import
//!
//! Decides which archive a folder would become and lists its entries without
//! writing anything. The resulting entries carry no archive offsets, so a
//! later save always reads them from the folder.

use crate::context::OpContext;
use crate::error::{ArchiveError, ArchiveResult};
use crate::files;
use crate::mapping::{MAPPING_FILE_NAME, NameMapping};
use crate::rebuild;
use dsarc_formats::msnd::{self, ChunkKind, MsndError};
use dsarc_formats::{ArchiveKind, ContainerKind, Entry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Archive shape inferred from a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    /// Archive kind the folder would be saved as
    pub kind: ArchiveKind,
    /// Entries in save order
    pub entries: Vec<Entry>,
    /// Folder that was inspected
    pub source_folder: PathBuf,
}

/// Inspect `folder` and describe the archive it holds
///
/// - A `mapper.txt` makes a DSARC with one entry per manifest line
/// - Exactly the three MSND part extensions, or one stem with all three
///   parts, makes an MSND
/// - Anything else makes a DSARC of the top-level files and folders
///
/// Subfolders are rebuilt to find embedded MSND payloads. A subfolder that
/// fails to rebuild still becomes an entry, just without children.
pub fn inspect_folder(folder: &Path, ctx: &OpContext) -> ArchiveResult<ImportResult> {
    ctx.checkpoint()?;
    if !folder.is_dir() {
        return Err(ArchiveError::NotADirectory(folder.to_path_buf()));
    }

    let (kind, entries) = match NameMapping::read_from(folder)? {
        Some(mapping) => (ArchiveKind::Dsarc, entries_from_mapping(folder, &mapping, ctx)?),
        None => entries_from_contents(folder, ctx)?,
    };

    info!(
        "Inspected {}: {} with {} entries",
        folder.display(),
        kind,
        entries.len()
    );

    Ok(ImportResult {
        kind,
        entries,
        source_folder: folder.to_path_buf(),
    })
}

fn entries_from_mapping(
    folder: &Path,
    mapping: &NameMapping,
    ctx: &OpContext,
) -> ArchiveResult<Vec<Entry>> {
    let mut entries = Vec::with_capacity(mapping.len());
    for pair in mapping {
        ctx.checkpoint()?;
        let candidate = folder.join(&pair.extracted);
        let entry = if candidate.is_dir() {
            entry_from_directory(&pair.original, &candidate, ctx)?
        } else {
            Entry::new(pair.original.as_str(), file_size(&candidate), 0)
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn entries_from_contents(
    folder: &Path,
    ctx: &OpContext,
) -> ArchiveResult<(ArchiveKind, Vec<Entry>)> {
    let all_files: Vec<PathBuf> = files::files_recursive(folder)
        .into_iter()
        .filter(|p| !files::name_of(p).eq_ignore_ascii_case(MAPPING_FILE_NAME))
        .collect();

    if looks_like_msnd(&all_files) {
        let mut entries = Vec::with_capacity(ChunkKind::ALL.len());
        for kind in ChunkKind::ALL {
            ctx.checkpoint()?;
            let part = all_files
                .iter()
                .find(|p| files::has_extension(p, kind.extension()))
                .ok_or(MsndError::MissingChunk(kind))?;
            entries.push(Entry::new(files::name_of(part), file_size(part), 0));
        }
        return Ok((ArchiveKind::Msnd, entries));
    }

    let mut entries = Vec::new();
    for item in files::children_top_level(folder) {
        ctx.checkpoint()?;
        let name = files::name_of(&item);
        if name.eq_ignore_ascii_case(MAPPING_FILE_NAME) {
            continue;
        }
        let entry = if item.is_dir() {
            entry_from_directory(&name, &item, ctx)?
        } else {
            Entry::new(name, file_size(&item), 0)
        };
        entries.push(entry);
    }
    Ok((ArchiveKind::Dsarc, entries))
}

/// One stem carrying all three parts, or an extension set of exactly the parts
fn looks_like_msnd(all_files: &[PathBuf]) -> bool {
    let stems: HashSet<String> = all_files.iter().map(|p| files::stem_of(p)).collect();
    let exts: HashSet<String> = all_files
        .iter()
        .map(|p| files::extension_of(p).to_ascii_lowercase())
        .collect();
    let parts: HashSet<String> = ChunkKind::ALL
        .iter()
        .map(|kind| kind.extension().to_string())
        .collect();

    (stems.len() == 1 && parts.is_subset(&exts)) || exts == parts
}

fn entry_from_directory(name: &str, directory: &Path, ctx: &OpContext) -> ArchiveResult<Entry> {
    match rebuild::rebuild_from_folder(directory, ctx) {
        Ok(buffer) => {
            let size = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
            if ContainerKind::of(&buffer) != ContainerKind::Msnd {
                return Ok(Entry::new(name, size, 0));
            }
            let stem = dsarc_formats::names::split_name(name).0;
            match msnd::parse(&buffer, stem) {
                Ok(children) => Ok(Entry::with_children(name, size, 0, children)),
                Err(err) => {
                    debug!("{} rebuilt to an unreadable MSND: {}", name, err);
                    Ok(Entry::new(name, size, 0))
                }
            }
        }
        Err(err) if err.is_cancelled() => Err(err),
        Err(err) => {
            debug!("{} could not be rebuilt: {}", directory.display(), err);
            Ok(Entry::new(name, 0, 0))
        }
    }
}

fn file_size(path: &Path) -> u32 {
    std::fs::metadata(path)
        .ok()
        .filter(std::fs::Metadata::is_file)
        .and_then(|m| u32::try_from(m.len()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(path: &Path, data: &[u8]) {
        files::write_file(path, data).expect("write");
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_mapping_folder_is_dsarc() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("mapper.txt"), b"a.bin=a.bin\nsong.msnd=song\nlost.bin=lost.bin");
        write(&dir.path().join("a.bin"), b"abc");
        write(&dir.path().join("song").join("song.sseq"), b"s");
        write(&dir.path().join("song").join("song.sbnk"), b"b");
        write(&dir.path().join("song").join("song.swar"), b"w");

        let result = inspect_folder(dir.path(), &OpContext::default()).expect("inspect");
        assert_eq!(result.kind, ArchiveKind::Dsarc);
        assert_eq!(names(&result.entries), ["a.bin", "song.msnd", "lost.bin"]);
        assert_eq!(result.entries[0].size, 3);
        assert_eq!(result.entries[2].size, 0);

        let song = &result.entries[1];
        assert!(song.is_embedded_container);
        assert_eq!(names(&song.children), ["song.sseq", "song.sbnk", "song.swar"]);
    }

    #[test]
    fn test_three_parts_is_msnd() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("bgm.sseq"), b"s");
        write(&dir.path().join("bgm.sbnk"), b"b");
        write(&dir.path().join("bgm.swar"), b"w");
        write(&dir.path().join("bgm.txt"), b"\0\0\0\0");

        let result = inspect_folder(dir.path(), &OpContext::default()).expect("inspect");
        assert_eq!(result.kind, ArchiveKind::Msnd);
        assert_eq!(names(&result.entries), ["bgm.sseq", "bgm.sbnk", "bgm.swar"]);
    }

    #[test]
    fn test_loose_files_are_dsarc() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("one.bin"), b"1");
        write(&dir.path().join("two.swav"), b"SWAV");
        write(&dir.path().join("broken").join("x.bin"), b"x");
        write(&dir.path().join("broken").join("y.bin"), b"y");

        let result = inspect_folder(dir.path(), &OpContext::default()).expect("inspect");
        assert_eq!(result.kind, ArchiveKind::Dsarc);
        assert_eq!(names(&result.entries), ["broken", "one.bin", "two.swav"]);
        assert!(result.entries[0].children.is_empty());
        assert!(!result.entries[0].is_embedded_container);
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let err = inspect_folder(&dir.path().join("nope"), &OpContext::default())
            .expect_err("must fail");
        assert!(matches!(err, ArchiveError::NotADirectory(_)));
    }

    #[test]
    fn test_cancelled_inspection() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let ctx = OpContext::default();
        ctx.token().cancel();
        let err = inspect_folder(dir.path(), &ctx).expect_err("must fail");
        assert!(err.is_cancelled());
    }
}
