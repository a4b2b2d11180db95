//! Rebuild engine: folder tree back into container bytes
//!
//! The folder decides the output format:
//!
//! 1. `mapper.txt` present: DSARC built from the manifest pairs, recursing
//!    into any mapped subfolder
//! 2. any `.sseq`/`.sbnk`/`.swar` file present: MSND built from the three
//!    parts plus the optional `<folder>.txt` trailer
//! 3. exactly one file: its bytes unchanged
//! 4. anything else: [`ArchiveError::AmbiguousContainerType`]

use crate::context::OpContext;
use crate::error::{ArchiveError, ArchiveResult};
use crate::extract::TRAILER_EXTENSION;
use crate::files;
use crate::mapping::NameMapping;
use dsarc_formats::dsarc;
use dsarc_formats::msnd::{ChunkKind, MsndBuilder, MsndError};
use std::path::Path;
use tracing::debug;

/// Rebuild whatever container `folder` describes
pub fn rebuild_from_folder(folder: &Path, ctx: &OpContext) -> ArchiveResult<Vec<u8>> {
    ctx.checkpoint()?;
    if !folder.is_dir() {
        return Err(ArchiveError::NotADirectory(folder.to_path_buf()));
    }

    match NameMapping::read_from(folder)? {
        Some(mapping) => build_dsarc_from_mapping(folder, &mapping, ctx),
        None => build_from_contents(folder, ctx),
    }
}

/// Build a DSARC from `folder/mapper.txt`
pub fn build_dsarc_from_folder(folder: &Path, ctx: &OpContext) -> ArchiveResult<Vec<u8>> {
    ctx.checkpoint()?;
    let mapping = NameMapping::read_from(folder)?.ok_or_else(|| {
        ArchiveError::MissingSource(NameMapping::path_in(folder).display().to_string())
    })?;
    build_dsarc_from_mapping(folder, &mapping, ctx)
}

/// Build an MSND from the part files in `folder`
///
/// For each chunk the file named `<folder name>.<ext>` is preferred, otherwise
/// the first file with that extension. `<folder name>.txt` supplies the
/// trailer when present.
pub fn build_msnd_from_folder(folder: &Path, ctx: &OpContext) -> ArchiveResult<Vec<u8>> {
    ctx.checkpoint()?;
    if !folder.is_dir() {
        return Err(ArchiveError::NotADirectory(folder.to_path_buf()));
    }

    let base = files::name_of(folder);
    let mut builder = MsndBuilder::new();
    for kind in ChunkKind::ALL {
        ctx.checkpoint()?;
        let exact = folder.join(format!("{base}{}", kind.extension()));
        let chosen = if exact.is_file() {
            exact
        } else {
            files::first_with_extension(folder, kind.extension(), false)
                .ok_or(MsndError::MissingChunk(kind))?
        };
        debug!("{} chunk from {}", kind, chosen.display());
        builder = builder.chunk(kind, std::fs::read(&chosen)?);
    }

    let trailer_path = folder.join(format!("{base}{TRAILER_EXTENSION}"));
    if trailer_path.is_file() {
        let trailer = std::fs::read(&trailer_path)?;
        builder = builder.trailer_bytes(Some(&trailer));
    }

    Ok(builder.build()?)
}

fn build_dsarc_from_mapping(
    folder: &Path,
    mapping: &NameMapping,
    ctx: &OpContext,
) -> ArchiveResult<Vec<u8>> {
    let mut pairs = Vec::with_capacity(mapping.len());
    for (index, pair) in mapping.iter().enumerate() {
        ctx.checkpoint()?;
        let candidate = folder.join(&pair.extracted);
        let data = if candidate.is_dir() {
            rebuild_from_folder(&candidate, ctx)?
        } else {
            let path = files::find_file(folder, &pair.extracted)
                .ok_or_else(|| ArchiveError::MissingSource(pair.extracted.clone()))?;
            std::fs::read(path)?
        };
        pairs.push((pair.original.as_str(), data));
        ctx.report(index + 1, mapping.len());
    }

    Ok(dsarc::build_from_pairs_with(&pairs, ctx.observer())?)
}

fn build_from_contents(folder: &Path, ctx: &OpContext) -> ArchiveResult<Vec<u8>> {
    if files::has_msnd_parts(folder) {
        return build_msnd_from_folder(folder, ctx);
    }

    match files::files_top_level(folder).as_slice() {
        [single] => Ok(std::fs::read(single)?),
        _ => Err(ArchiveError::AmbiguousContainerType(folder.to_path_buf())),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn write(path: &Path, data: &[u8]) {
        files::write_file(path, data).expect("write");
    }

    #[test]
    fn test_msnd_from_parts_prefers_exact_names() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let folder = dir.path().join("bgm");
        write(&folder.join("bgm.sseq"), b"seq");
        write(&folder.join("aaa.sseq"), b"wrong");
        write(&folder.join("other.SBNK"), b"bank");
        write(&folder.join("bgm.swar"), b"wave");
        write(&folder.join("bgm.txt"), b"\x01\x02\x03\x04");

        let data = rebuild_from_folder(&folder, &OpContext::default()).expect("rebuild");
        let file = dsarc_formats::msnd::MsndFile::from_bytes(&data).expect("valid MSND");
        assert_eq!(file.chunk(ChunkKind::Sseq), b"seq");
        assert_eq!(file.chunk(ChunkKind::Sbnk), b"bank");
        assert_eq!(file.chunk(ChunkKind::Swar), b"wave");
        assert_eq!(file.trailer, [1, 2, 3, 4]);
    }

    #[test]
    fn test_msnd_missing_chunk() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("x.sseq"), b"s");
        write(&dir.path().join("x.swar"), b"w");

        let err = rebuild_from_folder(dir.path(), &OpContext::default()).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::MissingChunk);
    }

    #[test]
    fn test_single_file_passthrough() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("only.bin"), b"as is");
        let data = rebuild_from_folder(dir.path(), &OpContext::default()).expect("rebuild");
        assert_eq!(data, b"as is");
    }

    #[test]
    fn test_ambiguous_folder() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("a.bin"), b"a");
        write(&dir.path().join("b.bin"), b"b");

        let err = rebuild_from_folder(dir.path(), &OpContext::default()).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::AmbiguousContainerType);

        let empty = tempfile::tempdir().expect("Operation should succeed");
        let err = rebuild_from_folder(empty.path(), &OpContext::default()).expect_err("must fail");
        assert!(matches!(err, ArchiveError::AmbiguousContainerType(_)));
    }

    #[test]
    fn test_mapping_rebuild_finds_moved_files() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("mapper.txt"), b"one.bin=one.bin\ntwo.bin=two.bin");
        write(&dir.path().join("one.bin"), b"1");
        write(&dir.path().join("moved").join("two.bin"), b"22");

        let data = build_dsarc_from_folder(dir.path(), &OpContext::default()).expect("rebuild");
        let entries = dsarc::parse(&data).expect("valid DSARC");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].slice(&data), Some(&b"22"[..]));
    }

    #[test]
    fn test_mapping_rebuild_missing_file() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        write(&dir.path().join("mapper.txt"), b"gone.bin=gone.bin");

        let err = rebuild_from_folder(dir.path(), &OpContext::default()).expect_err("must fail");
        assert!(matches!(err, ArchiveError::MissingSource(ref name) if name == "gone.bin"));
    }

    #[test]
    fn test_not_a_directory() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let err = rebuild_from_folder(&dir.path().join("nope"), &OpContext::default())
            .expect_err("must fail");
        assert!(matches!(err, ArchiveError::NotADirectory(_)));
    }
}
