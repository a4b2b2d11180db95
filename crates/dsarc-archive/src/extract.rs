//! Recursive extraction engine
//!
//! Materializes a container's contents on disk together with everything the
//! rebuild engine needs to reproduce it:
//!
//! - DSARC: one file per entry plus a `mapper.txt` manifest in table order
//! - MSND: `<base>.sseq`, `<base>.sbnk`, `<base>.swar` plus a `<base>.txt`
//!   sidecar holding the 4-byte header trailer
//!
//! Entries whose payload is itself a container can be unpacked into a child
//! folder; the parent manifest then maps the entry to that folder name.

use crate::context::OpContext;
use crate::error::{ArchiveError, ArchiveResult};
use crate::files;
use crate::mapping::{MappingPair, NameMapping};
use crate::naming::UniqueNamer;
use dsarc_formats::dsarc::{self, HEADER_SIZE, RECORD_SIZE};
use dsarc_formats::msnd::{self, TRAILER_RANGE};
use dsarc_formats::names::{guess_extension, split_name};
use dsarc_formats::{ArchiveKind, ContainerKind, Entry};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of the MSND trailer sidecar file
pub const TRAILER_EXTENSION: &str = ".txt";

/// Result of a top-level extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Folder the archive was extracted into
    pub out_dir: PathBuf,
    /// Manifest written for DSARC archives; empty for MSND
    pub mapping: NameMapping,
}

/// Load the entry list of an archive file
pub fn load_entries(path: &Path, kind: ArchiveKind, ctx: &OpContext) -> ArchiveResult<Vec<Entry>> {
    ctx.checkpoint()?;
    match kind {
        ArchiveKind::Msnd => {
            let data = std::fs::read(path)?;
            Ok(msnd::parse(&data, &files::stem_of(path))?)
        }
        ArchiveKind::Dsarc => Ok(dsarc::parse_file_with(path, ctx.observer())?),
    }
}

/// Extract every entry of an archive file into `dest/<archive stem>/`
///
/// With `nested` set, DSARC entries that are themselves containers are
/// unpacked into child folders instead of being written as flat files.
pub fn extract_all(
    archive_path: &Path,
    kind: ArchiveKind,
    dest: &Path,
    nested: bool,
    ctx: &OpContext,
) -> ArchiveResult<ExtractSummary> {
    let entries = load_entries(archive_path, kind, ctx)?;
    let out_dir = dest.join(files::stem_of(archive_path));
    std::fs::create_dir_all(&out_dir)?;

    info!(
        "Extracting {} {} ({} entries) to {}",
        kind,
        archive_path.display(),
        entries.len(),
        out_dir.display()
    );

    let mapping = match kind {
        ArchiveKind::Msnd => {
            extract_msnd_file(archive_path, &out_dir, &entries, ctx)?;
            NameMapping::new()
        }
        ArchiveKind::Dsarc => extract_dsarc_file(archive_path, &out_dir, &entries, nested, ctx)?,
    };

    Ok(ExtractSummary { out_dir, mapping })
}

fn extract_msnd_file(
    archive_path: &Path,
    out_dir: &Path,
    entries: &[Entry],
    ctx: &OpContext,
) -> ArchiveResult<()> {
    let data = std::fs::read(archive_path)?;
    let base = files::stem_of(archive_path);
    write_trailer(&data, out_dir, &base)?;

    for (index, entry) in entries.iter().enumerate() {
        ctx.checkpoint()?;
        let payload = slice_entry(&data, entry)?;
        files::write_file(&out_dir.join(&entry.name), payload)?;
        debug!("Wrote {} ({} bytes)", entry.name, entry.size);
        ctx.report(index + 1, entries.len());
    }

    Ok(())
}

fn extract_dsarc_file(
    archive_path: &Path,
    out_dir: &Path,
    entries: &[Entry],
    nested: bool,
    ctx: &OpContext,
) -> ArchiveResult<NameMapping> {
    let archive_len = std::fs::metadata(archive_path)?.len();
    let data_start = (HEADER_SIZE + entries.len() * RECORD_SIZE) as u64;

    // Payloads are written in file order; ranges inside the table are skipped
    let mut order: Vec<usize> = (0..entries.len())
        .filter(|&i| {
            let start = u64::from(entries[i].offset);
            start >= data_start && start + u64::from(entries[i].size) <= archive_len
        })
        .collect();
    order.sort_by_key(|&i| entries[i].offset);

    let mut reader = BufReader::new(File::open(archive_path)?);
    let mut namer = UniqueNamer::new();
    let mut extracted: Vec<Option<String>> = vec![None; entries.len()];

    for (step, &index) in order.iter().enumerate() {
        ctx.checkpoint()?;
        let entry = &entries[index];

        reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut payload = vec![0u8; entry.size as usize];
        reader.read_exact(&mut payload)?;

        let name = if nested && ContainerKind::of(&payload).is_container() {
            extract_child_container(&payload, entry, out_dir, &mut namer, ctx)?
        } else {
            write_leaf(&payload, entry, out_dir, &mut namer)?
        };
        debug!("{} -> {}", entry.name, name);
        extracted[index] = Some(name);
        ctx.report(step + 1, order.len());
    }

    let mapping = entries
        .iter()
        .zip(extracted)
        .map(|(entry, name)| {
            let extracted = name.unwrap_or_else(|| entry.file_name().to_string());
            MappingPair::new(entry.name.clone(), extracted)
        })
        .collect::<NameMapping>();
    mapping.write_to(out_dir)?;

    Ok(mapping)
}

/// Write a single entry of an archive file into `dest`
///
/// DSARC entries take their extension from the payload magic when it is
/// recognized. Existing files are overwritten.
pub fn extract_entry(
    archive_path: &Path,
    kind: ArchiveKind,
    entry: &Entry,
    dest: &Path,
) -> ArchiveResult<PathBuf> {
    let payload = files::read_range(archive_path, u64::from(entry.offset), entry.size as usize)?;
    let file_name = match kind {
        ArchiveKind::Msnd => entry.file_name().to_string(),
        ArchiveKind::Dsarc => {
            format!("{}{}", entry.stem(), guess_extension(&payload, entry.extension()))
        }
    };

    let target = dest.join(file_name);
    files::write_file(&target, &payload)?;
    info!("Extracted {} to {}", entry.name, target.display());
    Ok(target)
}

/// Write one chunk of an embedded MSND entry into `dest`
///
/// A copy of the parent staged in `src_folder` by an earlier chunk
/// replacement is read instead of the archive, so the chunk offsets of an
/// edited entry resolve against the edited bytes.
pub fn extract_chunk(
    archive_path: &Path,
    parent: &Entry,
    chunk: &Entry,
    dest: &Path,
    src_folder: Option<&Path>,
) -> ArchiveResult<PathBuf> {
    let container = load_container(archive_path, parent, src_folder)?;
    let payload = slice_entry(&container, chunk)?;

    let target = dest.join(chunk.file_name());
    files::write_file(&target, payload)?;
    info!("Extracted {} from {} to {}", chunk.name, parent.name, target.display());
    Ok(target)
}

/// Replace one chunk of an embedded MSND entry with the contents of a file
///
/// Returns the rebuilt MSND payload. When `src_folder` is given the payload is
/// also written there under the parent entry's name so a later save picks it up.
/// A copy already staged there is edited instead of the archive's bytes, so
/// successive replacements accumulate.
pub fn replace_chunk(
    archive_path: &Path,
    parent: &Entry,
    chunk: &Entry,
    replacement: &Path,
    src_folder: Option<&Path>,
) -> ArchiveResult<Vec<u8>> {
    let new_data = std::fs::read(replacement)?;
    let container = load_container(archive_path, parent, src_folder)?;
    let rebuilt =
        msnd::replace_chunk(&container, &chunk.extension().to_lowercase(), new_data)?;

    if let Some(folder) = src_folder {
        let out = folder.join(parent.file_name());
        files::write_file(&out, &rebuilt)?;
        info!("Wrote rebuilt {} to {}", parent.name, out.display());
    }

    Ok(rebuilt)
}

/// Bytes of an embedded container: the staged copy when present, else the archive range
fn load_container(
    archive_path: &Path,
    parent: &Entry,
    src_folder: Option<&Path>,
) -> ArchiveResult<Vec<u8>> {
    let staged = src_folder
        .map(|folder| folder.join(parent.file_name()))
        .filter(|path| path.is_file());

    match staged {
        Some(path) => {
            debug!("Using staged {}", path.display());
            Ok(std::fs::read(path)?)
        }
        None => Ok(files::read_range(
            archive_path,
            u64::from(parent.offset),
            parent.size as usize,
        )?),
    }
}

/// Unpack an in-memory container into `out_dir`, recursing into nested ones
///
/// `base_label` names the MSND parts and trailer, and names the raw output
/// file when the buffer is not a container at all.
pub fn extract_nested_buffer(
    data: &[u8],
    out_dir: &Path,
    base_label: &str,
    ctx: &OpContext,
) -> ArchiveResult<()> {
    ctx.checkpoint()?;
    info!(
        "Nested extract of {} ({} bytes) to {}",
        base_label,
        data.len(),
        out_dir.display()
    );

    let mut namer = UniqueNamer::new();
    extract_buffer_into(data, out_dir, base_label, &mut namer, ctx)
}

fn extract_buffer_into(
    data: &[u8],
    out_dir: &Path,
    base_label: &str,
    namer: &mut UniqueNamer,
    ctx: &OpContext,
) -> ArchiveResult<()> {
    std::fs::create_dir_all(out_dir)?;

    match ContainerKind::of(data) {
        ContainerKind::Msnd => extract_msnd_buffer(data, out_dir, base_label, ctx),
        ContainerKind::Dsarc => extract_dsarc_buffer(data, out_dir, namer, ctx),
        ContainerKind::Unknown => {
            let (stem, ext) = split_name(base_label);
            let name = namer.next_name(out_dir, stem, ext);
            files::write_file(&out_dir.join(name), data)?;
            Ok(())
        }
    }
}

/// Chunks are written verbatim as `<base_label>.<chunk ext>`; their payloads
/// are never sniffed or unpacked, whatever magic they start with.
fn extract_msnd_buffer(
    data: &[u8],
    out_dir: &Path,
    base_label: &str,
    ctx: &OpContext,
) -> ArchiveResult<()> {
    let children = msnd::parse(data, base_label)?;
    write_trailer(data, out_dir, base_label)?;

    for (index, child) in children.iter().enumerate() {
        ctx.checkpoint()?;
        let payload = slice_entry(data, child)?;
        files::write_file(&out_dir.join(&child.name), payload)?;
        debug!("Wrote {} ({} bytes)", child.name, child.size);
        ctx.report(index + 1, children.len());
    }

    Ok(())
}

fn extract_dsarc_buffer(
    data: &[u8],
    out_dir: &Path,
    namer: &mut UniqueNamer,
    ctx: &OpContext,
) -> ArchiveResult<()> {
    let entries = dsarc::parse_with(data, ctx.observer())?;

    let mut mapping = NameMapping::new();
    for (index, entry) in entries.iter().enumerate() {
        ctx.checkpoint()?;
        let payload = slice_entry(data, entry)?;
        let name = process_child(payload, entry, out_dir, namer, ctx)?;
        mapping.push(entry.name.as_str(), name);
        ctx.report(index + 1, entries.len());
    }
    mapping.write_to(out_dir)?;

    Ok(())
}

fn process_child(
    payload: &[u8],
    entry: &Entry,
    out_dir: &Path,
    namer: &mut UniqueNamer,
    ctx: &OpContext,
) -> ArchiveResult<String> {
    if ContainerKind::of(payload).is_container() {
        extract_child_container(payload, entry, out_dir, namer, ctx)
    } else {
        write_leaf(payload, entry, out_dir, namer)
    }
}

/// Unpack a container payload into a uniquely named child folder
///
/// The folder name doubles as the MSND base label so the rebuild engine finds
/// `<folder>.sseq` and the `<folder>.txt` trailer by exact name.
fn extract_child_container(
    payload: &[u8],
    entry: &Entry,
    out_dir: &Path,
    namer: &mut UniqueNamer,
    ctx: &OpContext,
) -> ArchiveResult<String> {
    let folder = namer.next_name(out_dir, entry.stem(), "");
    let child_dir = out_dir.join(&folder);
    std::fs::create_dir_all(&child_dir)?;
    debug!("Unpacking nested {} into {}", entry.name, child_dir.display());

    extract_buffer_into(payload, &child_dir, &folder, namer, ctx)?;
    Ok(folder)
}

fn write_leaf(
    payload: &[u8],
    entry: &Entry,
    out_dir: &Path,
    namer: &mut UniqueNamer,
) -> ArchiveResult<String> {
    let ext = guess_extension(payload, entry.extension());
    let name = namer.next_name(out_dir, entry.stem(), ext);
    files::write_file(&out_dir.join(&name), payload)?;
    Ok(name)
}

fn write_trailer(data: &[u8], out_dir: &Path, base: &str) -> ArchiveResult<()> {
    if let Some(trailer) = data.get(TRAILER_RANGE) {
        files::write_file(&out_dir.join(format!("{base}{TRAILER_EXTENSION}")), trailer)?;
    }
    Ok(())
}

fn slice_entry<'a>(data: &'a [u8], entry: &Entry) -> ArchiveResult<&'a [u8]> {
    entry.slice(data).ok_or_else(|| {
        ArchiveError::MissingSource(format!(
            "{} (offset {}, size {}) outside {} bytes",
            entry.name,
            entry.offset,
            entry.size,
            data.len()
        ))
    })
}
