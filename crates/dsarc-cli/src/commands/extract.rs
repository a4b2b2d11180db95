//! Extraction commands

use super::{Interrupt, chunk_id, finish, open_session};
use anyhow::{Context, Result};
use dsarc_archive::{ArchiveService, EntryId};
use dsarc_formats::ChunkKind;
use std::path::PathBuf;

pub async fn extract_all(
    service: ArchiveService,
    interrupt: &Interrupt,
    archive: PathBuf,
    dest: PathBuf,
) -> Result<()> {
    let Some(session) = open_session(service, interrupt, archive).await? else {
        return Ok(());
    };
    interrupt.check()?;
    let outcome = session
        .extract_all(&dest)
        .await
        .with_context(|| format!("failed to extract into {}", dest.display()))?;
    if let Some(summary) = finish(outcome) {
        if summary.mapping.is_empty() {
            println!("Extracted to {}", summary.out_dir.display());
        } else {
            println!(
                "Extracted {} entries to {}",
                summary.mapping.len(),
                summary.out_dir.display()
            );
        }
    }
    Ok(())
}

pub async fn extract_entry(
    service: ArchiveService,
    interrupt: &Interrupt,
    archive: PathBuf,
    id: EntryId,
    dest: PathBuf,
) -> Result<()> {
    let Some(session) = open_session(service, interrupt, archive).await? else {
        return Ok(());
    };
    interrupt.check()?;
    let outcome = session
        .extract_entry(id, &dest)
        .await
        .with_context(|| format!("failed to extract entry {id}"))?;
    if let Some(path) = finish(outcome) {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

pub async fn extract_chunk(
    service: ArchiveService,
    interrupt: &Interrupt,
    archive: PathBuf,
    entry: usize,
    chunk: ChunkKind,
    dest: PathBuf,
) -> Result<()> {
    let Some(session) = open_session(service, interrupt, archive).await? else {
        return Ok(());
    };
    let id = chunk_id(&session, entry, chunk)?;
    interrupt.check()?;
    let outcome = session
        .extract_entry(id, &dest)
        .await
        .with_context(|| format!("failed to extract {chunk} of entry {entry}"))?;
    if let Some(path) = finish(outcome) {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

pub async fn unpack_nested(
    service: ArchiveService,
    interrupt: &Interrupt,
    archive: PathBuf,
    entry: Option<usize>,
    base: PathBuf,
) -> Result<()> {
    let Some(session) = open_session(service, interrupt, archive).await? else {
        return Ok(());
    };
    interrupt.check()?;
    let outcome = session
        .unpack_nested(entry, &base)
        .await
        .with_context(|| format!("failed to unpack below {}", base.display()))?;
    if let Some(out_dir) = finish(outcome) {
        println!("Unpacked to {}", out_dir.display());
    }
    Ok(())
}
