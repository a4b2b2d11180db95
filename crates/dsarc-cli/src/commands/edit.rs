//! Commands that write archives: replace-chunk, rebuild, save

use super::{Interrupt, chunk_id, finish, open_session};
use anyhow::{Context, Result};
use dsarc_archive::ArchiveService;
use dsarc_formats::ChunkKind;
use std::path::PathBuf;

/// Arguments of `replace-chunk`
pub struct ReplaceChunkArgs {
    pub archive: PathBuf,
    pub entry: usize,
    pub chunk: ChunkKind,
    pub replacement: PathBuf,
    pub source_folder: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

pub async fn replace_chunk(
    service: ArchiveService,
    interrupt: &Interrupt,
    args: ReplaceChunkArgs,
) -> Result<()> {
    let Some(mut session) = open_session(service, interrupt, args.archive.clone()).await? else {
        return Ok(());
    };
    if let Some(folder) = args.source_folder {
        session.set_source_folder(folder);
    }

    let id = chunk_id(&session, args.entry, args.chunk)?;
    interrupt.check()?;
    let replaced = session
        .replace_chunk(id, &args.replacement)
        .await
        .with_context(|| format!("failed to replace {} of entry {}", args.chunk, args.entry))?;
    if finish(replaced).is_none() {
        return Ok(());
    }

    interrupt.check()?;
    let output = args.output.unwrap_or(args.archive);
    let saved = session
        .save_as(&output)
        .await
        .with_context(|| format!("failed to save {}", output.display()))?;
    if let Some(written) = finish(saved) {
        println!("Wrote {} bytes to {}", written, output.display());
    }
    Ok(())
}

pub async fn rebuild(
    service: ArchiveService,
    interrupt: &Interrupt,
    folder: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let outcome = service
        .rebuild_from_folder(&folder, interrupt.context())
        .await
        .with_context(|| format!("failed to rebuild {}", folder.display()))?;
    let Some(data) = finish(outcome) else {
        return Ok(());
    };

    let written = data.len();
    let outcome = service
        .write_file(&output, data, interrupt.context())
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    if finish(outcome).is_some() {
        println!("Wrote {} bytes to {}", written, output.display());
    }
    Ok(())
}

pub async fn save(
    service: ArchiveService,
    interrupt: &Interrupt,
    folder: PathBuf,
    output: PathBuf,
    original: Option<PathBuf>,
) -> Result<()> {
    let session = match original {
        Some(original) => open_session(service, interrupt, original).await?.map(|mut session| {
            session.set_source_folder(&folder);
            session
        }),
        None => {
            let mut session = interrupt.session(service);
            let imported = session
                .import_folder(&folder)
                .await
                .with_context(|| format!("failed to import {}", folder.display()))?;
            finish(imported).map(|()| session)
        }
    };
    let Some(mut session) = session else {
        return Ok(());
    };

    interrupt.check()?;
    let saved = session
        .save_as(&output)
        .await
        .with_context(|| format!("failed to save {}", output.display()))?;
    if let Some(written) = finish(saved) {
        println!("Wrote {} bytes to {}", written, output.display());
    }
    Ok(())
}
