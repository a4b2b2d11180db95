//! Command implementations

pub mod edit;
pub mod extract;
pub mod inspect;

use anyhow::{Context, Result, bail};
use dsarc_archive::{
    ArchiveService, ArchiveSession, CancellationToken, EntryId, OpContext, Outcome,
};
use dsarc_formats::ChunkKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Ctrl-C handler shared by every command
pub struct Interrupt {
    token: CancellationToken,
}

impl Interrupt {
    /// Spawn the signal listener
    pub fn install() -> Self {
        let token = CancellationToken::new();
        let signalled = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                signalled.cancel();
            }
        });
        Self { token }
    }

    /// Context for a direct service call
    pub fn context(&self) -> OpContext {
        OpContext::new(self.token.clone()).with_progress(log_progress)
    }

    /// Session whose running operation is cancelled on interrupt
    pub fn session(&self, service: ArchiveService) -> ArchiveSession {
        let session = ArchiveSession::new(service).with_progress(log_progress);
        let canceller = session.canceller();
        let token = self.token.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            canceller.cancel();
        });
        session
    }

    /// Fail fast when Ctrl-C arrived between operations
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            bail!("interrupted");
        }
        Ok(())
    }
}

fn log_progress(completed: usize, total: usize) {
    debug!("progress {}/{}", completed, total);
}

/// Unwrap a completed outcome, reporting cancellation on stderr
pub fn finish<T>(outcome: Outcome<T>) -> Option<T> {
    match outcome {
        Outcome::Completed(value) => Some(value),
        Outcome::Cancelled => {
            eprintln!("Operation cancelled");
            None
        }
    }
}

/// Open `archive` in a fresh session
pub async fn open_session(
    service: ArchiveService,
    interrupt: &Interrupt,
    archive: PathBuf,
) -> Result<Option<ArchiveSession>> {
    let mut session = interrupt.session(service);
    let opened = session
        .open(&archive)
        .await
        .with_context(|| format!("failed to open {}", archive.display()))?;
    Ok(finish(opened).map(|()| session))
}

/// MSND chunk selector
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkArg {
    Sseq,
    Sbnk,
    Swar,
}

impl From<ChunkArg> for ChunkKind {
    fn from(chunk: ChunkArg) -> Self {
        match chunk {
            ChunkArg::Sseq => Self::Sseq,
            ChunkArg::Sbnk => Self::Sbnk,
            ChunkArg::Swar => Self::Swar,
        }
    }
}

/// Parse `<entry>` or `<entry>:<chunk>`
pub fn parse_entry_id(s: &str) -> Result<EntryId, String> {
    let index = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid index '{part}'"))
    };
    match s.split_once(':') {
        Some((entry, chunk)) => Ok(EntryId::chunk(index(entry)?, index(chunk)?)),
        None => Ok(EntryId::entry(index(s)?)),
    }
}

/// Index of the `kind` chunk inside entry `entry`
pub fn chunk_id(session: &ArchiveSession, entry: usize, kind: ChunkKind) -> Result<EntryId> {
    let parent = session.resolve(EntryId::entry(entry))?;
    let position = parent
        .children
        .iter()
        .position(|child| child.chunk_kind() == Some(kind))
        .with_context(|| format!("entry {} ({}) has no {} chunk", entry, parent.name, kind))?;
    Ok(EntryId::chunk(entry, position))
}
