//! Editing session over one opened archive
//!
//! The session owns the entry tree and the working source folder, and
//! serializes operations: starting a new one cancels whatever operation the
//! session started before it.
//!
//! Entries are addressed by index. An [`EntryId`] names either a top-level
//! entry or one chunk of an embedded MSND; the parent of a chunk is simply
//! the same id without the chunk index.

use crate::cancel::{CancellationToken, Outcome};
use crate::context::{OpContext, Progress};
use crate::error::{ArchiveError, ArchiveResult};
use crate::extract::ExtractSummary;
use crate::files;
use crate::overlay::SaveRequest;
use crate::service::ArchiveService;
use dsarc_formats::msnd::{self, ChunkKind, MsndError};
use dsarc_formats::names::split_name;
use dsarc_formats::{ArchiveKind, Entry};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Address of an entry or of one chunk inside an embedded MSND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    /// Top-level entry index
    pub entry: usize,
    /// Chunk index inside the entry's children
    pub chunk: Option<usize>,
}

impl EntryId {
    /// Address a top-level entry
    pub const fn entry(entry: usize) -> Self {
        Self { entry, chunk: None }
    }

    /// Address a chunk of an embedded MSND
    pub const fn chunk(entry: usize, chunk: usize) -> Self {
        Self {
            entry,
            chunk: Some(chunk),
        }
    }

    /// Id of the parent entry for a chunk address
    pub const fn parent(self) -> Option<Self> {
        match self.chunk {
            Some(_) => Some(Self::entry(self.entry)),
            None => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(chunk) => write!(f, "{}:{}", self.entry, chunk),
            None => write!(f, "{}", self.entry),
        }
    }
}

/// The archive a session is editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedArchive {
    /// Where the archive is saved; `None` for a fresh import
    pub path: Option<PathBuf>,
    /// Archive format
    pub kind: ArchiveKind,
    /// Entry tree in table order
    pub entries: Vec<Entry>,
    /// File the entries' offsets refer to, when they came from disk
    pub loaded_from: Option<PathBuf>,
}

/// Cancels whatever operation a session is running
#[derive(Debug, Clone)]
pub struct SessionCanceller {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl SessionCanceller {
    /// Cancel the running operation, if any
    pub fn cancel(&self) {
        if let Some(token) = self.current.lock().as_ref() {
            token.cancel();
        }
    }
}

/// Stateful caller of the [`ArchiveService`]
pub struct ArchiveSession {
    service: ArchiveService,
    archive: Option<OpenedArchive>,
    source_folder: Option<PathBuf>,
    current: Arc<Mutex<Option<CancellationToken>>>,
    progress: Option<Arc<dyn Progress>>,
}

impl fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("archive", &self.archive)
            .field("source_folder", &self.source_folder)
            .finish_non_exhaustive()
    }
}

impl ArchiveSession {
    /// Create an empty session
    pub fn new(service: ArchiveService) -> Self {
        Self {
            service,
            archive: None,
            source_folder: None,
            current: Arc::new(Mutex::new(None)),
            progress: None,
        }
    }

    /// Report progress of every operation to `progress`
    #[must_use]
    pub fn with_progress<P: Progress + 'static>(mut self, progress: P) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Handle that cancels the running operation from elsewhere
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            current: Arc::clone(&self.current),
        }
    }

    /// The opened archive, if any
    pub fn archive(&self) -> Option<&OpenedArchive> {
        self.archive.as_ref()
    }

    /// Working folder for exported and edited entries
    pub fn source_folder(&self) -> Option<&Path> {
        self.source_folder.as_deref()
    }

    /// Choose the working folder
    pub fn set_source_folder(&mut self, folder: impl Into<PathBuf>) {
        self.source_folder = Some(folder.into());
    }

    /// Cancel the previous operation and start a new one
    fn begin(&self) -> OpContext {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        let ctx = OpContext::new(token);
        match &self.progress {
            Some(progress) => ctx.with_shared_progress(Arc::clone(progress)),
            None => ctx,
        }
    }

    fn opened(&self) -> ArchiveResult<&OpenedArchive> {
        self.archive.as_ref().ok_or(ArchiveError::NoArchive)
    }

    /// Archive file the entry offsets refer to
    fn archive_file(&self) -> ArchiveResult<(PathBuf, ArchiveKind)> {
        let archive = self.opened()?;
        let path = archive.loaded_from.clone().ok_or(ArchiveError::NoArchivePath)?;
        Ok((path, archive.kind))
    }

    /// Look up the entry or chunk at `id`
    pub fn resolve(&self, id: EntryId) -> ArchiveResult<&Entry> {
        let unknown = || ArchiveError::UnknownEntry {
            entry: id.entry,
            chunk: id.chunk,
        };
        let entry = self.opened()?.entries.get(id.entry).ok_or_else(unknown)?;
        match id.chunk {
            Some(chunk) => entry.children.get(chunk).ok_or_else(unknown),
            None => Ok(entry),
        }
    }

    /// Parent entry of a chunk address
    pub fn parent_of(&self, id: EntryId) -> ArchiveResult<Option<&Entry>> {
        id.parent().map(|parent| self.resolve(parent)).transpose()
    }

    /// Open an archive file, replacing the current archive
    pub async fn open(&mut self, path: impl Into<PathBuf>) -> ArchiveResult<Outcome<()>> {
        let ctx = self.begin();
        let outcome = self.service.load_archive(path, ctx).await?;
        Ok(outcome.map(|loaded| {
            info!("Opened {} as {}", loaded.path.display(), loaded.kind);
            self.source_folder = None;
            self.archive = Some(OpenedArchive {
                path: Some(loaded.path.clone()),
                kind: loaded.kind,
                entries: loaded.entries,
                loaded_from: Some(loaded.path),
            });
        }))
    }

    /// Start a new archive from a folder; the folder becomes the source folder
    pub async fn import_folder(&mut self, folder: impl Into<PathBuf>) -> ArchiveResult<Outcome<()>> {
        let ctx = self.begin();
        let outcome = self.service.inspect_folder_for_import(folder, ctx).await?;
        match outcome {
            Outcome::Completed(result) if result.entries.is_empty() => Err(ArchiveError::NoEntries),
            Outcome::Completed(result) => {
                info!(
                    "Imported {} as {} ({} entries)",
                    result.source_folder.display(),
                    result.kind,
                    result.entries.len()
                );
                self.archive = Some(OpenedArchive {
                    path: None,
                    kind: result.kind,
                    entries: result.entries,
                    loaded_from: None,
                });
                self.source_folder = Some(result.source_folder);
                Ok(Outcome::Completed(()))
            }
            Outcome::Cancelled => Ok(Outcome::Cancelled),
        }
    }

    /// Save to the archive's own path
    pub async fn save(&mut self) -> ArchiveResult<Outcome<usize>> {
        let path = self.opened()?.path.clone().ok_or(ArchiveError::NoArchivePath)?;
        self.save_as(path).await
    }

    /// Save to `path` and continue editing the saved file
    ///
    /// After a successful save the entries are reloaded from the new file so
    /// later saves fall back to the bytes that were actually written.
    pub async fn save_as(&mut self, path: impl Into<PathBuf>) -> ArchiveResult<Outcome<usize>> {
        let path = path.into();
        let archive = self.opened()?;
        let source_folder = self.source_folder.clone().ok_or(ArchiveError::NoSourceFolder)?;

        let mut request =
            SaveRequest::new(&path, archive.kind, archive.entries.clone(), source_folder);
        request.original_path = archive.loaded_from.clone();

        let ctx = self.begin();
        let written = match self.service.save_archive(request, ctx.clone()).await? {
            Outcome::Completed(written) => written,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };

        match self.service.load_archive(&path, ctx).await? {
            Outcome::Completed(loaded) => {
                self.archive = Some(OpenedArchive {
                    path: Some(path),
                    kind: loaded.kind,
                    entries: loaded.entries,
                    loaded_from: Some(loaded.path),
                });
            }
            Outcome::Cancelled => {
                warn!("Reload after save cancelled; entries still refer to the previous file");
                if let Some(archive) = self.archive.as_mut() {
                    archive.path = Some(path);
                }
            }
        }
        Ok(Outcome::Completed(written))
    }

    /// Extract every entry into `dest/<archive stem>/`
    pub async fn extract_all(
        &self,
        dest: impl Into<PathBuf>,
    ) -> ArchiveResult<Outcome<ExtractSummary>> {
        let (archive, kind) = self.archive_file()?;
        let ctx = self.begin();
        self.service.extract_all(archive, kind, dest, ctx).await
    }

    /// Extract the entry or chunk at `id` into `dest`
    pub async fn extract_entry(
        &self,
        id: EntryId,
        dest: impl Into<PathBuf>,
    ) -> ArchiveResult<Outcome<PathBuf>> {
        let (archive, kind) = self.archive_file()?;
        let entry = self.resolve(id)?.clone();
        let ctx = self.begin();
        match self.parent_of(id)?.cloned() {
            Some(parent) => {
                let staged_in = self.source_folder.clone();
                self.service
                    .extract_chunk(archive, parent, entry, dest, staged_in, ctx)
                    .await
            }
            None => {
                self.service
                    .extract_entry(archive, kind, entry, dest, ctx)
                    .await
            }
        }
    }

    /// Replace a top-level entry with a file
    ///
    /// The file is copied into the source folder (its own folder when none is
    /// set) and the entry takes the file's name, so the next save picks it up.
    pub async fn replace_entry(
        &mut self,
        index: usize,
        replacement: impl Into<PathBuf>,
    ) -> ArchiveResult<Outcome<()>> {
        let replacement = replacement.into();
        let kind = self.opened()?.kind;
        self.resolve(EntryId::entry(index))?;

        let file_name = files::name_of(&replacement);
        if kind == ArchiveKind::Msnd && ChunkKind::from_extension(split_name(&file_name).1).is_none()
        {
            return Err(MsndError::UnsupportedExtension(files::extension_of(&replacement)).into());
        }

        let folder = self.ensure_source_folder(&replacement)?;
        let ctx = self.begin();
        let outcome = self
            .service
            .copy_file_to_folder(&replacement, folder, ctx)
            .await?;

        Ok(outcome.map(|_| {
            if let Some(entry) = self.entry_mut(index) {
                info!("Replaced {} with {}", entry.name, file_name);
                entry.name = file_name;
            }
        }))
    }

    /// Replace one chunk of an embedded MSND entry
    ///
    /// The parent entry is first extracted into the source folder when it is
    /// not staged there yet; the rebuilt MSND is staged in its place and the
    /// entry's chunk list is re-read from it.
    pub async fn replace_chunk(
        &mut self,
        id: EntryId,
        replacement: impl Into<PathBuf>,
    ) -> ArchiveResult<Outcome<()>> {
        let replacement = replacement.into();
        let (archive, _) = self.archive_file()?;
        let chunk = self.resolve(id)?.clone();
        let parent = self
            .parent_of(id)?
            .cloned()
            .ok_or_else(|| ArchiveError::NotEmbeddedContainer(chunk.name.clone()))?;

        let folder = self.ensure_source_folder(&replacement)?;
        let ctx = self.begin();

        if !folder.join(parent.file_name()).is_file() {
            let staged = self
                .service
                .extract_entry(&archive, ArchiveKind::Dsarc, parent.clone(), &folder, ctx.clone())
                .await?;
            if staged.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }
            info!("Staged {} in {} for modification", parent.name, folder.display());
        }

        let outcome = self
            .service
            .replace_chunk(archive, parent.clone(), chunk, replacement, Some(folder), ctx)
            .await?;
        let Outcome::Completed(rebuilt) = outcome else {
            return Ok(Outcome::Cancelled);
        };

        self.refresh_children(id.entry, &rebuilt)?;
        info!("Rebuilt embedded MSND {}", parent.name);
        Ok(Outcome::Completed(()))
    }

    /// Rebuild an embedded MSND entry from a folder of part files
    ///
    /// The result is staged in the source folder under the entry's name.
    pub async fn import_chunks(
        &mut self,
        index: usize,
        folder: impl Into<PathBuf>,
    ) -> ArchiveResult<Outcome<()>> {
        let folder = folder.into();
        let entry = self.resolve(EntryId::entry(index))?.clone();
        if !entry.is_embedded_container {
            return Err(ArchiveError::NotEmbeddedContainer(entry.name));
        }

        let ctx = self.begin();
        let Outcome::Completed(rebuilt) = self
            .service
            .build_msnd_from_folder(&folder, ctx.clone())
            .await?
        else {
            return Ok(Outcome::Cancelled);
        };

        let source = self.source_folder.get_or_insert(folder).clone();
        let staged = source.join(entry.file_name());
        if self
            .service
            .write_file(&staged, rebuilt.clone(), ctx)
            .await?
            .is_cancelled()
        {
            return Ok(Outcome::Cancelled);
        }

        self.refresh_children(index, &rebuilt)?;
        info!("Imported and staged {} at {}", entry.name, staged.display());
        Ok(Outcome::Completed(()))
    }

    /// Unpack the whole archive, or one entry, recursively under `base_folder`
    ///
    /// The output folder is the one named after the archive (or entry) stem
    /// found at or below `base_folder`, created when absent.
    pub async fn unpack_nested(
        &self,
        entry: Option<usize>,
        base_folder: &Path,
    ) -> ArchiveResult<Outcome<PathBuf>> {
        let (archive, _) = self.archive_file()?;
        let (expected, range) = match entry {
            Some(index) => {
                let entry = self.resolve(EntryId::entry(index))?;
                (entry.stem().to_string(), Some((entry.offset, entry.size)))
            }
            None => (files::stem_of(&archive), None),
        };

        let (out_dir, matches) = files::resolve_named_folder(base_folder, &expected)?;
        if matches > 1 {
            info!(
                "{} folders matched {}; using {}",
                matches,
                expected,
                out_dir.display()
            );
        }

        let ctx = self.begin();
        let read = match range {
            Some((offset, size)) => {
                self.service
                    .read_range(&archive, u64::from(offset), size as usize, ctx.clone())
                    .await?
            }
            None => self.service.read_file(&archive, ctx.clone()).await?,
        };
        let Outcome::Completed(data) = read else {
            return Ok(Outcome::Cancelled);
        };

        let outcome = self
            .service
            .extract_nested_buffer(data, &out_dir, expected, ctx)
            .await?;
        Ok(outcome.map(|()| out_dir))
    }

    fn ensure_source_folder(&mut self, replacement: &Path) -> ArchiveResult<PathBuf> {
        if let Some(folder) = &self.source_folder {
            return Ok(folder.clone());
        }
        let folder = replacement
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ArchiveError::NoSourceFolder)?
            .to_path_buf();
        self.source_folder = Some(folder.clone());
        Ok(folder)
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.archive.as_mut()?.entries.get_mut(index)
    }

    fn refresh_children(&mut self, index: usize, rebuilt: &[u8]) -> ArchiveResult<()> {
        let entry = self.entry_mut(index).ok_or(ArchiveError::UnknownEntry {
            entry: index,
            chunk: None,
        })?;
        entry.children = msnd::parse(rebuilt, split_name(&entry.name).0)?;
        entry.is_embedded_container = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use dsarc_formats::dsarc::{self, DsarcBuilder};
    use dsarc_formats::msnd::{MsndBuilder, MsndFile};
    use pretty_assertions::assert_eq;

    fn msnd_bytes() -> Vec<u8> {
        MsndBuilder::new()
            .chunk(ChunkKind::Sseq, b"seq".to_vec())
            .chunk(ChunkKind::Sbnk, b"bank".to_vec())
            .chunk(ChunkKind::Swar, b"wave".to_vec())
            .trailer([1, 2, 3, 4])
            .build()
            .expect("build")
    }

    fn sample(dir: &Path) -> PathBuf {
        let mut builder = DsarcBuilder::new();
        builder
            .add("song.msnd", msnd_bytes())
            .add("x.bin", b"xx".to_vec())
            .add("y.bin", b"yy".to_vec());
        let path = dir.join("pack.dsarc");
        std::fs::write(&path, builder.build().expect("build")).expect("write");
        path
    }

    #[test]
    fn test_entry_ids() {
        assert_eq!(EntryId::chunk(2, 1).parent(), Some(EntryId::entry(2)));
        assert_eq!(EntryId::entry(2).parent(), None);
        assert_eq!(EntryId::chunk(2, 1).to_string(), "2:1");
    }

    #[test]
    fn test_new_operation_cancels_previous() {
        let session = ArchiveSession::new(ArchiveService::default());
        let first = session.begin();
        let second = session.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        session.canceller().cancel();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_open_resolve_and_save_overlay() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample(dir.path());
        let mut session = ArchiveSession::new(ArchiveService::default());

        session.open(&path).await.expect("open").into_result().expect("completed");
        let chunk = session.resolve(EntryId::chunk(0, 2)).expect("chunk");
        assert_eq!(chunk.name, "song.swar");
        assert_eq!(
            session.parent_of(EntryId::chunk(0, 2)).expect("parent").map(|e| e.name.as_str()),
            Some("song.msnd")
        );
        assert!(matches!(
            session.resolve(EntryId::chunk(1, 0)),
            Err(ArchiveError::UnknownEntry { entry: 1, chunk: Some(0) })
        ));

        // Saving without a source folder is refused
        assert!(matches!(session.save().await, Err(ArchiveError::NoSourceFolder)));

        let src = dir.path().join("src");
        files::write_file(&src.join("y.bin"), b"new y").expect("write");
        session.set_source_folder(&src);
        let out = dir.path().join("saved.dsarc");
        session.save_as(&out).await.expect("save").into_result().expect("completed");

        let saved = dsarc::DsarcArchive::from_bytes(&std::fs::read(&out).expect("read")).expect("valid");
        assert_eq!(saved.get("x.bin"), Some(&b"xx"[..]));
        assert_eq!(saved.get("y.bin"), Some(&b"new y"[..]));
        assert_eq!(session.archive().and_then(|a| a.path.clone()), Some(out));
    }

    #[tokio::test]
    async fn test_replace_chunk_flow() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample(dir.path());
        let replacement = dir.path().join("incoming").join("better.sbnk");
        files::write_file(&replacement, b"better bank").expect("write");

        let mut session = ArchiveSession::new(ArchiveService::default());
        session.open(&path).await.expect("open").into_result().expect("completed");
        session
            .replace_chunk(EntryId::chunk(0, 1), &replacement)
            .await
            .expect("replace")
            .into_result()
            .expect("completed");

        // Source folder defaults to the replacement's folder
        let src = dir.path().join("incoming");
        assert_eq!(session.source_folder(), Some(src.as_path()));
        let staged = std::fs::read(src.join("song.msnd")).expect("staged");
        let file = MsndFile::from_bytes(&staged).expect("valid");
        assert_eq!(file.chunk(ChunkKind::Sbnk), b"better bank");
        assert_eq!(file.chunk(ChunkKind::Swar), b"wave");

        let sbnk = session.resolve(EntryId::chunk(0, 1)).expect("chunk");
        assert_eq!(sbnk.size, 11);
    }

    #[tokio::test]
    async fn test_chunks_extract_from_staged_copy_after_replace() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample(dir.path());
        let replacement = dir.path().join("incoming").join("bigger.sbnk");
        files::write_file(&replacement, &[0xAB; 32]).expect("write");

        let mut session = ArchiveSession::new(ArchiveService::default());
        session.open(&path).await.expect("open").into_result().expect("completed");
        session
            .replace_chunk(EntryId::chunk(0, 1), &replacement)
            .await
            .expect("replace")
            .into_result()
            .expect("completed");

        let dest = dir.path().join("chunks");
        let mut extracted = Vec::new();
        for chunk in 0..3 {
            let out = session
                .extract_entry(EntryId::chunk(0, chunk), &dest)
                .await
                .expect("extract")
                .into_result()
                .expect("completed");
            extracted.push(std::fs::read(out).expect("read"));
        }

        assert_eq!(extracted[0], b"seq");
        assert_eq!(extracted[1], [0xAB; 32]);
        assert_eq!(extracted[2], b"wave");
    }

    #[tokio::test]
    async fn test_unpack_nested_entry() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample(dir.path());
        let mut session = ArchiveSession::new(ArchiveService::default());
        session.open(&path).await.expect("open").into_result().expect("completed");

        let out = session
            .unpack_nested(Some(0), dir.path())
            .await
            .expect("unpack")
            .into_result()
            .expect("completed");
        assert_eq!(out, dir.path().join("song"));
        assert_eq!(std::fs::read(out.join("song.txt")).expect("read"), [1, 2, 3, 4]);
        assert_eq!(std::fs::read(out.join("song.sseq")).expect("read"), b"seq");
    }

    #[tokio::test]
    async fn test_import_folder_then_save() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let folder = dir.path().join("loose");
        files::write_file(&folder.join("a.bin"), b"a").expect("write");
        files::write_file(&folder.join("b.bin"), b"bb").expect("write");

        let mut session = ArchiveSession::new(ArchiveService::default());
        session.import_folder(&folder).await.expect("import").into_result().expect("completed");
        assert!(matches!(session.save().await, Err(ArchiveError::NoArchivePath)));

        let out = dir.path().join("new.dsarc");
        session.save_as(&out).await.expect("save").into_result().expect("completed");
        let entries = dsarc::parse_file(&out).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "b.bin");
    }
}
