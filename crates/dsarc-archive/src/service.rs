//! Asynchronous archive service
//!
//! Each call runs its engine on one blocking worker so an async caller is
//! never stalled by file I/O. Calls take an [`OpContext`] carrying the
//! cancellation token and progress sink, and settle into an [`Outcome`]:
//! cancellation is reported as [`Outcome::Cancelled`], never as an error.

use crate::cancel::Outcome;
use crate::config::ServiceConfig;
use crate::context::OpContext;
use crate::error::{ArchiveError, ArchiveResult};
use crate::extract::{self, ExtractSummary};
use crate::files;
use crate::import::{self, ImportResult};
use crate::overlay::{self, SaveRequest};
use crate::rebuild;
use dsarc_formats::{ArchiveKind, Entry, detect, dsarc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Archive loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArchive {
    /// Archive file path
    pub path: PathBuf,
    /// Detected format
    pub kind: ArchiveKind,
    /// Parsed entries in table order
    pub entries: Vec<Entry>,
}

/// Facade over the extraction, rebuild, save and import engines
#[derive(Debug, Clone, Default)]
pub struct ArchiveService {
    config: Arc<ServiceConfig>,
}

impl ArchiveService {
    /// Create a service with the given configuration
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn run<T, F>(&self, op: &'static str, ctx: OpContext, work: F) -> ArchiveResult<Outcome<T>>
    where
        T: Send + 'static,
        F: FnOnce(&OpContext) -> ArchiveResult<T> + Send + 'static,
    {
        let token = ctx.token().clone();
        debug!("Starting {}", op);
        let joined = tokio::task::spawn_blocking(move || {
            ctx.checkpoint()?;
            work(&ctx)
        })
        .await;

        let result = joined.map_err(|e| ArchiveError::Task(e.to_string())).and_then(|r| r);
        let outcome = Outcome::settle(&token, result)?;
        if outcome.is_cancelled() {
            info!("{} cancelled", op);
        }
        Ok(outcome)
    }

    /// Detect and parse an archive file
    pub async fn load_archive(
        &self,
        path: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<LoadedArchive>> {
        let path = path.into();
        self.run("load", ctx, move |ctx| {
            let kind = detect::detect_file(&path)?;
            let entries = extract::load_entries(&path, kind, ctx)?;
            info!("Loaded {} {} ({} entries)", kind, path.display(), entries.len());
            Ok(LoadedArchive { path, kind, entries })
        })
        .await
    }

    /// Build and write an archive through the sparse overlay
    ///
    /// Returns the number of bytes written.
    pub async fn save_archive(
        &self,
        request: SaveRequest,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<usize>> {
        let fallback = self.config.fallback_to_original;
        self.run("save", ctx, move |ctx| {
            overlay::save_archive(&request, fallback, ctx)
        })
        .await
    }

    /// Describe the archive a folder would become
    pub async fn inspect_folder_for_import(
        &self,
        folder: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<ImportResult>> {
        let folder = folder.into();
        self.run("inspect", ctx, move |ctx| import::inspect_folder(&folder, ctx))
            .await
    }

    /// Extract every entry into `dest/<archive stem>/`
    pub async fn extract_all(
        &self,
        archive: impl Into<PathBuf>,
        kind: ArchiveKind,
        dest: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<ExtractSummary>> {
        let (archive, dest) = (archive.into(), dest.into());
        let config = *self.config;
        self.run("extract all", ctx, move |ctx| {
            prepare_destination(&config, &dest)?;
            extract::extract_all(&archive, kind, &dest, config.nested_extraction, ctx)
        })
        .await
    }

    /// Extract one entry into `dest`
    pub async fn extract_entry(
        &self,
        archive: impl Into<PathBuf>,
        kind: ArchiveKind,
        entry: Entry,
        dest: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<PathBuf>> {
        let (archive, dest) = (archive.into(), dest.into());
        let config = *self.config;
        self.run("extract entry", ctx, move |_| {
            prepare_destination(&config, &dest)?;
            extract::extract_entry(&archive, kind, &entry, &dest)
        })
        .await
    }

    /// Extract one chunk of an embedded MSND into `dest`
    ///
    /// A parent staged in `src_folder` is read in place of the archive.
    pub async fn extract_chunk(
        &self,
        archive: impl Into<PathBuf>,
        parent: Entry,
        chunk: Entry,
        dest: impl Into<PathBuf>,
        src_folder: Option<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<PathBuf>> {
        let (archive, dest) = (archive.into(), dest.into());
        let config = *self.config;
        self.run("extract chunk", ctx, move |_| {
            prepare_destination(&config, &dest)?;
            extract::extract_chunk(&archive, &parent, &chunk, &dest, src_folder.as_deref())
        })
        .await
    }

    /// Replace one chunk of an embedded MSND, staging the result in `src_folder`
    pub async fn replace_chunk(
        &self,
        archive: impl Into<PathBuf>,
        parent: Entry,
        chunk: Entry,
        replacement: impl Into<PathBuf>,
        src_folder: Option<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let (archive, replacement) = (archive.into(), replacement.into());
        self.run("replace chunk", ctx, move |_| {
            extract::replace_chunk(&archive, &parent, &chunk, &replacement, src_folder.as_deref())
        })
        .await
    }

    /// Rebuild whatever container a folder describes
    pub async fn rebuild_from_folder(
        &self,
        folder: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let folder = folder.into();
        self.run("rebuild", ctx, move |ctx| rebuild::rebuild_from_folder(&folder, ctx))
            .await
    }

    /// Unpack an in-memory container into `out_dir`, recursing into nested ones
    pub async fn extract_nested_buffer(
        &self,
        data: Vec<u8>,
        out_dir: impl Into<PathBuf>,
        base_label: impl Into<String>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<()>> {
        let (out_dir, base_label) = (out_dir.into(), base_label.into());
        self.run("nested extract", ctx, move |ctx| {
            extract::extract_nested_buffer(&data, &out_dir, &base_label, ctx)
        })
        .await
    }

    /// Parse a DSARC held in memory
    pub async fn parse_dsarc_buffer(
        &self,
        data: Vec<u8>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<Entry>>> {
        self.run("parse", ctx, move |ctx| {
            Ok(dsarc::parse_with(&data, ctx.observer())?)
        })
        .await
    }

    /// Build a DSARC from a folder's `mapper.txt`
    pub async fn build_dsarc_from_folder(
        &self,
        folder: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let folder = folder.into();
        self.run("build DSARC", ctx, move |ctx| {
            rebuild::build_dsarc_from_folder(&folder, ctx)
        })
        .await
    }

    /// Build an MSND from a folder's part files
    pub async fn build_msnd_from_folder(
        &self,
        folder: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let folder = folder.into();
        self.run("build MSND", ctx, move |ctx| {
            rebuild::build_msnd_from_folder(&folder, ctx)
        })
        .await
    }

    /// Write a whole buffer to `path`
    pub async fn write_file(
        &self,
        path: impl Into<PathBuf>,
        data: Vec<u8>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<()>> {
        let path = path.into();
        self.run("write", ctx, move |_| Ok(files::write_file(&path, &data)?))
            .await
    }

    /// Read a whole file
    pub async fn read_file(
        &self,
        path: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let path = path.into();
        self.run("read", ctx, move |_| Ok(std::fs::read(&path)?))
            .await
    }

    /// Read `size` bytes at `offset`; a short file yields a short buffer
    pub async fn read_range(
        &self,
        path: impl Into<PathBuf>,
        offset: u64,
        size: usize,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<Vec<u8>>> {
        let path = path.into();
        self.run("read range", ctx, move |_| {
            Ok(files::read_range(&path, offset, size)?)
        })
        .await
    }

    /// Copy a file into a folder under its own name
    pub async fn copy_file_to_folder(
        &self,
        source: impl Into<PathBuf>,
        folder: impl Into<PathBuf>,
        ctx: OpContext,
    ) -> ArchiveResult<Outcome<PathBuf>> {
        let (source, folder) = (source.into(), folder.into());
        self.run("copy", ctx, move |_| {
            Ok(files::copy_file_to_folder(&source, &folder)?)
        })
        .await
    }
}

fn prepare_destination(config: &ServiceConfig, dest: &Path) -> ArchiveResult<()> {
    if dest.is_dir() {
        return Ok(());
    }
    if config.create_destination {
        std::fs::create_dir_all(dest)?;
        Ok(())
    } else {
        Err(ArchiveError::NotADirectory(dest.to_path_buf()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use dsarc_formats::dsarc::DsarcBuilder;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn sample_archive(dir: &Path) -> PathBuf {
        let mut builder = DsarcBuilder::new();
        builder.add("a.bin", b"alpha".to_vec()).add("b.bin", b"beta".to_vec());
        let path = dir.join("sample.dsarc");
        std::fs::write(&path, builder.build().expect("build")).expect("write");
        path
    }

    #[tokio::test]
    async fn test_load_archive() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample_archive(dir.path());

        let loaded = ArchiveService::default()
            .load_archive(&path, OpContext::default())
            .await
            .expect("Operation should succeed")
            .completed()
            .expect("not cancelled");
        assert_eq!(loaded.kind, ArchiveKind::Dsarc);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.path, path);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample_archive(dir.path());
        let token = CancellationToken::new();
        token.cancel();

        let outcome = ArchiveService::default()
            .extract_all(&path, ArchiveKind::Dsarc, dir.path().join("out"), OpContext::new(token))
            .await
            .expect("cancellation is not an error");
        assert!(outcome.is_cancelled());
    }

    #[tokio::test]
    async fn test_extract_reports_progress() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample_archive(dir.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = OpContext::default().with_progress(move |done, total| sink.lock().push((done, total)));

        let summary = ArchiveService::default()
            .extract_all(&path, ArchiveKind::Dsarc, dir.path().join("out"), ctx)
            .await
            .expect("Operation should succeed")
            .completed()
            .expect("not cancelled");
        assert_eq!(summary.mapping.len(), 2);
        assert_eq!(*seen.lock(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_destination_creation_can_be_disabled() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = sample_archive(dir.path());
        let service = ArchiveService::new(ServiceConfig::new().with_create_destination(false));

        let err = service
            .extract_all(&path, ArchiveKind::Dsarc, dir.path().join("missing"), OpContext::default())
            .await
            .expect_err("must fail");
        assert!(matches!(err, ArchiveError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_parse_buffer_and_pass_through_io() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let service = ArchiveService::default();
        let path = sample_archive(dir.path());

        let data = service
            .read_file(&path, OpContext::default())
            .await
            .expect("read")
            .into_result()
            .expect("completed");
        let entries = service
            .parse_dsarc_buffer(data.clone(), OpContext::default())
            .await
            .expect("parse")
            .into_result()
            .expect("completed");
        assert_eq!(entries[1].name, "b.bin");

        let slice = service
            .read_range(&path, u64::from(entries[1].offset), entries[1].size as usize, OpContext::default())
            .await
            .expect("read range")
            .into_result()
            .expect("completed");
        assert_eq!(slice, b"beta");

        let copy = dir.path().join("copy").join("x.bin");
        service
            .write_file(&copy, slice, OpContext::default())
            .await
            .expect("write")
            .into_result()
            .expect("completed");
        assert_eq!(std::fs::read(copy).expect("read"), b"beta");
    }
}
