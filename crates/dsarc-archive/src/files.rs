//! File system helpers shared by the engines

use dsarc_formats::ChunkKind;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read up to `size` bytes starting at `offset`
///
/// A short file yields a short buffer rather than an error.
pub fn read_range(path: &Path, offset: u64, size: usize) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = Vec::with_capacity(size);
    file.take(size as u64).read_to_end(&mut data)?;
    Ok(data)
}

/// Write a whole buffer, creating parent directories first
pub fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)
}

/// File stem of a path as an owned string
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name of a path as an owned string
pub fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension of a path including the dot, or empty
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default()
}

/// Every file under `folder`, recursively, in sorted path order
pub fn files_recursive(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Files directly inside `folder`, in sorted order
pub fn files_top_level(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Files and folders directly inside `folder`, in sorted order
pub fn children_top_level(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Whether a path's extension equals `ext` (dot included), ignoring case
pub fn has_extension(path: &Path, ext: &str) -> bool {
    extension_of(path).eq_ignore_ascii_case(ext)
}

/// Locate `name` under `folder`
///
/// Tries `folder/name` first, then searches recursively for a file with the
/// same final component, ignoring case.
pub fn find_file(folder: &Path, name: &str) -> Option<PathBuf> {
    let direct = folder.join(name);
    if direct.is_file() {
        return Some(direct);
    }

    let wanted = name_of(Path::new(name));
    files_recursive(folder)
        .into_iter()
        .find(|p| name_of(p).eq_ignore_ascii_case(&wanted))
}

/// First file with extension `ext` in `folder`, optionally recursive
pub fn first_with_extension(folder: &Path, ext: &str, recursive: bool) -> Option<PathBuf> {
    let files = if recursive {
        files_recursive(folder)
    } else {
        files_top_level(folder)
    };
    files.into_iter().find(|p| has_extension(p, ext))
}

/// Whether `folder` directly contains any MSND part file
pub fn has_msnd_parts(folder: &Path) -> bool {
    files_top_level(folder).iter().any(|p| {
        ChunkKind::ALL
            .iter()
            .any(|kind| has_extension(p, kind.extension()))
    })
}

/// Copy `source` into `folder` under its own file name, overwriting
///
/// Copying a file onto itself is a no-op.
pub fn copy_file_to_folder(source: &Path, folder: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(folder)?;
    let target = folder.join(name_of(source));
    let same = match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        std::fs::copy(source, &target)?;
    }
    Ok(target)
}

/// Find the folder named `expected` starting from `selected`
///
/// `selected` itself matches when its name is `expected`. Otherwise a direct
/// child is preferred, then the first match anywhere below. When nothing
/// matches, `selected/expected` is created. Returns the folder and how many
/// candidates matched.
pub fn resolve_named_folder(selected: &Path, expected: &str) -> io::Result<(PathBuf, usize)> {
    if name_of(selected).eq_ignore_ascii_case(expected) && selected.is_dir() {
        return Ok((selected.to_path_buf(), 1));
    }

    let direct = selected.join(expected);
    if direct.is_dir() {
        return Ok((direct, 1));
    }

    let matches: Vec<PathBuf> = WalkDir::new(selected)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_dir() && e.file_name().to_string_lossy().eq_ignore_ascii_case(expected)
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    if let Some(first) = matches.first() {
        return Ok((first.clone(), matches.len()));
    }

    if direct.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("file exists, cannot create folder: {}", direct.display()),
        ));
    }
    std::fs::create_dir_all(&direct)?;
    Ok((direct, 1))
}

/// Case-insensitive index of every file under a folder by file name
///
/// When several files share a name the first in sorted path order wins.
#[derive(Debug, Default)]
pub struct FileIndex {
    by_name: HashMap<String, PathBuf>,
}

impl FileIndex {
    /// Index `folder` recursively; a missing folder yields an empty index
    pub fn build(folder: &Path) -> Self {
        let mut by_name = HashMap::new();
        if folder.is_dir() {
            for path in files_recursive(folder) {
                by_name
                    .entry(name_of(&path).to_lowercase())
                    .or_insert(path);
            }
        }
        Self { by_name }
    }

    /// Look up a file by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.by_name.get(&name.to_lowercase()).map(PathBuf::as_path)
    }

    /// Number of indexed names
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing was indexed
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_range_short_file() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").expect("write");

        assert_eq!(read_range(&path, 2, 3).expect("read"), b"234");
        assert_eq!(read_range(&path, 8, 10).expect("read"), b"89");
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = dir.path().join("a").join("b").join("c.bin");
        write_file(&path, b"x").expect("write");
        assert_eq!(std::fs::read(&path).expect("read"), b"x");
    }

    #[test]
    fn test_find_file_searches_recursively() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let nested = dir.path().join("deep").join("er");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(nested.join("Voice.SWAV"), b"v").expect("write");

        let found = find_file(dir.path(), "voice.swav").expect("should find");
        assert_eq!(found, nested.join("Voice.SWAV"));
        assert!(find_file(dir.path(), "missing.bin").is_none());
    }

    #[test]
    fn test_file_index_first_wins() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        std::fs::create_dir_all(dir.path().join("b")).expect("mkdir");
        std::fs::write(dir.path().join("a.bin"), b"top").expect("write");
        std::fs::write(dir.path().join("b").join("A.BIN"), b"nested").expect("write");

        let index = FileIndex::build(dir.path());
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("A.bin"), Some(dir.path().join("a.bin").as_path()));
        assert!(FileIndex::build(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_resolve_named_folder() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let deep = dir.path().join("a").join("Song");
        std::fs::create_dir_all(&deep).expect("mkdir");

        assert_eq!(
            resolve_named_folder(&deep, "song").expect("resolve"),
            (deep.clone(), 1)
        );
        assert_eq!(
            resolve_named_folder(dir.path(), "song").expect("resolve"),
            (deep, 1)
        );

        let (created, count) = resolve_named_folder(dir.path(), "fresh").expect("resolve");
        assert_eq!(count, 1);
        assert!(created.is_dir());

        std::fs::write(dir.path().join("blocked"), b"x").expect("write");
        assert!(resolve_named_folder(dir.path(), "blocked").is_err());
    }

    #[test]
    fn test_copy_file_to_folder() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let source = dir.path().join("new.swar");
        std::fs::write(&source, b"w").expect("write");

        let target = copy_file_to_folder(&source, &dir.path().join("src")).expect("copy");
        assert_eq!(std::fs::read(&target).expect("read"), b"w");
        // Copying onto itself leaves the file intact
        let same = copy_file_to_folder(&target, &dir.path().join("src")).expect("copy");
        assert_eq!(std::fs::read(same).expect("read"), b"w");
    }

    #[test]
    fn test_msnd_part_detection() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        assert!(!has_msnd_parts(dir.path()));
        std::fs::write(dir.path().join("song.SBNK"), b"b").expect("write");
        assert!(has_msnd_parts(dir.path()));
        assert_eq!(
            first_with_extension(dir.path(), ".sbnk", false),
            Some(dir.path().join("song.SBNK"))
        );
    }
}
