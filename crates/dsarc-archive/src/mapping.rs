//! Name-mapping manifest (`mapper.txt`)
//!
//! Each line pairs an in-archive name with the file or folder it was extracted
//! to: `original_name=extracted_name`. Line order is the archive's table order
//! and is the authoritative key for rebuilding the archive.

use crate::error::ArchiveResult;
use std::fmt;
use std::path::{Path, PathBuf};

/// Reserved file name of the mapping manifest
pub const MAPPING_FILE_NAME: &str = "mapper.txt";

const BOM: char = '\u{feff}';

/// One `original=extracted` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPair {
    /// Entry name inside the archive
    pub original: String,
    /// File or folder name on disk, relative to the mapping's folder
    pub extracted: String,
}

impl MappingPair {
    /// Create a pair
    pub fn new(original: impl Into<String>, extracted: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            extracted: extracted.into(),
        }
    }
}

/// Ordered list of mapping pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping {
    pairs: Vec<MappingPair>,
}

impl NameMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text
    ///
    /// Lines without `=` are ignored. The first `=` splits the line and both
    /// sides are trimmed. A leading byte-order mark is skipped.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let pairs = text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(left, right)| MappingPair::new(left.trim(), right.trim()))
            .collect();
        Self { pairs }
    }

    /// Render as manifest text, one pair per line joined by `\n`
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Path of the manifest inside `folder`
    pub fn path_in(folder: &Path) -> PathBuf {
        folder.join(MAPPING_FILE_NAME)
    }

    /// Whether `folder` contains a manifest
    pub fn exists_in(folder: &Path) -> bool {
        Self::path_in(folder).is_file()
    }

    /// Read the manifest from `folder`, if present
    pub fn read_from(folder: &Path) -> ArchiveResult<Option<Self>> {
        let path = Self::path_in(folder);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(Self::parse(&String::from_utf8_lossy(&bytes))))
    }

    /// Write the manifest into `folder` as UTF-8 without a byte-order mark
    pub fn write_to(&self, folder: &Path) -> ArchiveResult<PathBuf> {
        let path = Self::path_in(folder);
        std::fs::write(&path, self.render())?;
        Ok(path)
    }

    /// Append a pair
    pub fn push(&mut self, original: impl Into<String>, extracted: impl Into<String>) {
        self.pairs.push(MappingPair::new(original, extracted));
    }

    /// Pairs in order
    pub fn pairs(&self) -> &[MappingPair] {
        &self.pairs
    }

    /// Iterate pairs in order
    pub fn iter(&self) -> std::slice::Iter<'_, MappingPair> {
        self.pairs.iter()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for NameMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, pair) in self.pairs.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}={}", pair.original, pair.extracted)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a NameMapping {
    type Item = &'a MappingPair;
    type IntoIter = std::slice::Iter<'a, MappingPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl FromIterator<MappingPair> for NameMapping {
    fn from_iter<I: IntoIterator<Item = MappingPair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_splits_on_first_equals() {
        let mapping = NameMapping::parse("a.bin=a.bin\n b.bin = b_2.bin \nc=d=e");
        assert_eq!(
            mapping.pairs(),
            &[
                MappingPair::new("a.bin", "a.bin"),
                MappingPair::new("b.bin", "b_2.bin"),
                MappingPair::new("c", "d=e"),
            ]
        );
    }

    #[test]
    fn test_parse_ignores_lines_without_equals() {
        let mapping = NameMapping::parse("# comment\n\nx=y\r\nnot a pair\n");
        assert_eq!(mapping.pairs(), &[MappingPair::new("x", "y")]);
    }

    #[test]
    fn test_parse_skips_bom() {
        let mapping = NameMapping::parse("\u{feff}first.bin=first.bin");
        assert_eq!(mapping.pairs()[0].original, "first.bin");
    }

    #[test]
    fn test_render_has_no_trailing_newline() {
        let mut mapping = NameMapping::new();
        mapping.push("A.bin", "A.bin");
        mapping.push("A.bin", "A_2.bin");
        assert_eq!(mapping.render(), "A.bin=A.bin\nA.bin=A_2.bin");
        assert_eq!(NameMapping::parse(&mapping.render()), mapping);
    }

    #[test]
    fn test_read_write_folder() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        assert!(NameMapping::read_from(dir.path()).expect("readable").is_none());

        let mapping: NameMapping = [MappingPair::new("bgm", "bgm")].into_iter().collect();
        mapping.write_to(dir.path()).expect("Operation should succeed");

        assert!(NameMapping::exists_in(dir.path()));
        let read = NameMapping::read_from(dir.path())
            .expect("Operation should succeed")
            .expect("present");
        assert_eq!(read, mapping);
    }
}
