//! Logical entry model shared by both container formats

use crate::msnd::ChunkKind;
use crate::names::split_name;
use std::ops::Range;

/// One logical item inside a container
///
/// `offset` and `size` locate the payload inside the *containing* buffer: the
/// archive file for DSARC entries, the parent MSND payload for MSND chunks.
/// Parsers guarantee `offset + size` never exceeds that buffer's length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    /// Stored name (DSARC) or synthesized `<base>.<ext>` name (MSND chunk)
    pub name: String,
    /// Payload length in bytes
    pub size: u32,
    /// Absolute payload offset within the containing buffer
    pub offset: u32,
    /// Payload was sniffed as MSND and decoded into `children`
    pub is_embedded_container: bool,
    /// Decoded MSND chunks in SSEQ, SBNK, SWAR order
    pub children: Vec<Entry>,
}

impl Entry {
    /// Create a leaf entry
    pub fn new(name: impl Into<String>, size: u32, offset: u32) -> Self {
        Self {
            name: name.into(),
            size,
            offset,
            is_embedded_container: false,
            children: Vec::new(),
        }
    }

    /// Create an entry for an embedded MSND with its three chunks
    pub fn with_children(
        name: impl Into<String>,
        size: u32,
        offset: u32,
        children: Vec<Self>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            offset,
            is_embedded_container: true,
            children,
        }
    }

    /// Name without directories and extension
    pub fn stem(&self) -> &str {
        split_name(&self.name).0
    }

    /// Extension including the dot, or an empty string
    pub fn extension(&self) -> &str {
        split_name(&self.name).1
    }

    /// Final path component of the name
    pub fn file_name(&self) -> &str {
        self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name)
    }

    /// Byte range of the payload within the containing buffer
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.size as usize
    }

    /// Payload bytes, or `None` when the range falls outside `buffer`
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        buffer.get(self.range())
    }

    /// Child chunk of an embedded MSND
    pub fn child(&self, kind: ChunkKind) -> Option<&Self> {
        self.children.get(kind.index())
    }

    /// Chunk kind of an MSND child, derived from its extension
    pub fn chunk_kind(&self) -> Option<ChunkKind> {
        ChunkKind::from_extension(self.extension())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names() {
        let entry = Entry::new("sound/bgm_01.sdat", 4, 0);
        assert_eq!(entry.stem(), "bgm_01");
        assert_eq!(entry.extension(), ".sdat");
        assert_eq!(entry.file_name(), "bgm_01.sdat");
    }

    #[test]
    fn test_entry_slice() {
        let buffer = b"0123456789";
        let entry = Entry::new("a", 3, 2);
        assert_eq!(entry.range(), 2..5);
        assert_eq!(entry.slice(buffer), Some(&b"234"[..]));

        let past_end = Entry::new("b", 4, 8);
        assert_eq!(past_end.slice(buffer), None);
    }

    #[test]
    fn test_entry_chunk_kind() {
        assert_eq!(Entry::new("x.SBNK", 0, 0).chunk_kind(), Some(ChunkKind::Sbnk));
        assert_eq!(Entry::new("x.bin", 0, 0).chunk_kind(), None);
    }
}
