//! MSND builder

use crate::msnd::ChunkKind;
use crate::msnd::error::{MsndError, MsndResult};
use crate::msnd::header::MsndHeader;
use binrw::BinWrite;
use binrw::io::Cursor;

/// Builder for MSND containers
///
/// All three chunks must be supplied before building. The trailer defaults to
/// four zero bytes.
///
/// # Example
///
/// ```rust
/// use dsarc_formats::msnd::{self, ChunkKind, MsndBuilder};
///
/// let data = MsndBuilder::new()
///     .chunk(ChunkKind::Sseq, b"seq".to_vec())
///     .chunk(ChunkKind::Sbnk, b"bank".to_vec())
///     .chunk(ChunkKind::Swar, b"wave".to_vec())
///     .trailer(*b"\x01\x02\x03\x04")
///     .build()?;
///
/// let chunks = msnd::parse(&data, "bgm")?;
/// assert_eq!(chunks[0].name, "bgm.sseq");
/// assert_eq!(chunks[0].offset, 48);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MsndBuilder {
    chunks: [Option<Vec<u8>>; 3],
    trailer: [u8; 4],
}

impl MsndBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload of one chunk, replacing any previous payload
    pub fn chunk(mut self, kind: ChunkKind, data: Vec<u8>) -> Self {
        self.chunks[kind.index()] = Some(data);
        self
    }

    /// Set the opaque header trailer
    pub fn trailer(mut self, trailer: [u8; 4]) -> Self {
        self.trailer = trailer;
        self
    }

    /// Set the trailer from raw bytes
    ///
    /// Anything other than exactly four bytes leaves the trailer zeroed.
    pub fn trailer_bytes(self, bytes: Option<&[u8]>) -> Self {
        match bytes.and_then(|b| <[u8; 4]>::try_from(b).ok()) {
            Some(trailer) => self.trailer(trailer),
            None => self,
        }
    }

    /// Whether a chunk has been supplied
    pub fn has_chunk(&self, kind: ChunkKind) -> bool {
        self.chunks[kind.index()].is_some()
    }

    /// Build the container: header, then SSEQ, SBNK, SWAR back to back
    pub fn build(&self) -> MsndResult<Vec<u8>> {
        let mut payloads: [&[u8]; 3] = [&[]; 3];
        for kind in ChunkKind::ALL {
            payloads[kind.index()] = self.chunks[kind.index()]
                .as_deref()
                .ok_or(MsndError::MissingChunk(kind))?;
        }

        let header = MsndHeader::for_sizes(payloads.map(<[u8]>::len), self.trailer)?;

        let total = super::HEADER_SIZE + payloads.iter().map(|p| p.len()).sum::<usize>();
        let mut output = Vec::with_capacity(total);
        header.write(&mut Cursor::new(&mut output))?;
        for payload in payloads {
            output.extend_from_slice(payload);
        }

        Ok(output)
    }
}
