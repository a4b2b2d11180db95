//! Fixed-width entry names and magic-based extension guessing

/// Width of the name field in a DSARC record
pub const NAME_SIZE: usize = 40;

/// SWAV single-wave payload magic
pub const MAGIC_SWAV: [u8; 4] = *b"SWAV";

/// STRM stream payload magic
pub const MAGIC_STRM: [u8; 4] = *b"STRM";

/// Encode a name into the fixed 40-byte NUL-padded field
///
/// Names longer than the field are cut at the last UTF-8 character boundary
/// that fits.
pub fn pad_name(name: &str) -> [u8; NAME_SIZE] {
    let mut end = name.len().min(NAME_SIZE);
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    let mut field = [0u8; NAME_SIZE];
    field[..end].copy_from_slice(&name.as_bytes()[..end]);
    field
}

/// Decode a NUL-padded name field
///
/// The name ends at the first NUL. Invalid UTF-8 is replaced rather than
/// rejected. An empty result becomes the positional placeholder `file_<index>`.
pub fn decode_name(field: &[u8], index: usize) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let name = String::from_utf8_lossy(&field[..end]).trim().to_string();

    if name.is_empty() {
        format!("file_{index}")
    } else {
        name
    }
}

/// Guess a file extension from a payload's leading magic
///
/// Returns `default_ext` unchanged when the payload is shorter than four bytes
/// or its magic is not one of the recognized sub-payload types.
pub fn guess_extension<'a>(data: &[u8], default_ext: &'a str) -> &'a str {
    match data.get(..4) {
        Some(magic) if magic == MAGIC_SWAV => ".swav",
        Some(magic) if magic == MAGIC_STRM => ".strm",
        _ => default_ext,
    }
}

/// Split a name into `(stem, extension)` where the extension keeps its dot
///
/// Only the final path component is considered, so `bgm/title.sdat` yields
/// `("title", ".sdat")`. Leading-dot names such as `.hidden` have no extension.
pub fn split_name(name: &str) -> (&str, &str) {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);

    match file_name.rfind('.') {
        Some(0) | None => (file_name, ""),
        Some(dot) => (&file_name[..dot], &file_name[dot..]),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_name_short() {
        let field = pad_name("bgm.bin");
        assert_eq!(&field[..7], b"bgm.bin");
        assert!(field[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pad_name_truncates_on_char_boundary() {
        // 39 ASCII bytes followed by a two-byte character
        let name = format!("{}é", "a".repeat(39));
        let field = pad_name(&name);
        assert_eq!(&field[..39], "a".repeat(39).as_bytes());
        assert_eq!(field[39], 0);
    }

    #[test]
    fn test_decode_name() {
        let field = pad_name("voice_01.sdat");
        assert_eq!(decode_name(&field, 0), "voice_01.sdat");
    }

    #[test]
    fn test_decode_empty_name_uses_placeholder() {
        assert_eq!(decode_name(&[0u8; NAME_SIZE], 7), "file_7");
    }

    #[test]
    fn test_decode_stops_at_first_nul() {
        let mut field = [0u8; NAME_SIZE];
        field[..3].copy_from_slice(b"abc");
        field[4..7].copy_from_slice(b"xyz");
        assert_eq!(decode_name(&field, 0), "abc");
    }

    #[test]
    fn test_guess_extension() {
        assert_eq!(guess_extension(b"SWAV\0\0\0\0", ".bin"), ".swav");
        assert_eq!(guess_extension(b"STRM", ".bin"), ".strm");
        assert_eq!(guess_extension(b"SWAR", ".bin"), ".bin");
        assert_eq!(guess_extension(b"SW", ".bin"), ".bin");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("A.bin"), ("A", ".bin"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name("bgm/title.sdat"), ("title", ".sdat"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }
}
