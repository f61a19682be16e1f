//! Shift-JIS text handling for element and animation names
//!
//! Names are stored NUL-terminated and padded to a 4-byte multiple. The
//! padding is always at least one byte, so a name whose length is already a
//! multiple of four gains four NULs.

use encoding_rs::SHIFT_JIS;

use crate::{Error, Result};

/// Name padding block size
pub const NAME_BLOCK: usize = 4;

/// Decode Shift-JIS bytes (without terminator)
pub fn decode(bytes: &[u8]) -> Result<String> {
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::MalformedInput(format!("invalid Shift-JIS text: {:02x?}", bytes)))
}

/// Encode text as Shift-JIS
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        return Err(Error::MalformedDocument(format!(
            "'{}' cannot be represented in Shift-JIS",
            text
        )));
    }
    Ok(bytes.into_owned())
}

/// Length of `byte_len` bytes once padded to the next multiple of `block`
pub fn padded_len(byte_len: usize, block: usize) -> usize {
    byte_len + (block - byte_len % block)
}

/// Right-pad text with spaces to the next multiple of `block` encoded bytes
pub fn pad_text(text: &str, block: usize) -> Result<String> {
    let byte_len = encode(text)?.len();
    let pad = padded_len(byte_len, block) - byte_len;
    Ok(format!("{}{}", text, " ".repeat(pad)))
}

/// Encode a name as it is stored: Shift-JIS with the padding as NUL bytes
///
/// Only the padding is substituted; spaces inside the name are kept.
pub fn encode_padded(text: &str, block: usize) -> Result<Vec<u8>> {
    let mut bytes = encode(text)?;
    let len = padded_len(bytes.len(), block);
    bytes.resize(len, 0);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_text() {
        assert_eq!(pad_text("Title", 4).unwrap(), "Title   ");
        assert_eq!(pad_text("abc", 4).unwrap(), "abc ");
        assert_eq!(pad_text("abcd", 4).unwrap(), "abcd    ");
        assert_eq!(pad_text("", 4).unwrap(), "    ");
    }

    #[test]
    fn test_encode_padded() {
        assert_eq!(
            encode_padded("Title", NAME_BLOCK).unwrap(),
            vec![0x54, 0x69, 0x74, 0x6c, 0x65, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_padded_keeps_inner_spaces() {
        let bytes = encode_padded("a b", NAME_BLOCK).unwrap();
        assert_eq!(bytes, b"a b\0");
    }

    #[test]
    fn test_multibyte_padding() {
        // Two characters, four bytes in Shift-JIS
        let bytes = encode_padded("ぷよ", NAME_BLOCK).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[4..], &[0, 0, 0, 0]);
        assert_eq!(decode(&bytes[..4]).unwrap(), "ぷよ");
    }

    #[test]
    fn test_unencodable_text() {
        assert!(matches!(encode("😀"), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(matches!(decode(&[0x81]), Err(Error::MalformedInput(_))));
    }
}
