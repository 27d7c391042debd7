//! Byte-to-text decoding for the textual formats.
//!
//! A byte-order mark selects UTF-8, UTF-16LE or UTF-16BE; without one the
//! input must be UTF-8. The BOM itself is not part of the returned text.

use std::borrow::Cow;

use crate::error::DecodeError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Decode raw bytes into text, borrowing when the input is already UTF-8.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return utf8(rest).map(Cow::Borrowed);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return utf16(rest, u16::from_le_bytes).map(Cow::Owned);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return utf16(rest, u16::from_be_bytes).map(Cow::Owned);
    }
    utf8(bytes).map(Cow::Borrowed)
}

fn utf8(bytes: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes)
        .map_err(|e| DecodeError::Encoding(format!("invalid UTF-8 at byte {}", e.valid_up_to())))
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::Encoding(
            "UTF-16 input has an odd number of bytes".to_string(),
        ));
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    decode_utf16_units(units)
}

/// Collect UTF-16 code units into a `String`, rejecting unpaired surrogates.
pub(crate) fn decode_utf16_units(
    units: impl IntoIterator<Item = u16>,
) -> Result<String, DecodeError> {
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| {
            DecodeError::Encoding(format!(
                "unpaired UTF-16 surrogate 0x{:04X}",
                e.unpaired_surrogate()
            ))
        })
}
