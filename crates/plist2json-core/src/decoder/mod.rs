//! Property-list decoders: raw bytes → [`PlistValue`] tree.
//!
//! Three serializations are supported and told apart by their leading bytes:
//!
//! - [`binary`]: Apple `bplist00`
//! - [`xml`]: Apple XML plist (`<?xml ...?><plist>...</plist>`)
//! - [`openstep`]: NeXTSTEP/OpenStep ASCII plists, GNUstep typed extensions,
//!   and `.strings` files
//!
//! All decoders materialize the whole document and fail on the first error;
//! there is no partial-result mode.

pub mod binary;
pub mod openstep;
mod text;
pub mod xml;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::DecodeError;
use crate::value::{Dictionary, PlistValue};

/// Deepest container nesting any decoder accepts.
pub const MAX_DEPTH: usize = 512;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the plist epoch.
const PLIST_EPOCH_UNIX_SECONDS: i64 = 978_307_200;

/// A concrete property-list serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Binary,
    Xml,
    OpenStep,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Binary => "binary",
            Format::Xml => "xml",
            Format::OpenStep => "openstep",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bplist" => Ok(Format::Binary),
            "xml" => Ok(Format::Xml),
            "openstep" | "ascii" | "gnustep" => Ok(Format::OpenStep),
            other => Err(format!(
                "unknown format '{}' (expected binary, xml or openstep)",
                other
            )),
        }
    }
}

/// Decode a property list of any supported format, detected from its signature.
///
/// # Errors
/// Returns [`DecodeError::UnrecognizedFormat`] when no signature matches, and a
/// structural or encoding error when the body of the detected format is invalid.
pub fn decode(bytes: &[u8]) -> Result<PlistValue, DecodeError> {
    let format = detect_format(bytes)?;
    decode_as(bytes, format)
}

/// Decode `bytes` as the given format, skipping detection.
pub fn decode_as(bytes: &[u8], format: Format) -> Result<PlistValue, DecodeError> {
    tracing::debug!(format = %format, bytes = bytes.len(), "decoding property list");
    let value = match format {
        Format::Binary => binary::decode(bytes)?,
        Format::Xml => {
            let text = text::decode_text(bytes)?;
            xml::decode_str(&text)?
        }
        Format::OpenStep => {
            let text = text::decode_text(bytes)?;
            openstep::decode_str(&text)?
        }
    };
    tracing::debug!(
        root = value.kind(),
        nodes = value.node_count(),
        "decoded property list"
    );
    Ok(value)
}

/// Identify the serialization of `bytes` from its leading signature.
///
/// Binary plists are recognized by the `bplist` magic. Everything else is
/// decoded as text (BOM-aware) and classified by its first non-whitespace
/// character: markup (`<?`, `<!`, `<tag`) means XML, any character that can
/// start an OpenStep value means OpenStep. `<` followed only by hex digits up
/// to `>` is OpenStep data even when the first digit is a letter.
pub fn detect_format(bytes: &[u8]) -> Result<Format, DecodeError> {
    if bytes.starts_with(binary::MAGIC) {
        return Ok(Format::Binary);
    }
    let text = text::decode_text(bytes)?;
    let trimmed = text.trim_start();
    let mut chars = trimmed.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(DecodeError::UnrecognizedFormat("input is empty".to_string())),
    };
    if first == '<' {
        let markup = match chars.next() {
            Some('?' | '!') => true,
            // `<abcd>` is OpenStep hex data, `<dict>` is an element.
            Some(c) if c.is_ascii_alphabetic() => {
                !(c.is_ascii_hexdigit() && is_hex_data(chars.as_str()))
            }
            _ => false,
        };
        return Ok(if markup { Format::Xml } else { Format::OpenStep });
    }
    if openstep::can_start_value(first) {
        return Ok(Format::OpenStep);
    }
    Err(DecodeError::UnrecognizedFormat(format!(
        "unexpected leading character {:?}",
        first
    )))
}

/// Whether the text after `<x` continues as hex digits and whitespace up to
/// the closing `>` of an OpenStep data value.
fn is_hex_data(rest: &str) -> bool {
    match rest.find('>') {
        Some(end) => rest[..end]
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c.is_whitespace()),
        None => false,
    }
}

/// Convert seconds relative to the plist epoch into an absolute instant.
///
/// Returns `None` for non-finite input or instants chrono cannot represent.
pub(crate) fn date_from_plist_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    // Beyond ±2^62 seconds nothing is representable anyway.
    if whole.abs() > 4.6e18 {
        return None;
    }
    let mut secs = whole as i64;
    let mut nanos = ((seconds - whole) * 1e9).round() as i64;
    if nanos >= 1_000_000_000 {
        secs = secs.checked_add(1)?;
        nanos -= 1_000_000_000;
    }
    let unix = secs.checked_add(PLIST_EPOCH_UNIX_SECONDS)?;
    DateTime::from_timestamp(unix, u32::try_from(nanos).ok()?)
}

/// Builds a [`Dictionary`] with constant-time duplicate detection.
///
/// A repeated key keeps its first position and takes the newest value.
pub(crate) struct DictionaryBuilder {
    dict: Dictionary,
    index: HashMap<String, usize>,
}

impl DictionaryBuilder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        DictionaryBuilder {
            dict: Dictionary::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert an entry; returns `true` when `key` was already present.
    pub(crate) fn insert(&mut self, key: String, value: PlistValue) -> bool {
        if let Some(&position) = self.index.get(&key) {
            if let Some(slot) = self.dict.value_at_mut(position) {
                *slot = value;
            }
            tracing::warn!(key = %key, "duplicate dictionary key, keeping the last value");
            return true;
        }
        self.index.insert(key.clone(), self.dict.len());
        self.dict.push_unique(key, value);
        false
    }

    pub(crate) fn finish(self) -> Dictionary {
        self.dict
    }
}
