//! End-to-end conversion: property-list bytes → JSON text.

use crate::decoder::{self, Format};
use crate::encoder::{self, EncodeOptions};
use crate::error::Result;

/// Options for [`convert_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Force an input format; `None` sniffs the signature.
    pub format: Option<Format>,
    pub encode: EncodeOptions,
}

/// Convert a property list of any supported format to compact JSON.
///
/// ```
/// let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
/// <plist version="1.0"><dict><key>n</key><integer>1</integer></dict></plist>"#;
/// assert_eq!(plist2json_core::convert(xml).unwrap(), r#"{"n":1}"#);
/// ```
pub fn convert(bytes: &[u8]) -> Result<String> {
    convert_with(bytes, &ConvertOptions::default())
}

/// Convert with an explicit input format and/or encoder options.
pub fn convert_with(bytes: &[u8], options: &ConvertOptions) -> Result<String> {
    let value = match options.format {
        Some(format) => decoder::decode_as(bytes, format)?,
        None => decoder::decode(bytes)?,
    };
    let json = encoder::to_json_with(&value, &options.encode)?;
    Ok(json)
}
