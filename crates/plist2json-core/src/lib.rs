//! # plist2json-core
//!
//! Pure-Rust decoder for Apple **property lists** and a JSON encoder for the
//! decoded tree.
//!
//! Property lists come in three serializations, all detected automatically:
//! binary (`bplist00`), XML, and OpenStep/GNUstep ASCII text (including
//! `.strings` files). Each decodes into the same [`PlistValue`] tree, which the
//! encoder turns into JSON. Data becomes base64 and dates become RFC 3339
//! strings, since JSON has neither type.
//!
//! ## Quick start
//!
//! ```rust
//! use plist2json_core::{convert, decode, to_json};
//!
//! let xml = br#"<plist version="1.0">
//!   <dict>
//!     <key>name</key><string>x</string>
//!     <key>tags</key><array><string>a</string><string>b</string></array>
//!     <key>count</key><integer>3</integer>
//!   </dict>
//! </plist>"#;
//!
//! let value = decode(xml).unwrap();
//! assert_eq!(value.as_dictionary().unwrap().len(), 3);
//! assert_eq!(
//!     to_json(&value).unwrap(),
//!     r#"{"name":"x","tags":["a","b"],"count":3}"#
//! );
//! assert_eq!(convert(xml).unwrap(), to_json(&value).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`decoder`]: bytes → [`PlistValue`] (`binary`, `xml`, `openstep`)
//! - [`encoder`]: [`PlistValue`] → JSON text
//! - [`convert`](mod@convert): both steps in one call
//! - [`value`]: the [`PlistValue`] tree and [`Dictionary`]
//! - [`error`]: [`DecodeError`], [`EncodeError`] and the umbrella [`Error`]

pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod value;

pub use convert::{convert, convert_with, ConvertOptions};
pub use decoder::{decode, decode_as, detect_format, Format};
pub use encoder::{to_json, to_json_value, to_json_with, EncodeOptions, ScalarStyle};
pub use error::{DecodeError, DecodeErrorKind, EncodeError, Error, Result};
pub use value::{Dictionary, PlistValue};
