//! Error types for property-list decoding and JSON encoding.

use thiserror::Error;

/// Errors raised while turning raw bytes into a [`PlistValue`](crate::PlistValue) tree.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input does not start with the signature of any supported serialization.
    #[error("unrecognized property list format: {0}")]
    UnrecognizedFormat(String),

    /// The binary input ends before a structure it declares.
    #[error("truncated binary property list: needed {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    /// A binary structure is inconsistent (bad offsets, lengths, markers, trailer).
    #[error("corrupt binary property list at offset {offset}: {message}")]
    Corrupt { offset: usize, message: String },

    /// Bytes that should be text are not valid in their declared encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Malformed XML property list. `line` is 1-based.
    #[error("XML property list error at line {line}: {message}")]
    Xml { line: usize, message: String },

    /// Malformed OpenStep/GNUstep text property list. `line` is 1-based.
    #[error("text property list error at line {line}: {message}")]
    Text { line: usize, message: String },

    /// A dictionary key decoded to something other than a string.
    #[error("dictionary key must be a string, found {kind}")]
    NonStringKey { kind: &'static str },

    /// A binary object reference points back at one of its own ancestors.
    #[error("binary property list object {object} references itself")]
    Cycle { object: u64 },

    /// Containers are nested deeper than the decoder accepts.
    #[error("nesting exceeds the maximum depth of {limit}")]
    DepthLimit { limit: usize },
}

/// Coarse classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// No supported format signature was found.
    UnrecognizedFormat,
    /// The format was recognized but its body is structurally invalid.
    Structure,
    /// Text content violates its character encoding.
    Encoding,
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::UnrecognizedFormat(_) => DecodeErrorKind::UnrecognizedFormat,
            DecodeError::Encoding(_) => DecodeErrorKind::Encoding,
            DecodeError::Truncated { .. }
            | DecodeError::Corrupt { .. }
            | DecodeError::Xml { .. }
            | DecodeError::Text { .. }
            | DecodeError::NonStringKey { .. }
            | DecodeError::Cycle { .. }
            | DecodeError::DepthLimit { .. } => DecodeErrorKind::Structure,
        }
    }

    pub(crate) fn corrupt(offset: usize, message: impl Into<String>) -> Self {
        DecodeError::Corrupt {
            offset,
            message: message.into(),
        }
    }
}

/// Errors raised while rendering a [`PlistValue`](crate::PlistValue) tree as JSON.
///
/// `path` locates the offending value, e.g. `$.items[2].ratio`.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// NaN and the infinities have no JSON number form.
    #[error("cannot encode non-finite real {value} at {path}")]
    NonFiniteReal { path: String, value: f64 },

    /// The integer fits neither `i64` nor `u64`.
    #[error("integer {value} at {path} is outside the 64-bit range")]
    IntegerOutOfRange { path: String, value: i128 },

    /// `serde_json` failed to render the encoded value.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any failure of the end-to-end conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be read as a property list.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The decoded tree has no JSON form.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Convenience alias used by the conversion entry points.
pub type Result<T> = std::result::Result<T, Error>;
