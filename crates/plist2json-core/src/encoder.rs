//! JSON encoder: [`PlistValue`] tree → JSON text.
//!
//! The mapping from property-list types to JSON:
//!
//! | PlistValue   | JSON                                                  |
//! |--------------|-------------------------------------------------------|
//! | `Null`       | `null`                                                |
//! | `Boolean`    | `true` / `false`                                      |
//! | `Integer`    | number (must fit `i64` or `u64`)                      |
//! | `Real`       | number (NaN and infinities are rejected)              |
//! | `String`     | string                                                |
//! | `Data`       | base64 string, or `{"__type":"data","value":...}`     |
//! | `Date`       | RFC 3339 UTC string, or `{"__type":"date","value":...}` |
//! | `Array`      | array, order preserved                                |
//! | `Dictionary` | object, key order preserved                           |
//!
//! Data and Date have no JSON counterpart. In the default
//! [`ScalarStyle::Plain`] they become plain strings, which is lossy: parsing the
//! JSON back yields a string, not bytes or an instant. [`ScalarStyle::Tagged`]
//! wraps them in a small tagged object instead.
//!
//! # Example
//! ```
//! use plist2json_core::{to_json, Dictionary, PlistValue};
//!
//! let mut dict = Dictionary::new();
//! dict.insert("name", PlistValue::from("x"));
//! dict.insert("count", PlistValue::from(3i64));
//! assert_eq!(to_json(&PlistValue::Dictionary(dict)).unwrap(), r#"{"name":"x","count":3}"#);
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::EncodeError;
use crate::value::PlistValue;

/// How values without a JSON counterpart (Data, Date) are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Base64 string for Data, RFC 3339 string for Date.
    #[default]
    Plain,
    /// `{"__type":"data"|"date","value":"..."}` objects.
    Tagged,
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Indented multi-line output instead of compact output.
    pub pretty: bool,
    pub scalars: ScalarStyle,
}

/// Encode a value tree as compact JSON with default options.
pub fn to_json(value: &PlistValue) -> Result<String, EncodeError> {
    to_json_with(value, &EncodeOptions::default())
}

/// Encode a value tree as JSON text.
///
/// # Errors
/// Fails with [`EncodeError::NonFiniteReal`] or
/// [`EncodeError::IntegerOutOfRange`] when a value has no valid JSON form.
/// Nothing is produced on failure.
pub fn to_json_with(value: &PlistValue, options: &EncodeOptions) -> Result<String, EncodeError> {
    let json = to_json_value(value, options)?;
    let text = if options.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    Ok(text)
}

/// Encode a value tree into a `serde_json::Value`.
pub fn to_json_value(value: &PlistValue, options: &EncodeOptions) -> Result<Value, EncodeError> {
    let mut path = Vec::new();
    encode_value(value, options.scalars, &mut path)
}

/// Tagged form of the scalars JSON cannot express natively.
#[derive(Serialize)]
#[serde(tag = "__type", rename_all = "lowercase")]
enum TaggedScalar {
    Data { value: String },
    Date { value: String },
}

/// One step from the root to the value being encoded.
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn encode_value<'a>(
    value: &'a PlistValue,
    style: ScalarStyle,
    path: &mut Vec<Segment<'a>>,
) -> Result<Value, EncodeError> {
    match value {
        PlistValue::Null => Ok(Value::Null),
        PlistValue::Boolean(b) => Ok(Value::Bool(*b)),
        PlistValue::Integer(i) => encode_integer(*i).ok_or_else(|| EncodeError::IntegerOutOfRange {
            path: render_path(path.as_slice()),
            value: *i,
        }),
        PlistValue::Real(r) => {
            Number::from_f64(*r)
                .map(Value::Number)
                .ok_or_else(|| EncodeError::NonFiniteReal {
                    path: render_path(path.as_slice()),
                    value: *r,
                })
        }
        PlistValue::String(s) => Ok(Value::String(s.clone())),
        PlistValue::Data(bytes) => {
            let text = STANDARD.encode(bytes);
            match style {
                ScalarStyle::Plain => Ok(Value::String(text)),
                ScalarStyle::Tagged => {
                    Ok(serde_json::to_value(TaggedScalar::Data { value: text })?)
                }
            }
        }
        PlistValue::Date(date) => {
            let text = format_date(date);
            match style {
                ScalarStyle::Plain => Ok(Value::String(text)),
                ScalarStyle::Tagged => {
                    Ok(serde_json::to_value(TaggedScalar::Date { value: text })?)
                }
            }
        }
        PlistValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                out.push(encode_value(item, style, path)?);
                path.pop();
            }
            Ok(Value::Array(out))
        }
        PlistValue::Dictionary(dict) => {
            // `preserve_order` keeps insertion order in the output object.
            let mut map = Map::with_capacity(dict.len());
            for (key, item) in dict {
                path.push(Segment::Key(key));
                let encoded = encode_value(item, style, path)?;
                path.pop();
                map.insert(key.to_string(), encoded);
            }
            Ok(Value::Object(map))
        }
    }
}

fn encode_integer(i: i128) -> Option<Value> {
    if let Ok(signed) = i64::try_from(i) {
        return Some(Value::from(signed));
    }
    u64::try_from(i).ok().map(Value::from)
}

/// RFC 3339 in UTC with a `Z` suffix; fractional seconds only when non-zero.
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Render a path like `$.items[2]["odd key"]` for diagnostics.
fn render_path(path: &[Segment<'_>]) -> String {
    let mut out = String::from("$");
    for segment in path {
        match segment {
            Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            Segment::Key(key) if is_plain_key(key) => {
                out.push('.');
                out.push_str(key);
            }
            Segment::Key(key) => {
                out.push('[');
                out.push_str(&Value::String((*key).to_string()).to_string());
                out.push(']');
            }
        }
    }
    out
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
