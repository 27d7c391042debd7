//! The generic value tree shared by the decoders and the encoder.
//!
//! Every property-list serialization decodes into [`PlistValue`], and the JSON
//! encoder consumes nothing else. The enum is closed: adding a variant forces
//! every `match` in the encoder to handle it.

use chrono::{DateTime, Utc};

/// One node of a decoded property list.
///
/// Integers are kept as `i128` so both the signed 64-bit range and the
/// unsigned 64-bit values that binary plists store as 16-byte integers
/// survive decoding without loss.
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    /// Only the binary format can express this (marker `0x00`).
    Null,
    Boolean(bool),
    Integer(i128),
    Real(f64),
    String(String),
    Data(Vec<u8>),
    Date(DateTime<Utc>),
    Array(Vec<PlistValue>),
    Dictionary(Dictionary),
}

impl PlistValue {
    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PlistValue::Null => "null",
            PlistValue::Boolean(_) => "boolean",
            PlistValue::Integer(_) => "integer",
            PlistValue::Real(_) => "real",
            PlistValue::String(_) => "string",
            PlistValue::Data(_) => "data",
            PlistValue::Date(_) => "date",
            PlistValue::Array(_) => "array",
            PlistValue::Dictionary(_) => "dictionary",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlistValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            PlistValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            PlistValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            PlistValue::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            PlistValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            PlistValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            PlistValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, the root included.
    pub fn node_count(&self) -> usize {
        match self {
            PlistValue::Array(items) => 1 + items.iter().map(PlistValue::node_count).sum::<usize>(),
            PlistValue::Dictionary(dict) => {
                1 + dict.values().map(PlistValue::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl From<bool> for PlistValue {
    fn from(b: bool) -> Self {
        PlistValue::Boolean(b)
    }
}

impl From<i64> for PlistValue {
    fn from(i: i64) -> Self {
        PlistValue::Integer(i128::from(i))
    }
}

impl From<u64> for PlistValue {
    fn from(u: u64) -> Self {
        PlistValue::Integer(i128::from(u))
    }
}

impl From<f64> for PlistValue {
    fn from(r: f64) -> Self {
        PlistValue::Real(r)
    }
}

impl From<&str> for PlistValue {
    fn from(s: &str) -> Self {
        PlistValue::String(s.to_string())
    }
}

impl From<String> for PlistValue {
    fn from(s: String) -> Self {
        PlistValue::String(s)
    }
}

impl From<Vec<u8>> for PlistValue {
    fn from(d: Vec<u8>) -> Self {
        PlistValue::Data(d)
    }
}

impl From<DateTime<Utc>> for PlistValue {
    fn from(d: DateTime<Utc>) -> Self {
        PlistValue::Date(d)
    }
}

impl From<Vec<PlistValue>> for PlistValue {
    fn from(items: Vec<PlistValue>) -> Self {
        PlistValue::Array(items)
    }
}

impl From<Dictionary> for PlistValue {
    fn from(dict: Dictionary) -> Self {
        PlistValue::Dictionary(dict)
    }
}

/// String-keyed map that keeps keys in insertion order.
///
/// Stored as `Vec<(String, PlistValue)>`: plists are small enough that a
/// linear scan on lookup is fine, and decoders that need fast duplicate
/// detection keep their own index while building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, PlistValue)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Dictionary {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert `value` under `key`. An existing key keeps its position and
    /// has its value replaced; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: PlistValue) -> Option<PlistValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlistValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &PlistValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Append without checking for an existing key. Callers must already
    /// know `key` is absent.
    pub(crate) fn push_unique(&mut self, key: String, value: PlistValue) {
        self.entries.push((key, value));
    }

    /// Mutable access by position, used by decoders that track key indices.
    pub(crate) fn value_at_mut(&mut self, index: usize) -> Option<&mut PlistValue> {
        self.entries.get_mut(index).map(|(_, v)| v)
    }
}

impl<K: Into<String>> FromIterator<(K, PlistValue)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, PlistValue)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, PlistValue);
    type IntoIter = std::vec::IntoIter<(String, PlistValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a str, &'a PlistValue);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, PlistValue)>,
        fn(&'a (String, PlistValue)) -> (&'a str, &'a PlistValue),
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn split(entry: &(String, PlistValue)) -> (&str, &PlistValue) {
            (entry.0.as_str(), &entry.1)
        }
        self.entries.iter().map(split)
    }
}
