//! XML property-list decoder.
//!
//! `quick-xml` tokenizes the document (entities, CDATA, comments, processing
//! instructions and the DOCTYPE included) and a recursive parser builds the
//! value tree from its start/end/text events. Attributes are ignored.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;

use crate::decoder::{DictionaryBuilder, MAX_DEPTH};
use crate::error::DecodeError;
use crate::value::PlistValue;

/// `<data>` payloads are accepted with or without trailing padding.
const DATA_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode an XML property list that has already been decoded to text.
pub fn decode_str(text: &str) -> Result<PlistValue, DecodeError> {
    if !text.trim_start().starts_with('<') {
        return Err(DecodeError::UnrecognizedFormat(
            "XML property list must start with markup".to_string(),
        ));
    }
    let mut parser = Parser {
        lexer: Lexer::new(text),
    };
    parser.parse_document()
}

/// Markup the parser cares about. Declarations, processing instructions,
/// comments and the DOCTYPE never reach it.
#[derive(Debug)]
enum Event {
    Start { name: String, empty: bool },
    End { name: String },
    Text(String),
    Eof,
}

/// Adapter over the `quick-xml` pull reader that tracks line numbers.
struct Lexer<'a> {
    src: &'a str,
    reader: Reader<&'a [u8]>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            reader: Reader::from_str(src),
        }
    }

    /// 1-based line of the reader position.
    fn line(&self) -> usize {
        let pos = usize::try_from(self.reader.buffer_position())
            .unwrap_or(usize::MAX)
            .min(self.src.len());
        1 + self.src.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count()
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Xml {
            line: self.line(),
            message: message.into(),
        }
    }

    fn next_event(&mut self) -> Result<Event, DecodeError> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.error(e.to_string()))?;
            return match event {
                XmlEvent::Start(e) => Ok(Event::Start {
                    name: self.element_name(e.name().as_ref())?,
                    empty: false,
                }),
                XmlEvent::Empty(e) => Ok(Event::Start {
                    name: self.element_name(e.name().as_ref())?,
                    empty: true,
                }),
                XmlEvent::End(e) => Ok(Event::End {
                    name: self.element_name(e.name().as_ref())?,
                }),
                XmlEvent::Text(e) => {
                    let text = e.unescape().map_err(|err| self.error(err.to_string()))?;
                    self.text(text.into_owned())
                }
                XmlEvent::CData(e) => {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|_| self.error("CDATA section is not valid UTF-8"))?;
                    self.text(text)
                }
                XmlEvent::Eof => Ok(Event::Eof),
                _ => continue,
            };
        }
    }

    fn element_name(&self, raw: &[u8]) -> Result<String, DecodeError> {
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| self.error("element name is not valid UTF-8"))
    }

    /// XML forbids NUL anywhere, including through `&#0;`.
    fn text(&self, text: String) -> Result<Event, DecodeError> {
        if text.contains('\0') {
            return Err(self.error("NUL character is not allowed in XML"));
        }
        Ok(Event::Text(text))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> DecodeError {
        self.lexer.error(message)
    }

    /// Next event that is not whitespace-only text. Other text is an error
    /// because containers hold only elements.
    fn next_markup(&mut self) -> Result<Event, DecodeError> {
        loop {
            match self.lexer.next_event()? {
                Event::Text(t) if t.trim().is_empty() => continue,
                Event::Text(t) => {
                    return Err(self.error(format!("unexpected text {:?}", t.trim())))
                }
                other => return Ok(other),
            }
        }
    }

    fn parse_document(&mut self) -> Result<PlistValue, DecodeError> {
        let value = match self.next_markup()? {
            Event::Start { name, empty: true } if name == "plist" => {
                return Err(self.error("<plist> element is empty"))
            }
            Event::Start { name, empty: false } if name == "plist" => {
                let value = match self.next_markup()? {
                    Event::Start { name, empty } => self.parse_value(&name, empty, 0)?,
                    Event::End { name } if name == "plist" => {
                        return Err(self.error("<plist> element is empty"))
                    }
                    other => return Err(self.unexpected(&other, "a value element")),
                };
                match self.next_markup()? {
                    Event::End { name } if name == "plist" => value,
                    other => return Err(self.unexpected(&other, "</plist>")),
                }
            }
            Event::Start { name, empty } => self.parse_value(&name, empty, 0)?,
            other => return Err(self.unexpected(&other, "<plist>")),
        };
        match self.next_markup()? {
            Event::Eof => Ok(value),
            other => Err(self.unexpected(&other, "end of document")),
        }
    }

    fn unexpected(&self, event: &Event, expected: &str) -> DecodeError {
        let found = match event {
            Event::Start { name, .. } => format!("<{}>", name),
            Event::End { name } => format!("</{}>", name),
            Event::Text(t) => format!("text {:?}", t),
            Event::Eof => "end of document".to_string(),
        };
        self.error(format!("expected {}, found {}", expected, found))
    }

    fn parse_value(
        &mut self,
        name: &str,
        empty: bool,
        depth: usize,
    ) -> Result<PlistValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimit { limit: MAX_DEPTH });
        }
        match name {
            "dict" => self.parse_dict(empty, depth),
            "array" => self.parse_array(empty, depth),
            "string" | "key" => Ok(PlistValue::String(self.element_text(name, empty)?)),
            "integer" => {
                let text = self.element_text(name, empty)?;
                parse_integer(text.trim())
                    .map(PlistValue::Integer)
                    .ok_or_else(|| self.error(format!("invalid integer {:?}", text.trim())))
            }
            "real" => {
                let text = self.element_text(name, empty)?;
                text.trim()
                    .parse::<f64>()
                    .map(PlistValue::Real)
                    .map_err(|_| self.error(format!("invalid real {:?}", text.trim())))
            }
            "true" | "false" => {
                let text = self.element_text(name, empty)?;
                if !text.trim().is_empty() {
                    return Err(self.error(format!("<{}> must be empty", name)));
                }
                Ok(PlistValue::Boolean(name == "true"))
            }
            "date" => {
                let text = self.element_text(name, empty)?;
                parse_date(text.trim())
                    .map(PlistValue::Date)
                    .ok_or_else(|| self.error(format!("invalid date {:?}", text.trim())))
            }
            "data" => {
                let text = self.element_text(name, empty)?;
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                DATA_ENGINE
                    .decode(compact.as_bytes())
                    .map(PlistValue::Data)
                    .map_err(|e| self.error(format!("invalid base64 in <data>: {}", e)))
            }
            other => Err(self.error(format!("unknown element <{}>", other))),
        }
    }

    fn parse_dict(&mut self, empty: bool, depth: usize) -> Result<PlistValue, DecodeError> {
        let mut builder = DictionaryBuilder::with_capacity(0);
        if empty {
            return Ok(PlistValue::Dictionary(builder.finish()));
        }
        loop {
            let key = match self.next_markup()? {
                Event::End { name } if name == "dict" => break,
                Event::Start { name, empty } if name == "key" => self.element_text(&name, empty)?,
                other => return Err(self.unexpected(&other, "<key> or </dict>")),
            };
            let value = match self.next_markup()? {
                Event::Start { name, empty } => self.parse_value(&name, empty, depth + 1)?,
                other => {
                    return Err(self.unexpected(&other, &format!("a value for key {:?}", key)))
                }
            };
            builder.insert(key, value);
        }
        Ok(PlistValue::Dictionary(builder.finish()))
    }

    fn parse_array(&mut self, empty: bool, depth: usize) -> Result<PlistValue, DecodeError> {
        let mut items = Vec::new();
        if empty {
            return Ok(PlistValue::Array(items));
        }
        loop {
            match self.next_markup()? {
                Event::End { name } if name == "array" => break,
                Event::Start { name, empty } => {
                    items.push(self.parse_value(&name, empty, depth + 1)?)
                }
                other => return Err(self.unexpected(&other, "a value or </array>")),
            }
        }
        Ok(PlistValue::Array(items))
    }

    /// Concatenated text content of a leaf element up to its closing tag.
    fn element_text(&mut self, name: &str, empty: bool) -> Result<String, DecodeError> {
        let mut text = String::new();
        if empty {
            return Ok(text);
        }
        loop {
            match self.lexer.next_event()? {
                Event::Text(t) => text.push_str(&t),
                Event::End { name: end } if end == name => return Ok(text),
                other => return Err(self.unexpected(&other, &format!("</{}>", name))),
            }
        }
    }
}

/// Decimal or `0x` hexadecimal integer with an optional sign, limited to the
/// union of the `i64` and `u64` ranges.
fn parse_integer(text: &str) -> Option<i128> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => {
            // `from_str_radix` would accept a sign after the prefix.
            if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            u64::from_str_radix(hex, 16).ok()?
        }
        None => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse::<u64>().ok()?
        }
    };
    let value = i128::from(magnitude);
    if negative {
        let value = -value;
        (value >= i128::from(i64::MIN)).then_some(value)
    } else {
        Some(value)
    }
}

/// ISO 8601 instant. A missing zone designator is read as UTC.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
