//! OpenStep (NeXTSTEP ASCII) property-list decoder.
//!
//! Grammar, with `//` and `/* */` comments allowed between tokens:
//!
//! ```text
//! value  := dict | array | data | string | gnustep
//! dict   := '{' (string '=' value ';')* '}'
//! array  := '(' (value (',' value)* ','?)? ')'
//! data   := '<' hex-digit-pairs '>'
//! string := quoted | unquoted
//! gnustep:= '<*I' int '>' | '<*R' real '>' | '<*B' ('Y'|'N') '>' | '<*D' date '>'
//! ```
//!
//! A document whose top level is a sequence of `key = value;` pairs with no
//! enclosing braces is a `.strings` file and decodes as a dictionary.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::decoder::{text, DictionaryBuilder, MAX_DEPTH};
use crate::error::DecodeError;
use crate::value::{Dictionary, PlistValue};

/// Decode an OpenStep/GNUstep/`.strings` property list from text.
pub fn decode_str(text: &str) -> Result<PlistValue, DecodeError> {
    let mut scanner = Scanner::new(text);
    scanner.skip_trivia()?;
    if scanner.peek().is_none() {
        // A .strings file with nothing but comments.
        return Ok(PlistValue::Dictionary(Dictionary::new()));
    }

    let root = scanner.parse_value(0)?;
    scanner.skip_trivia()?;
    match (scanner.peek(), root) {
        (None, root) => Ok(root),
        (Some('=') | Some(';'), PlistValue::String(first_key)) => {
            scanner.parse_strings_file(first_key).map(PlistValue::Dictionary)
        }
        (Some(c), _) => Err(scanner.error(format!("unexpected {:?} after root value", c))),
    }
}

/// Whether `c` can begin an OpenStep document (value or comment).
pub(crate) fn can_start_value(c: char) -> bool {
    matches!(c, '{' | '(' | '<' | '"' | '\'') || is_unquoted_char(c)
}

fn is_unquoted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-')
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0, line: 1 }
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Text {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), DecodeError> {
        self.skip_trivia()?;
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected {:?}, found {:?}", want, c))),
            None => Err(self.error(format!("expected {:?}, found end of input", want))),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), DecodeError> {
        let src = self.src;
        loop {
            let rest = &src[self.pos..];
            if rest.starts_with("//") {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if rest.starts_with("/*") {
                let start_line = self.line;
                let end = rest.find("*/").ok_or(DecodeError::Text {
                    line: start_line,
                    message: "unterminated block comment".to_string(),
                })?;
                for _ in rest[..end + 2].chars() {
                    self.bump();
                }
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<PlistValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimit { limit: MAX_DEPTH });
        }
        self.skip_trivia()?;
        match self.peek() {
            Some('{') => {
                self.bump();
                self.parse_dict_body(depth).map(PlistValue::Dictionary)
            }
            Some('(') => {
                self.bump();
                self.parse_array_body(depth)
            }
            Some('<') => {
                self.bump();
                if self.peek() == Some('*') {
                    self.bump();
                    self.parse_gnustep()
                } else {
                    self.parse_data()
                }
            }
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.parse_quoted(q).map(PlistValue::String)
            }
            Some(c) if is_unquoted_char(c) => Ok(PlistValue::String(self.parse_unquoted())),
            Some(c) => Err(self.error(format!("unexpected character {:?}", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_key(&mut self, depth: usize) -> Result<String, DecodeError> {
        match self.parse_value(depth + 1)? {
            PlistValue::String(s) => Ok(s),
            other => Err(DecodeError::NonStringKey { kind: other.kind() }),
        }
    }

    /// Body of a `{ ... }` dictionary; the opening brace is already consumed.
    fn parse_dict_body(&mut self, depth: usize) -> Result<Dictionary, DecodeError> {
        let mut builder = DictionaryBuilder::with_capacity(0);
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(builder.finish());
                }
                None => return Err(self.error("unterminated dictionary")),
                Some(_) => {
                    let key = self.parse_key(depth)?;
                    self.expect('=')?;
                    let value = self.parse_value(depth + 1)?;
                    self.expect(';')?;
                    builder.insert(key, value);
                }
            }
        }
    }

    /// Body of a `( ... )` array; the opening parenthesis is already consumed.
    fn parse_array_body(&mut self, depth: usize) -> Result<PlistValue, DecodeError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(')') {
                self.bump();
                return Ok(PlistValue::Array(items));
            }
            items.push(self.parse_value(depth + 1)?);
            self.skip_trivia()?;
            match self.bump() {
                Some(',') => {}
                Some(')') => return Ok(PlistValue::Array(items)),
                Some(c) => return Err(self.error(format!("expected ',' or ')', found {:?}", c))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    /// Top level of a `.strings` file whose first key was already read.
    fn parse_strings_file(&mut self, first_key: String) -> Result<Dictionary, DecodeError> {
        let mut builder = DictionaryBuilder::with_capacity(0);
        let mut key = first_key;
        loop {
            self.skip_trivia()?;
            let value = if self.peek() == Some(';') {
                // `"key";` is shorthand for `"key" = "key";`
                PlistValue::String(key.clone())
            } else {
                self.expect('=')?;
                self.parse_value(1)?
            };
            self.expect(';')?;
            builder.insert(key, value);

            self.skip_trivia()?;
            if self.peek().is_none() {
                return Ok(builder.finish());
            }
            key = self.parse_key(0)?;
        }
    }

    fn parse_unquoted(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_unquoted_char) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    /// Quoted string body; the opening quote is already consumed.
    fn parse_quoted(&mut self, quote: char) -> Result<String, DecodeError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated quoted string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char, DecodeError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        Ok(match c {
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            'U' | 'u' => {
                // Each escape is one UTF-16 unit; non-BMP characters arrive
                // as an escaped surrogate pair.
                let first = self.parse_utf16_unit()?;
                let mut units = vec![first];
                let rest = &self.src[self.pos..];
                let low_follows = rest.starts_with("\\U") || rest.starts_with("\\u");
                if (0xD800..=0xDBFF).contains(&first) && low_follows {
                    self.bump();
                    self.bump();
                    units.push(self.parse_utf16_unit()?);
                }
                text::decode_utf16_units(units)
                    .ok()
                    .and_then(|decoded| decoded.chars().next())
                    .ok_or_else(|| {
                        self.error(format!("unpaired surrogate \\U{:04X} in escape", first))
                    })?
            }
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            self.bump();
                            code = code * 8 + digit;
                        }
                        None => break,
                    }
                }
                char::from_u32(code)
                    .ok_or_else(|| self.error(format!("invalid octal escape {:o}", code)))?
            }
            // \\, \", \' and any other escaped character stand for themselves.
            other => other,
        })
    }

    /// Four hex digits of a `\U` escape.
    fn parse_utf16_unit(&mut self) -> Result<u16, DecodeError> {
        let mut unit = 0u16;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| self.error("\\U escape needs four hex digits"))?;
            unit = unit * 16 + digit as u16;
        }
        Ok(unit)
    }

    /// `<hex>` data; the `<` is already consumed.
    fn parse_data(&mut self) -> Result<PlistValue, DecodeError> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated data")),
                Some('>') => break,
                Some(c) if c.is_whitespace() => {}
                Some(c) => {
                    let nibble = c
                        .to_digit(16)
                        .ok_or_else(|| self.error(format!("invalid hex digit {:?} in data", c)))?
                        as u8;
                    match high.take() {
                        Some(h) => bytes.push(h << 4 | nibble),
                        None => high = Some(nibble),
                    }
                }
            }
        }
        if high.is_some() {
            return Err(self.error("data has an odd number of hex digits"));
        }
        Ok(PlistValue::Data(bytes))
    }

    /// GNUstep typed scalar; `<*` is already consumed.
    fn parse_gnustep(&mut self) -> Result<PlistValue, DecodeError> {
        let tag = self
            .bump()
            .ok_or_else(|| self.error("unterminated GNUstep value"))?;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '>') {
            self.bump();
        }
        if self.bump() != Some('>') {
            return Err(self.error("unterminated GNUstep value"));
        }
        let body = self.src[start..self.pos - 1].trim();
        match tag {
            'I' => body
                .parse::<i128>()
                .ok()
                .filter(|i| *i >= i128::from(i64::MIN) && *i <= i128::from(u64::MAX))
                .map(PlistValue::Integer)
                .ok_or_else(|| self.error(format!("invalid GNUstep integer {:?}", body))),
            'R' => body
                .parse::<f64>()
                .map(PlistValue::Real)
                .map_err(|_| self.error(format!("invalid GNUstep real {:?}", body))),
            'B' => match body {
                "Y" => Ok(PlistValue::Boolean(true)),
                "N" => Ok(PlistValue::Boolean(false)),
                _ => Err(self.error(format!("invalid GNUstep boolean {:?}", body))),
            },
            'D' => parse_gnustep_date(body)
                .map(PlistValue::Date)
                .ok_or_else(|| self.error(format!("invalid GNUstep date {:?}", body))),
            other => Err(self.error(format!("unknown GNUstep type tag {:?}", other))),
        }
    }
}

/// `2002-03-22 11:30:00 +0100`, with RFC 3339 accepted as well.
fn parse_gnustep_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
