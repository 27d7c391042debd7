//! Binary property-list decoder (`bplist00`).
//!
//! Layout of a binary plist:
//!
//! ```text
//! +----------+------------------------+--------------+---------------+
//! | bplist00 | objects ...            | offset table | trailer (32B) |
//! +----------+------------------------+--------------+---------------+
//! ```
//!
//! The trailer names the root object and describes the offset table, which
//! maps each object number to the byte offset of its marker. Containers hold
//! object numbers, not nested bytes, so the same object may be referenced more
//! than once. Such sharing is legal and each reference is materialized as its
//! own copy; a reference back to an ancestor is a cycle and is rejected.

use crate::decoder::{date_from_plist_seconds, text, DictionaryBuilder, MAX_DEPTH};
use crate::error::DecodeError;
use crate::value::PlistValue;

/// Signature shared by every binary plist version.
pub(crate) const MAGIC: &[u8] = b"bplist";
const VERSION: &[u8] = b"00";
const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 32;

/// Upper bound on materialized nodes. Shared references are copied, so a
/// small file can describe an exponentially large tree.
pub const MAX_NODES: usize = 1 << 24;

/// Decode a complete `bplist00` document.
pub fn decode(bytes: &[u8]) -> Result<PlistValue, DecodeError> {
    if !bytes.starts_with(MAGIC) {
        return Err(DecodeError::UnrecognizedFormat("missing bplist signature".to_string()));
    }
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }
    let version = &bytes[MAGIC.len()..HEADER_LEN];
    if version != VERSION {
        return Err(DecodeError::UnrecognizedFormat(format!(
            "unsupported binary property list version {:?}",
            String::from_utf8_lossy(version)
        )));
    }
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN + TRAILER_LEN,
            available: bytes.len(),
        });
    }

    let trailer = Trailer::parse(bytes)?;
    tracing::trace!(
        objects = trailer.num_objects,
        top = trailer.top_object,
        offset_size = trailer.offset_size,
        ref_size = trailer.ref_size,
        "binary plist trailer"
    );
    let mut reader = Reader {
        bytes,
        on_path: vec![false; trailer.num_objects],
        trailer,
        nodes: 0,
    };
    let top = reader.trailer.top_object as u64;
    reader.read_object(top, 0)
}

#[derive(Debug)]
struct Trailer {
    offset_size: usize,
    ref_size: usize,
    num_objects: usize,
    top_object: usize,
    offset_table_offset: usize,
}

impl Trailer {
    fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let start = bytes.len() - TRAILER_LEN;
        let t = &bytes[start..];
        let offset_size = usize::from(t[6]);
        let ref_size = usize::from(t[7]);
        let num_objects = be_uint(&t[8..16]);
        let top_object = be_uint(&t[16..24]);
        let offset_table_offset = be_uint(&t[24..32]);

        if !(1..=8).contains(&offset_size) {
            return Err(DecodeError::corrupt(
                start + 6,
                format!("invalid offset size {}", offset_size),
            ));
        }
        if !(1..=8).contains(&ref_size) {
            return Err(DecodeError::corrupt(
                start + 7,
                format!("invalid object reference size {}", ref_size),
            ));
        }
        if num_objects == 0 {
            return Err(DecodeError::corrupt(start + 8, "document has no objects"));
        }
        if top_object >= num_objects {
            return Err(DecodeError::corrupt(
                start + 16,
                format!(
                    "top object {} out of range for {} objects",
                    top_object, num_objects
                ),
            ));
        }
        // The offset table sits between the header and the trailer.
        let table_len = num_objects.checked_mul(offset_size as u64);
        let table_end = table_len.and_then(|len| len.checked_add(offset_table_offset));
        match table_end {
            Some(end) if offset_table_offset >= HEADER_LEN as u64 && end <= start as u64 => {}
            _ => {
                return Err(DecodeError::corrupt(
                    start + 24,
                    format!(
                        "offset table at {} with {} entries does not fit before the trailer",
                        offset_table_offset, num_objects
                    ),
                ))
            }
        }

        // All three are bounded by the file length after the check above.
        Ok(Trailer {
            offset_size,
            ref_size,
            num_objects: num_objects as usize,
            top_object: top_object as usize,
            offset_table_offset: offset_table_offset as usize,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    trailer: Trailer,
    /// Objects currently being decoded on the path from the root.
    on_path: Vec<bool>,
    nodes: usize,
}

impl<'a> Reader<'a> {
    fn read_object(&mut self, object: u64, depth: usize) -> Result<PlistValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimit { limit: MAX_DEPTH });
        }
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(DecodeError::corrupt(
                0,
                format!("document expands to more than {} objects", MAX_NODES),
            ));
        }

        let index = self.object_index(object)?;
        if self.on_path[index] {
            return Err(DecodeError::Cycle { object });
        }
        let offset = self.object_offset(index)?;
        let marker = self.bytes[offset];
        let low = marker & 0x0F;

        match marker >> 4 {
            0x0 => match low {
                0x0 | 0xF => Ok(PlistValue::Null),
                0x8 => Ok(PlistValue::Boolean(false)),
                0x9 => Ok(PlistValue::Boolean(true)),
                _ => Err(unknown_marker(offset, marker)),
            },
            0x1 => self.read_integer(offset, low).map(PlistValue::Integer),
            0x2 => match low {
                0x2 => {
                    let raw = self.slice(offset + 1, 4)?;
                    let r = f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                    Ok(PlistValue::Real(f64::from(r)))
                }
                0x3 => Ok(PlistValue::Real(self.read_f64(offset + 1)?)),
                _ => Err(unknown_marker(offset, marker)),
            },
            0x3 if low == 0x3 => {
                let seconds = self.read_f64(offset + 1)?;
                date_from_plist_seconds(seconds)
                    .map(PlistValue::Date)
                    .ok_or_else(|| {
                        DecodeError::corrupt(offset, format!("date {} is out of range", seconds))
                    })
            }
            0x4 => {
                let (len, start) = self.read_length(offset, low)?;
                Ok(PlistValue::Data(self.slice(start, len)?.to_vec()))
            }
            0x5 => {
                let (len, start) = self.read_length(offset, low)?;
                let raw = self.slice(start, len)?;
                match std::str::from_utf8(raw) {
                    Ok(text) if text.is_ascii() => Ok(PlistValue::String(text.to_string())),
                    _ => Err(DecodeError::Encoding(format!(
                        "non-ASCII byte in ASCII string at offset {}",
                        start
                    ))),
                }
            }
            0x6 => {
                let (units, start) = self.read_length(offset, low)?;
                let len = units
                    .checked_mul(2)
                    .ok_or_else(|| DecodeError::corrupt(offset, "string length overflows"))?;
                let raw = self.slice(start, len)?;
                let units = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
                text::decode_utf16_units(units).map(PlistValue::String)
            }
            0x8 => {
                let raw = self.slice(offset + 1, usize::from(low) + 1)?;
                if raw.len() > 8 {
                    return Err(DecodeError::corrupt(
                        offset,
                        format!("UID of {} bytes is too wide", raw.len()),
                    ));
                }
                Ok(PlistValue::Integer(i128::from(be_uint(raw))))
            }
            0xA..=0xC => {
                let (count, start) = self.read_length(offset, low)?;
                let refs = self.read_refs(start, count)?;
                self.on_path[index] = true;
                let mut items = Vec::with_capacity(refs.len());
                for child in refs {
                    items.push(self.read_object(child, depth + 1)?);
                }
                self.on_path[index] = false;
                Ok(PlistValue::Array(items))
            }
            0xD => {
                let (count, start) = self.read_length(offset, low)?;
                let key_refs = self.read_refs(start, count)?;
                let value_start = start + count * self.trailer.ref_size;
                let value_refs = self.read_refs(value_start, count)?;
                self.on_path[index] = true;
                let mut builder = DictionaryBuilder::with_capacity(count);
                for (key_ref, value_ref) in key_refs.into_iter().zip(value_refs) {
                    let key = match self.read_object(key_ref, depth + 1)? {
                        PlistValue::String(s) => s,
                        other => return Err(DecodeError::NonStringKey { kind: other.kind() }),
                    };
                    let value = self.read_object(value_ref, depth + 1)?;
                    builder.insert(key, value);
                }
                self.on_path[index] = false;
                Ok(PlistValue::Dictionary(builder.finish()))
            }
            _ => Err(unknown_marker(offset, marker)),
        }
    }

    fn object_index(&self, object: u64) -> Result<usize, DecodeError> {
        match usize::try_from(object) {
            Ok(index) if index < self.trailer.num_objects => Ok(index),
            _ => Err(DecodeError::corrupt(
                0,
                format!(
                    "object reference {} out of range for {} objects",
                    object, self.trailer.num_objects
                ),
            )),
        }
    }

    /// Byte offset of an object's marker, read from the offset table.
    fn object_offset(&self, index: usize) -> Result<usize, DecodeError> {
        let size = self.trailer.offset_size;
        let entry = self.trailer.offset_table_offset + index * size;
        let offset = be_uint(&self.bytes[entry..entry + size]);
        match usize::try_from(offset) {
            Ok(offset) if offset >= HEADER_LEN && offset < self.trailer.offset_table_offset => {
                Ok(offset)
            }
            _ => Err(DecodeError::corrupt(
                entry,
                format!("object {} has invalid offset {}", index, offset),
            )),
        }
    }

    /// Borrow `len` bytes of object data starting at `start`. Object data
    /// must end before the offset table.
    fn slice(&self, start: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let bytes = self.bytes;
        match start.checked_add(len) {
            Some(end) if end <= self.trailer.offset_table_offset => Ok(&bytes[start..end]),
            _ => Err(DecodeError::corrupt(
                start,
                format!("object of {} bytes runs past the object area", len),
            )),
        }
    }

    fn read_f64(&self, start: usize) -> Result<f64, DecodeError> {
        let raw = self.slice(start, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(f64::from_be_bytes(buf))
    }

    /// Integers of 1, 2 and 4 bytes are unsigned; 8 and 16 bytes are signed.
    fn read_integer(&self, offset: usize, low: u8) -> Result<i128, DecodeError> {
        if low > 4 {
            return Err(DecodeError::corrupt(
                offset,
                format!("integer width 2^{} bytes is not supported", low),
            ));
        }
        let width = 1usize << low;
        let raw = self.slice(offset + 1, width)?;
        Ok(match width {
            8 => i128::from(be_uint(raw) as i64),
            16 => {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(raw);
                i128::from_be_bytes(buf)
            }
            _ => i128::from(be_uint(raw)),
        })
    }

    /// Element count of a variable-length object and the offset of its payload.
    ///
    /// A low nibble of `0xF` means the count follows as an integer object.
    fn read_length(&self, offset: usize, low: u8) -> Result<(usize, usize), DecodeError> {
        if low != 0x0F {
            return Ok((usize::from(low), offset + 1));
        }
        let int_marker = self.slice(offset + 1, 1)?[0];
        if int_marker >> 4 != 0x1 || int_marker & 0x0F > 3 {
            return Err(DecodeError::corrupt(
                offset + 1,
                format!("invalid length marker 0x{:02X}", int_marker),
            ));
        }
        let width = 1usize << (int_marker & 0x0F);
        let raw = self.slice(offset + 2, width)?;
        let len = usize::try_from(be_uint(raw))
            .map_err(|_| DecodeError::corrupt(offset + 2, "length does not fit in memory"))?;
        Ok((len, offset + 2 + width))
    }

    fn read_refs(&self, start: usize, count: usize) -> Result<Vec<u64>, DecodeError> {
        let size = self.trailer.ref_size;
        let len = count
            .checked_mul(size)
            .ok_or_else(|| DecodeError::corrupt(start, "reference list length overflows"))?;
        let raw = self.slice(start, len)?;
        Ok(raw.chunks_exact(size).map(be_uint).collect())
    }
}

fn unknown_marker(offset: usize, marker: u8) -> DecodeError {
    DecodeError::corrupt(offset, format!("unknown object marker 0x{:02X}", marker))
}

/// Big-endian unsigned integer of up to eight bytes.
fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
