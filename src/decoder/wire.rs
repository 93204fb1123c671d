use bytes::Buf;
use prost::encoding::decode_varint;
use serde::Serialize;
use crate::decoder::layout::MAX_DEPTH;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum WireType {
    Varint,
    LengthDelimited,
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DecodedValue {
    Integer(u64),
    Bytes(Vec<u8>),
    Message(Vec<DecodedField>),
}

/// One `(tag, wire_type, value)` triple of a schema-less binary message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedField {
    pub tag: u32,
    pub wire_type: WireType,
    pub value: DecodedValue,
}

impl DecodedField {
    /// Children of a nested message. An empty length-delimited value is an
    /// empty message; any other byte string is not a message.
    pub fn fields(&self) -> Option<&[DecodedField]> {
        match &self.value {
            DecodedValue::Message(fields) => Some(fields),
            DecodedValue::Bytes(bytes) if bytes.is_empty() => Some(&[]),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self.value {
            DecodedValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            DecodedValue::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// All direct children with the given field number.
    pub fn children(&self, tag: u32) -> impl Iterator<Item = &DecodedField> {
        self.fields().unwrap_or(&[]).iter().filter(move |f| f.tag == tag)
    }

    pub fn child(&self, tag: u32) -> Option<&DecodedField> {
        self.children(tag).next()
    }
}

enum FieldError {
    /// Key names a wire type we do not understand (groups, reserved) or tag 0.
    UnrecognizedKey(u64),
    Fatal(String),
}

/// Parse a complete payload. The root is reported as field 0 holding a message.
///
/// Unknown field numbers are kept, never rejected. A bad key is given one
/// resync attempt (skip a byte and retry) per payload; a length prefix that
/// runs past the end, or a truncated varint, is fatal straight away.
/// Bodies nested deeper than `MAX_DEPTH` are kept as raw bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedField> {
    let fields = parse_fields(bytes, true, 0).map_err(|(offset, reason)| Error::malformed(offset, reason))?;
    Ok(DecodedField {
        tag: 0,
        wire_type: WireType::LengthDelimited,
        value: DecodedValue::Message(fields),
    })
}

fn parse_fields(
    data: &[u8],
    allow_resync: bool,
    depth: usize,
) -> std::result::Result<Vec<DecodedField>, (usize, String)> {
    let mut buf = data;
    let mut fields = Vec::new();
    let mut resynced = false;

    while buf.has_remaining() {
        let offset = data.len() - buf.remaining();
        match read_field(&mut buf, depth) {
            Ok(field) => fields.push(field),
            Err(FieldError::UnrecognizedKey(key)) if allow_resync && !resynced => {
                tracing::debug!(offset, key, "Unrecognized field key, resyncing one byte forward");
                resynced = true;
                buf = &data[offset + 1..];
            }
            Err(FieldError::UnrecognizedKey(key)) => {
                return Err((offset, format!("unrecognized field key {:#x}", key)));
            }
            Err(FieldError::Fatal(reason)) => return Err((offset, reason)),
        }
    }

    Ok(fields)
}

fn read_field(buf: &mut &[u8], depth: usize) -> std::result::Result<DecodedField, FieldError> {
    let key = decode_varint(buf).map_err(|e| FieldError::Fatal(format!("bad key varint: {}", e)))?;
    let tag = key >> 3;
    if tag == 0 || tag > u64::from(u32::MAX) {
        return Err(FieldError::UnrecognizedKey(key));
    }
    let tag = tag as u32;

    let (wire_type, value) = match key & 0x7 {
        0 => {
            let v = decode_varint(buf).map_err(|e| FieldError::Fatal(format!("bad varint in field {}: {}", tag, e)))?;
            (WireType::Varint, DecodedValue::Integer(v))
        }
        1 => {
            ensure_remaining(buf, 8, tag)?;
            (WireType::Fixed, DecodedValue::Integer(buf.get_u64_le()))
        }
        2 => {
            let len = decode_varint(buf).map_err(|e| FieldError::Fatal(format!("bad length in field {}: {}", tag, e)))?;
            let len = usize::try_from(len).map_err(|_| FieldError::Fatal(format!("length overflow in field {}", tag)))?;
            ensure_remaining(buf, len, tag)?;
            let current: &[u8] = *buf;
            let (body, rest) = current.split_at(len);
            *buf = rest;
            (WireType::LengthDelimited, nested_or_bytes(body, depth + 1))
        }
        5 => {
            ensure_remaining(buf, 4, tag)?;
            (WireType::Fixed, DecodedValue::Integer(u64::from(buf.get_u32_le())))
        }
        _ => return Err(FieldError::UnrecognizedKey(key)),
    };

    Ok(DecodedField { tag, wire_type, value })
}

fn ensure_remaining(buf: &[u8], needed: usize, tag: u32) -> std::result::Result<(), FieldError> {
    if buf.len() < needed {
        return Err(FieldError::Fatal(format!(
            "field {} needs {} bytes, {} remaining",
            tag,
            needed,
            buf.len()
        )));
    }
    Ok(())
}

/// Strings and nested messages share a wire type; a body is treated as a
/// message only when it parses completely without resyncing.
fn nested_or_bytes(body: &[u8], depth: usize) -> DecodedValue {
    if body.is_empty() || depth > MAX_DEPTH {
        return DecodedValue::Bytes(body.to_vec());
    }
    match parse_fields(body, false, depth) {
        Ok(fields) => DecodedValue::Message(fields),
        Err(_) => DecodedValue::Bytes(body.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_varint_and_string_fields() {
        // field 1 varint 150, field 2 "EUR"
        let bytes = [0x08, 0x96, 0x01, 0x12, 0x03, b'E', b'U', b'R'];
        let root = decode(&bytes).unwrap();
        assert_eq!(root.child(1).unwrap().as_integer(), Some(150));
        assert_eq!(root.child(2).unwrap().as_str(), Some("EUR"));
    }

    #[test]
    fn nested_message_is_expanded() {
        // field 3 { field 1 = 7 }
        let bytes = [0x1a, 0x02, 0x08, 0x07];
        let root = decode(&bytes).unwrap();
        let nested = root.child(3).unwrap();
        assert_eq!(nested.wire_type, WireType::LengthDelimited);
        assert_eq!(nested.child(1).unwrap().as_integer(), Some(7));
    }

    #[test]
    fn fixed_width_fields_are_read_little_endian() {
        let mut bytes = vec![0x0d]; // field 1, fixed32
        bytes.extend_from_slice(&42u32.to_le_bytes());
        bytes.push(0x11); // field 2, fixed64
        bytes.extend_from_slice(&7u64.to_le_bytes());
        let root = decode(&bytes).unwrap();
        assert_eq!(root.child(1).unwrap().wire_type, WireType::Fixed);
        assert_eq!(root.child(1).unwrap().as_integer(), Some(42));
        assert_eq!(root.child(2).unwrap().as_integer(), Some(7));
    }

    #[test]
    fn length_past_end_is_fatal() {
        let bytes = [0x12, 0x05, b'a', b'b'];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { offset: 0, .. }));
    }

    #[test]
    fn single_bad_key_is_resynced() {
        // 0x0f = field 1 with wire type 7, then a valid field 1 varint
        let bytes = [0x0f, 0x08, 0x2a];
        let root = decode(&bytes).unwrap();
        assert_eq!(root.child(1).unwrap().as_integer(), Some(42));
    }

    #[test]
    fn second_bad_key_is_fatal() {
        let bytes = [0x0f, 0x08, 0x2a, 0x0f, 0x08, 0x01];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { offset: 3, .. }));
    }

    #[test]
    fn truncated_varint_is_fatal() {
        let bytes = [0x08, 0xff];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn currency_codes_stay_bytes() {
        for code in ["EUR", "USD", "GBP", "MXN", "COP", "BRL"] {
            assert_eq!(nested_or_bytes(code.as_bytes(), 1), DecodedValue::Bytes(code.as_bytes().to_vec()));
        }
    }

    #[test]
    fn bodies_past_max_depth_stay_bytes() {
        let body = [0x08, 0x07];
        assert!(matches!(nested_or_bytes(&body, MAX_DEPTH), DecodedValue::Message(_)));
        assert_eq!(nested_or_bytes(&body, MAX_DEPTH + 1), DecodedValue::Bytes(body.to_vec()));
    }
}
