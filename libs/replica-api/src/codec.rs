//! Binary IDL wire format.
//!
//! ```text
//! message := "DIDL" uleb(n) type{n} value{n}
//! type    := 0x00 null | 0x01 bool | 0x02 nat | 0x03 int | 0x04 text
//!          | 0x05 type (opt) | 0x06 type (vec)
//!          | 0x07 uleb(k) (uleb(len) utf8 type){k} (record, fields by name)
//! ```
//!
//! Values follow their types: bool is one byte, nat is unsigned LEB128, int is
//! signed LEB128, text is length-prefixed UTF-8, opt is a presence byte, vec is
//! length-prefixed, record fields appear in name order.

use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::types::{RecordType, Type};
use crate::value::Value;

pub const MAGIC: &[u8; 4] = b"DIDL";

/// Nesting limit for types and values.
const MAX_DEPTH: usize = 64;

/// Upper bound for vectors whose elements take no bytes.
const MAX_ZERO_SIZED_ITEMS: u64 = 1 << 20;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_NAT: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_OPT: u8 = 0x05;
const TAG_VEC: u8 = 0x06;
const TAG_RECORD: u8 = 0x07;

// ═══════════════════════════════════════════════════════════════
//  Encoding
// ═══════════════════════════════════════════════════════════════

/// Encode `values` with their declared `types`.
///
/// Every value is checked against its type before anything is written.
pub fn encode(types: &[Type], values: &[Value]) -> Result<Vec<u8>, CodecError> {
    if types.len() != values.len() {
        return Err(CodecError::ArgCount { expected: types.len(), found: values.len() });
    }
    for (ty, value) in types.iter().zip(values) {
        if !value.conforms_to(ty) {
            return Err(CodecError::ValueMismatch {
                expected: ty.clone(),
                found: value.kind_name().to_string(),
            });
        }
    }

    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(MAGIC);
    write_uleb(&mut out, types.len() as u64);
    for ty in types {
        write_type(&mut out, ty);
    }
    for value in values {
        write_value(&mut out, value);
    }
    Ok(out)
}

fn write_type(out: &mut Vec<u8>, ty: &Type) {
    match ty {
        Type::Null => out.push(TAG_NULL),
        Type::Bool => out.push(TAG_BOOL),
        Type::Nat => out.push(TAG_NAT),
        Type::Int => out.push(TAG_INT),
        Type::Text => out.push(TAG_TEXT),
        Type::Opt(inner) => {
            out.push(TAG_OPT);
            write_type(out, inner);
        }
        Type::Vec(inner) => {
            out.push(TAG_VEC);
            write_type(out, inner);
        }
        Type::Record(record) => {
            out.push(TAG_RECORD);
            write_uleb(out, record.len() as u64);
            for (name, field_ty) in record.fields() {
                write_bytes(out, name.as_bytes());
                write_type(out, field_ty);
            }
        }
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push(u8::from(*b)),
        Value::Nat(n) => write_uleb(out, *n),
        Value::Int(i) => write_sleb(out, *i),
        Value::Text(s) => write_bytes(out, s.as_bytes()),
        Value::Opt(None) => out.push(0),
        Value::Opt(Some(inner)) => {
            out.push(1);
            write_value(out, inner);
        }
        Value::Vec(items) => {
            write_uleb(out, items.len() as u64);
            for item in items {
                write_value(out, item);
            }
        }
        // BTreeMap iteration order == RecordType field order.
        Value::Record(fields) => {
            for field in fields.values() {
                write_value(out, field);
            }
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_uleb(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_uleb(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn write_sleb(out: &mut Vec<u8>, mut v: i64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

// ═══════════════════════════════════════════════════════════════
//  Decoding
// ═══════════════════════════════════════════════════════════════

/// Decode a message, returning its type table and values.
pub fn decode(bytes: &[u8]) -> Result<(Vec<Type>, Vec<Value>), CodecError> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let count = reader.uleb_len()?;
    let mut types = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        types.push(reader.read_type(0)?);
    }
    let mut values = Vec::with_capacity(types.len());
    for ty in &types {
        values.push(reader.read_value(ty, 0)?);
    }
    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }
    Ok((types, values))
}

/// Decode a message whose type table must equal `expected` exactly.
///
/// Used for replies: a response of a different shape than the interface
/// descriptor promises is a decode error, even if it only adds fields.
pub fn decode_as(bytes: &[u8], expected: &[Type]) -> Result<Vec<Value>, CodecError> {
    let (types, values) = decode(bytes)?;
    if types.len() != expected.len() {
        return Err(CodecError::ArgCount { expected: expected.len(), found: types.len() });
    }
    for (index, (found, expected)) in types.into_iter().zip(expected).enumerate() {
        if &found != expected {
            return Err(CodecError::TypeMismatch { index, expected: expected.clone(), found });
        }
    }
    Ok(values)
}

/// Decode call arguments against a parameter list.
///
/// Like `decode_as`, except that trailing `opt` parameters may be omitted
/// (they decode as `null`) and an empty byte string means "no arguments".
pub fn decode_args(bytes: &[u8], params: &[Type]) -> Result<Vec<Value>, CodecError> {
    let (types, mut values) = if bytes.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        decode(bytes)?
    };
    if types.len() > params.len() {
        return Err(CodecError::ArgCount { expected: params.len(), found: types.len() });
    }
    for (index, (found, expected)) in types.iter().zip(params).enumerate() {
        if found != expected {
            return Err(CodecError::TypeMismatch {
                index,
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }
    for param in &params[types.len()..] {
        match param {
            Type::Opt(_) => values.push(Value::Opt(None)),
            _ => {
                return Err(CodecError::ArgCount { expected: params.len(), found: types.len() });
            }
        }
    }
    Ok(values)
}

/// Elements that occupy no bytes on the wire (null, empty records).
fn is_zero_sized(ty: &Type) -> bool {
    match ty {
        Type::Null => true,
        Type::Record(record) => record.fields().all(|(_, t)| is_zero_sized(t)),
        _ => false,
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = self.bytes;
        let slice = &bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn uleb(&mut self) -> Result<u64, CodecError> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.byte()?;
            let low = u64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && low > 1) {
                return Err(CodecError::LebOverflow);
            }
            result |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn sleb(&mut self) -> Result<i64, CodecError> {
        let mut result: i64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.byte()?;
            let low = i64::from(byte & 0x7f);
            if shift >= 64 || (shift == 63 && low != 0 && low != 0x7f) {
                return Err(CodecError::LebOverflow);
            }
            result |= low << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// Length prefix, bounded by the bytes still available.
    fn uleb_len(&mut self) -> Result<usize, CodecError> {
        let len = self.uleb()?;
        usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or(CodecError::UnexpectedEof)
    }

    fn text(&mut self) -> Result<String, CodecError> {
        let len = self.uleb_len()?;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn read_type(&mut self, depth: usize) -> Result<Type, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        let tag = self.byte()?;
        match tag {
            TAG_NULL => Ok(Type::Null),
            TAG_BOOL => Ok(Type::Bool),
            TAG_NAT => Ok(Type::Nat),
            TAG_INT => Ok(Type::Int),
            TAG_TEXT => Ok(Type::Text),
            TAG_OPT => Ok(Type::opt(self.read_type(depth + 1)?)),
            TAG_VEC => Ok(Type::vec(self.read_type(depth + 1)?)),
            TAG_RECORD => {
                let count = self.uleb_len()?;
                let mut record = RecordType::new();
                for _ in 0..count {
                    let name = self.text()?;
                    let ty = self.read_type(depth + 1)?;
                    if record.contains(&name) {
                        return Err(CodecError::DuplicateField(name));
                    }
                    record.insert(name, ty);
                }
                Ok(Type::Record(record))
            }
            other => Err(CodecError::UnknownTypeTag(other)),
        }
    }

    fn read_value(&mut self, ty: &Type, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        match ty {
            Type::Null => Ok(Value::Null),
            Type::Bool => match self.byte()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(CodecError::OutOfRange(format!("bool byte {other}"))),
            },
            Type::Nat => self.uleb().map(Value::Nat),
            Type::Int => self.sleb().map(Value::Int),
            Type::Text => self.text().map(Value::Text),
            Type::Opt(inner) => match self.byte()? {
                0 => Ok(Value::Opt(None)),
                1 => Ok(Value::some(self.read_value(inner, depth + 1)?)),
                other => Err(CodecError::OutOfRange(format!("opt presence byte {other}"))),
            },
            Type::Vec(inner) => {
                let len = self.uleb()?;
                let bound = if is_zero_sized(inner) {
                    MAX_ZERO_SIZED_ITEMS
                } else {
                    self.remaining() as u64
                };
                if len > bound {
                    return Err(CodecError::UnexpectedEof);
                }
                let mut items = Vec::with_capacity((len as usize).min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_value(inner, depth + 1)?);
                }
                Ok(Value::Vec(items))
            }
            Type::Record(record) => {
                let mut fields = BTreeMap::new();
                for (name, field_ty) in record.fields() {
                    fields.insert(name.to_string(), self.read_value(field_ty, depth + 1)?);
                }
                Ok(Value::Record(fields))
            }
        }
    }
}
