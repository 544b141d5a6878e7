use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::types::{RecordType, Type};

/// Canonical IDL value.
///
/// Untyped on its own: the matching `Type` travels next to it (in the wire
/// type table, a method signature, or a stable layout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Nat(u64),
    Int(i64),
    Text(String),
    Opt(Option<Box<Value>>),
    Vec(Vec<Value>),
    /// Field values keyed by name, sorted like `RecordType`.
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn some(inner: Value) -> Self {
        Value::Opt(Some(Box::new(inner)))
    }

    pub fn none() -> Self {
        Value::Opt(None)
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the value's shape, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Nat(_) => "nat",
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Opt(_) => "opt",
            Value::Vec(_) => "vec",
            Value::Record(_) => "record",
        }
    }

    /// Structural type check. Records must carry exactly the declared fields.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Null, Type::Null)
            | (Value::Bool(_), Type::Bool)
            | (Value::Nat(_), Type::Nat)
            | (Value::Int(_), Type::Int)
            | (Value::Text(_), Type::Text) => true,
            (Value::Opt(None), Type::Opt(_)) => true,
            (Value::Opt(Some(v)), Type::Opt(inner)) => v.conforms_to(inner),
            (Value::Vec(items), Type::Vec(inner)) => items.iter().all(|v| v.conforms_to(inner)),
            (Value::Record(fields), Type::Record(record)) => record_conforms(fields, record),
            _ => false,
        }
    }

    /// Convert a value of type `from` so that it conforms to `to`.
    ///
    /// Applies the `Type::is_assignable_to` rules: `nat` values become `int`.
    pub fn widen(self, from: &Type, to: &Type) -> Result<Value, CodecError> {
        if from == to {
            return Ok(self);
        }
        match (self, from, to) {
            (Value::Nat(n), Type::Nat, Type::Int) => i64::try_from(n)
                .map(Value::Int)
                .map_err(|_| CodecError::OutOfRange(format!("nat {n} does not fit int"))),
            (Value::Opt(None), Type::Opt(_), Type::Opt(_)) => Ok(Value::Opt(None)),
            (Value::Opt(Some(v)), Type::Opt(f), Type::Opt(t)) => {
                Ok(Value::some((*v).widen(f, t)?))
            }
            (Value::Vec(items), Type::Vec(f), Type::Vec(t)) => items
                .into_iter()
                .map(|v| v.widen(f, t))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Vec),
            (Value::Record(mut fields), Type::Record(f), Type::Record(t)) => {
                let mut out = BTreeMap::new();
                for (name, target) in t.fields() {
                    let source = f
                        .get(name)
                        .ok_or_else(|| CodecError::MissingField(name.to_string()))?;
                    let value = fields
                        .remove(name)
                        .ok_or_else(|| CodecError::MissingField(name.to_string()))?;
                    out.insert(name.to_string(), value.widen(source, target)?);
                }
                Ok(Value::Record(out))
            }
            (value, _, to) => Err(CodecError::ValueMismatch {
                expected: to.clone(),
                found: value.kind_name().to_string(),
            }),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nat(&self) -> Option<u64> {
        match self {
            Value::Nat(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}

fn record_conforms(fields: &BTreeMap<String, Value>, record: &RecordType) -> bool {
    fields.len() == record.len()
        && record
            .fields()
            .all(|(name, ty)| fields.get(name).is_some_and(|v| v.conforms_to(ty)))
}

// ---------------------------------------------------------------------------
// Typed mapping
// ---------------------------------------------------------------------------

/// Rust type with a fixed IDL representation.
pub trait IdlType: Sized {
    fn idl_type() -> Type;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

/// Rust struct mapped to an IDL record. Implemented by `#[derive(IdlRecord)]`.
pub trait IdlRecord: IdlType {
    fn record_type() -> RecordType;
}

fn mismatch<T: IdlType>(value: &Value) -> CodecError {
    CodecError::ValueMismatch {
        expected: T::idl_type(),
        found: value.kind_name().to_string(),
    }
}

impl IdlType for () {
    fn idl_type() -> Type {
        Type::Null
    }

    fn into_value(self) -> Value {
        Value::Null
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IdlType for bool {
    fn idl_type() -> Type {
        Type::Bool
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IdlType for u64 {
    fn idl_type() -> Type {
        Type::Nat
    }

    fn into_value(self) -> Value {
        Value::Nat(self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Nat(n) => Ok(n),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IdlType for i64 {
    fn idl_type() -> Type {
        Type::Int
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IdlType for String {
    fn idl_type() -> Type {
        Type::Text
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: IdlType> IdlType for Option<T> {
    fn idl_type() -> Type {
        Type::opt(T::idl_type())
    }

    fn into_value(self) -> Value {
        Value::Opt(self.map(|v| Box::new(v.into_value())))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Opt(None) => Ok(None),
            Value::Opt(Some(v)) => T::from_value(*v).map(Some),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: IdlType> IdlType for Vec<T> {
    fn idl_type() -> Type {
        Type::vec(T::idl_type())
    }

    fn into_value(self) -> Value {
        Value::Vec(self.into_iter().map(IdlType::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Vec(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument list helpers
// ---------------------------------------------------------------------------

/// Take the single value out of a one-element argument or reply list.
pub fn decode_one<T: IdlType>(values: Vec<Value>) -> Result<T, CodecError> {
    let found = values.len();
    let mut iter = values.into_iter();
    match (iter.next(), iter.next()) {
        (Some(v), None) => T::from_value(v),
        _ => Err(CodecError::ArgCount { expected: 1, found }),
    }
}

/// Check that an argument or reply list is empty.
pub fn decode_none(values: Vec<Value>) -> Result<(), CodecError> {
    if values.is_empty() {
        Ok(())
    } else {
        Err(CodecError::ArgCount { expected: 0, found: values.len() })
    }
}

pub fn encode_one<T: IdlType>(value: T) -> Vec<Value> {
    vec![value.into_value()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_conformance_is_exact() {
        let ty = Type::Record(RecordType::new().field("counter", Type::Nat));
        assert!(Value::record([("counter", Value::Nat(1))]).conforms_to(&ty));
        assert!(!Value::record([("counter", Value::Int(1))]).conforms_to(&ty));
        assert!(
            !Value::record([("counter", Value::Nat(1)), ("extra", Value::Null)]).conforms_to(&ty)
        );
    }

    #[test]
    fn widen_converts_nat_fields_to_int() {
        let from = Type::Record(RecordType::new().field("n", Type::Nat));
        let to = Type::Record(RecordType::new().field("n", Type::Int));
        let widened = Value::record([("n", Value::Nat(7))]).widen(&from, &to).unwrap();
        assert_eq!(widened, Value::record([("n", Value::Int(7))]));
    }

    #[test]
    fn widen_rejects_nat_above_int_range() {
        let err = Value::Nat(u64::MAX).widen(&Type::Nat, &Type::Int).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange(_)));
    }

    #[test]
    fn decode_one_requires_exactly_one_value() {
        assert_eq!(decode_one::<u64>(vec![Value::Nat(3)]).unwrap(), 3);
        assert!(decode_one::<u64>(vec![]).is_err());
        assert!(decode_one::<u64>(vec![Value::Nat(1), Value::Nat(2)]).is_err());
        assert!(decode_one::<String>(vec![Value::Nat(1)]).is_err());
    }

    #[test]
    fn option_maps_to_opt() {
        let v = Some("hi".to_string()).into_value();
        assert!(v.conforms_to(&Option::<String>::idl_type()));
        assert_eq!(Option::<String>::from_value(Value::none()).unwrap(), None);
    }
}
