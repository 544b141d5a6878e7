use std::fmt;

use crate::types::Type;

/// Error kind for program errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Explicit trap raised by program code.
    Trap,
    /// Arguments or state could not be decoded.
    Decode,
    /// Stable state does not have the shape the program expects.
    State,
    /// Unknown method, unsupported operation.
    Logic,
}

/// Error returned by `Program` methods.
///
/// Any error returned from program code is a trap: the replica rolls back
/// every state change made by the failing call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProgramError {
    pub fn trap(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Trap, message: msg.into() }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Decode, message: msg.into() }
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::State, message: msg.into() }
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProgramError {}

impl From<CodecError> for ProgramError {
    fn from(e: CodecError) -> Self {
        Self::decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Failure to encode, decode or convert IDL values.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    BadMagic,
    UnexpectedEof,
    InvalidUtf8,
    LebOverflow,
    UnknownTypeTag(u8),
    TooDeep,
    TrailingBytes(usize),
    ArgCount { expected: usize, found: usize },
    /// Encoded type differs from the one the decoder was told to expect.
    TypeMismatch { index: usize, expected: Type, found: Type },
    /// A value does not conform to its declared type.
    ValueMismatch { expected: Type, found: String },
    MissingField(String),
    DuplicateField(String),
    /// Integer does not fit the target representation.
    OutOfRange(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BadMagic => f.write_str("missing IDL magic header"),
            CodecError::UnexpectedEof => f.write_str("unexpected end of message"),
            CodecError::InvalidUtf8 => f.write_str("text is not valid UTF-8"),
            CodecError::LebOverflow => f.write_str("LEB128 integer overflows 64 bits"),
            CodecError::UnknownTypeTag(tag) => write!(f, "unknown type tag 0x{tag:02x}"),
            CodecError::TooDeep => f.write_str("type nesting too deep"),
            CodecError::TrailingBytes(n) => write!(f, "{n} trailing bytes after message"),
            CodecError::ArgCount { expected, found } => {
                write!(f, "expected {expected} values, found {found}")
            }
            CodecError::TypeMismatch { index, expected, found } => {
                write!(f, "value {index}: expected type {expected}, found {found}")
            }
            CodecError::ValueMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found} value")
            }
            CodecError::MissingField(name) => write!(f, "missing record field '{name}'"),
            CodecError::DuplicateField(name) => write!(f, "duplicate record field '{name}'"),
            CodecError::OutOfRange(msg) => write!(f, "out of range: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}
