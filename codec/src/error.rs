//! Error types for value encoding and decoding.

use std::fmt;

use bitstream::BitError;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a value.
///
/// Structural mismatches inside a collection delta are not errors; they are
/// recorded on the [`crate::DecodeContext`] and the rest of the delta applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer error (bounds, capacity, malformed varint).
    #[error("buffer error: {0}")]
    Bitstream(#[from] BitError),

    /// No codec is registered for the value's type.
    #[error("unsupported type {type_name}: no codec registered")]
    UnsupportedType { type_name: &'static str },

    /// Enum discriminant not recognized.
    #[error("invalid value {value} for enum {type_name}")]
    InvalidEnumValue {
        type_name: &'static str,
        value: i128,
    },

    /// Full/delta marker byte was neither 0 nor 1.
    #[error("invalid delta marker 0x{value:02X}")]
    InvalidMarker { value: u8 },

    /// Option presence byte was neither 0 nor 1.
    #[error("invalid presence byte 0x{value:02X}")]
    InvalidPresence { value: u8 },

    /// String bytes were not valid UTF-8.
    #[error("string payload is not valid utf-8")]
    InvalidUtf8,

    /// String longer than its inline capacity.
    #[error("string of {len} bytes exceeds capacity {capacity}")]
    StringTooLong { len: usize, capacity: usize },

    /// Decode limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific codec limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    CollectionLength,
    StringBytes,
    Depth,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectionLength => "collection length",
            Self::StringBytes => "string bytes",
            Self::Depth => "nesting depth",
        };
        write!(f, "{name}")
    }
}
