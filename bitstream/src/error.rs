//! Error types for buffer operations.

use thiserror::Error;

/// Result type for buffer operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur while writing to or reading from a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Attempted to read past the end of the buffer.
    #[error("attempted to read {requested} bytes but only {available} bytes available")]
    EndOfBuffer {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// Attempted to write past the buffer's maximum capacity.
    #[error("attempted to write up to byte {needed} but buffer capacity is {capacity} bytes")]
    BufferOverflow {
        /// Total bytes the write would need.
        needed: usize,
        /// Maximum capacity in bytes.
        capacity: usize,
    },

    /// Invalid bit count for the operation.
    #[error("invalid bit count {bits}, maximum allowed is {max_bits}")]
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: u8,
        /// Maximum allowed bits for this operation.
        max_bits: u8,
    },

    /// Value exceeds the range representable by the specified number of bits.
    #[error("value {value} cannot be represented in {bits} bits")]
    ValueOutOfRange {
        /// The value that was out of range.
        value: u64,
        /// Number of bits available.
        bits: u8,
    },

    /// A varint ran past its maximum encoded width or value range.
    #[error("invalid varint: more than {max_bytes} bytes")]
    InvalidVarint {
        /// Maximum encoded width for the target type.
        max_bytes: usize,
    },

    /// A decoded length does not fit in `usize`.
    #[error("length {value} does not fit in usize")]
    LengthOverflow { value: u64 },

    /// A boolean byte was neither 0 nor 1.
    #[error("invalid bool byte 0x{value:02X}")]
    InvalidBool { value: u8 },

    /// Seek target lies outside the readable range.
    #[error("seek to {position} is outside buffer of {len} bytes")]
    SeekOutOfRange { position: usize, len: usize },
}
