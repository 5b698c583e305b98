//! Error types for message framing.

use bitstream::BitError;
use thiserror::Error;

/// Result type for message decoding.
pub type WireResult<T> = Result<T, DecodeError>;

/// Result type for message encoding.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Framing errors found while decoding a delta message.
///
/// Every variant describes bounded, malformed input; none of them is fatal to
/// the receiving process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("message too small: {actual} bytes, need at least {required}")]
    MessageTooSmall { actual: usize, required: usize },

    #[error("invalid magic number: 0x{found:08X}")]
    InvalidMagic { found: u32 },

    #[error("unsupported wire version: {found}")]
    UnsupportedVersion { found: u16 },

    #[error("invalid flags: 0x{flags:04X}")]
    InvalidFlags { flags: u16 },

    #[error("payload length mismatch: header says {header_len}, actual {actual_len}")]
    PayloadLengthMismatch { header_len: u32, actual_len: usize },

    /// Control messages (ownership, despawn) carry no sections.
    #[error("unexpected {len}-byte payload on control message (flags 0x{flags:04X})")]
    UnexpectedPayload { flags: u16, len: usize },

    #[error("section index {index} does not follow {previous}")]
    SectionOrder { previous: u32, index: u32 },

    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    #[error("truncated section: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("section framing: {0}")]
    Bitstream(#[from] BitError),
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    MessageBytes,
    SectionCount,
    SectionLength,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MessageBytes => "message bytes",
            Self::SectionCount => "section count",
            Self::SectionLength => "section length",
        };
        f.write_str(name)
    }
}

/// Errors raised while building a message.
///
/// These signal local misuse or misconfiguration and are not retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("section index {index} does not follow {previous}")]
    SectionOrder { previous: u32, index: u32 },

    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    #[error("control message cannot carry sections (flags 0x{flags:04X})")]
    SectionsOnControl { flags: u16 },

    #[error("payload length {length} does not fit the header")]
    LengthOverflow { length: usize },

    #[error(transparent)]
    Bitstream(#[from] BitError),
}
