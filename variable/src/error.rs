//! Error types for replicated variables.

use codec::CodecError;
use schema::{ClientId, WritePermission};
use thiserror::Error;

/// Result type for variable operations.
pub type VariableResult<T> = Result<T, VariableError>;

/// Errors surfaced by a replicated variable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    /// Encoding or decoding the value failed (bounds, unsupported type, malformed payload).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The local peer may not modify this variable.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// A list operation addressed an index past the end.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A collection delta carried an unknown operation tag.
    #[error("invalid collection event tag 0x{tag:02X}")]
    InvalidEvent { tag: u8 },
}

impl From<bitstream::BitError> for VariableError {
    fn from(err: bitstream::BitError) -> Self {
        Self::Codec(CodecError::Bitstream(err))
    }
}

/// A write attempted by a peer lacking write permission.
///
/// Recoverable: the attempted value never becomes the synchronized snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("{local} may not write a variable with {required:?} write permission (owner is {owner})")]
    WriteDenied {
        local: ClientId,
        owner: ClientId,
        required: WritePermission,
    },
}
