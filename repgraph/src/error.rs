//! Error types for the replication graph.

use schema::{ClientId, ObjectId, SchemaError, ValueKind, VariableKey};
use thiserror::Error;
use variable::VariableError;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors surfaced by [`crate::ReplicationGraph`] and [`crate::ReplicatedObject`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReplicationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("malformed message: {0}")]
    Decode(#[from] wire::DecodeError),

    #[error("message encoding failed: {0}")]
    Encode(#[from] wire::EncodeError),

    /// A variable failed to encode or decode.
    #[error("{object} variable {key}: {source}")]
    Variable {
        object: ObjectId,
        key: VariableKey,
        source: VariableError,
    },

    #[error("{key} is not part of the object layout")]
    UnknownVariable { key: VariableKey },

    #[error("{key} is already populated")]
    DuplicateVariable { key: VariableKey },

    #[error("{key} is declared but has no variable")]
    MissingVariable { key: VariableKey },

    #[error("{key} has kind {found:?}, layout declares {expected:?}")]
    KindMismatch {
        key: VariableKey,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{key} permissions differ from the layout")]
    PermissionMismatch { key: VariableKey },

    #[error("unknown {object}")]
    UnknownObject { object: ObjectId },

    #[error("{object} is already spawned")]
    DuplicateObject { object: ObjectId },

    #[error("object limit of {max} reached")]
    TooManyObjects { max: usize },

    #[error("{object} layout hash 0x{found:016X} does not match 0x{expected:016X}")]
    LayoutMismatch {
        object: ObjectId,
        expected: u64,
        found: u64,
    },

    #[error("no registered layout with hash 0x{hash:016X}")]
    UnknownLayout { hash: u64 },

    #[error("unknown {client}")]
    UnknownClient { client: ClientId },

    #[error("unexpected {kind} message from {sender}")]
    UnexpectedMessage {
        sender: ClientId,
        kind: &'static str,
    },

    /// The operation belongs to the server peer.
    #[error("{local} is not the server")]
    NotServer { local: ClientId },
}
