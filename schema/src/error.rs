//! Schema validation errors.

use thiserror::Error;

use crate::{ComponentId, FieldId};

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when building or validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Duplicate component ID in a schema.
    #[error("duplicate component id {}", id.get())]
    DuplicateComponentId { id: ComponentId },

    /// Duplicate field ID within a component.
    #[error("duplicate field id {} in component {}", field.get(), component.get())]
    DuplicateFieldId {
        component: ComponentId,
        field: FieldId,
    },

    /// Invalid bit width for an integer or enum kind.
    #[error("invalid bit width {bits}, expected 1..=128")]
    InvalidBitWidth { bits: u8 },

    /// Floats are either 32 or 64 bits.
    #[error("invalid float width {bits}, expected 32 or 64")]
    InvalidFloatWidth { bits: u8 },

    /// Fixed strings need a non-zero capacity.
    #[error("fixed string capacity must be non-zero")]
    ZeroStringCapacity,

    /// Custom kinds must carry a type name.
    #[error("custom value kind has an empty name")]
    EmptyCustomName,

    /// The layout has more variables than a message can address.
    #[error("too many variables: {count} > {max}")]
    TooManyVariables { count: usize, max: usize },
}
