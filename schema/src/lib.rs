//! Replicated variable layouts and permission descriptors.
//!
//! This crate describes what an object replicates, not how values move:
//! - Identifier newtypes for peers, objects, components and variables
//! - Read/write permission descriptors and the network topology
//! - Value kinds (the encoding shape of each variable)
//! - Object layouts with validation and deterministic hashing
//!
//! # Design Principles
//!
//! - **Flat addressing** - Variables are keyed by `(component, field)`, never by inheritance.
//! - **Construction-time permissions** - Descriptors are fixed when a variable is declared.
//! - **Deterministic hashing** - The layout hash is stable given the same definition.

mod error;
mod hash;
mod ids;
mod kind;
mod permission;
mod schema;

pub use error::{SchemaError, SchemaResult};
pub use hash::schema_hash;
pub use ids::{ClientId, ComponentId, FieldId, ObjectId, VariableKey};
pub use kind::ValueKind;
pub use permission::{Permissions, ReadPermission, Topology, WritePermission};
pub use schema::{ComponentDef, ObjectSchema, SchemaBuilder, VariableDef, MAX_VARIABLES};
