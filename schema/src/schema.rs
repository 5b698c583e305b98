//! Object layouts and validation.

use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::{ComponentId, FieldId, Permissions, ValueKind, VariableKey};

/// Maximum number of variables addressable on one object.
pub const MAX_VARIABLES: usize = u16::MAX as usize;

/// A replicated variable definition within a component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableDef {
    pub id: FieldId,
    pub name: String,
    pub kind: ValueKind,
    pub permissions: Permissions,
}

impl VariableDef {
    /// Creates a server-written variable definition.
    #[must_use]
    pub fn new(id: FieldId, name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            permissions: Permissions::default(),
        }
    }

    /// Sets the permission descriptor.
    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// A component: a named group of variables on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentDef {
    pub id: ComponentId,
    pub variables: Vec<VariableDef>,
}

impl ComponentDef {
    /// Creates a new component with no variables.
    #[must_use]
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            variables: Vec::new(),
        }
    }

    /// Adds a variable to the component.
    #[must_use]
    pub fn variable(mut self, variable: VariableDef) -> Self {
        self.variables.push(variable);
        self
    }
}

/// The full variable layout of a replicated object.
///
/// Variables are addressed by a dense index in declaration order; the index
/// is what travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectSchema {
    pub components: Vec<ComponentDef>,
}

impl ObjectSchema {
    /// Creates a schema from components after validation.
    pub fn new(components: Vec<ComponentDef>) -> SchemaResult<Self> {
        let schema = Self { components };
        schema.validate()?;
        Ok(schema)
    }

    /// Creates a schema builder.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Validates schema invariants.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut component_ids = HashSet::new();
        let mut count = 0usize;
        for component in &self.components {
            if !component_ids.insert(component.id) {
                return Err(SchemaError::DuplicateComponentId { id: component.id });
            }

            let mut field_ids = HashSet::new();
            for variable in &component.variables {
                if !field_ids.insert(variable.id) {
                    return Err(SchemaError::DuplicateFieldId {
                        component: component.id,
                        field: variable.id,
                    });
                }
                validate_kind(&variable.kind)?;
            }
            count += component.variables.len();
        }
        if count > MAX_VARIABLES {
            return Err(SchemaError::TooManyVariables {
                count,
                max: MAX_VARIABLES,
            });
        }
        Ok(())
    }

    /// Returns the number of variables across all components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.iter().map(|c| c.variables.len()).sum()
    }

    /// Returns `true` if the layout has no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates variables in wire-index order.
    pub fn variables(&self) -> impl Iterator<Item = (VariableKey, &VariableDef)> {
        self.components.iter().flat_map(|component| {
            component.variables.iter().map(move |variable| {
                (
                    VariableKey {
                        component: component.id,
                        field: variable.id,
                    },
                    variable,
                )
            })
        })
    }

    /// Returns the wire index of a variable.
    #[must_use]
    pub fn index_of(&self, key: VariableKey) -> Option<usize> {
        self.variables().position(|(candidate, _)| candidate == key)
    }

    /// Returns the variable at a wire index.
    #[must_use]
    pub fn variable(&self, index: usize) -> Option<(VariableKey, &VariableDef)> {
        self.variables().nth(index)
    }
}

/// Builder for [`ObjectSchema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    components: Vec<ComponentDef>,
}

impl SchemaBuilder {
    /// Adds a component definition.
    #[must_use]
    pub fn component(mut self, component: ComponentDef) -> Self {
        self.components.push(component);
        self
    }

    /// Builds the schema after validation.
    pub fn build(self) -> SchemaResult<ObjectSchema> {
        ObjectSchema::new(self.components)
    }
}

fn validate_kind(kind: &ValueKind) -> SchemaResult<()> {
    match kind {
        ValueKind::UInt { bits } | ValueKind::SInt { bits } | ValueKind::Enum { bits } => {
            if *bits == 0 || *bits > 128 {
                return Err(SchemaError::InvalidBitWidth { bits: *bits });
            }
        }
        ValueKind::Float { bits } => {
            if *bits != 32 && *bits != 64 {
                return Err(SchemaError::InvalidFloatWidth { bits: *bits });
            }
        }
        ValueKind::FixedString { capacity } => {
            if *capacity == 0 {
                return Err(SchemaError::ZeroStringCapacity);
            }
        }
        ValueKind::Custom { name } => {
            if name.is_empty() {
                return Err(SchemaError::EmptyCustomName);
            }
        }
        ValueKind::Option(inner) | ValueKind::List(inner) | ValueKind::HashSet(inner) => {
            validate_kind(inner)?;
        }
        ValueKind::Dictionary(key, value) => {
            validate_kind(key)?;
            validate_kind(value)?;
        }
        ValueKind::Struct(fields) => {
            for field in fields {
                validate_kind(field)?;
            }
        }
        ValueKind::Bool => {}
    }
    Ok(())
}
