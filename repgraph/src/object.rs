//! Replicated objects: a flat variable table checked against a layout.

use std::fmt;
use std::rc::Rc;

use schema::{schema_hash, ClientId, ObjectId, ObjectSchema, VariableKey};
use variable::{ObjectAuthority, ReplicatedVariable};

use crate::error::{ReplicationError, ReplicationResult};

/// The replicated state of one object.
///
/// Variables are addressed by `(component, field)` and stored in wire-index
/// order. Two components may reuse a field id without colliding. An object is
/// built before it is spawned; until then its variables are freely writable.
pub struct ReplicatedObject {
    schema: ObjectSchema,
    layout_hash: u64,
    slots: Vec<Option<Box<dyn ReplicatedVariable>>>,
    authority: Option<Rc<ObjectAuthority>>,
}

impl ReplicatedObject {
    /// Creates an empty object for a validated layout.
    pub fn new(schema: ObjectSchema) -> ReplicationResult<Self> {
        schema.validate()?;
        let layout_hash = schema_hash(&schema);
        let slots = (0..schema.len()).map(|_| None).collect();
        Ok(Self {
            schema,
            layout_hash,
            slots,
            authority: None,
        })
    }

    /// Adds a variable, builder style.
    pub fn with(
        mut self,
        key: VariableKey,
        variable: impl ReplicatedVariable,
    ) -> ReplicationResult<Self> {
        self.insert(key, Box::new(variable))?;
        Ok(self)
    }

    /// Places a variable in the slot declared for `key`.
    ///
    /// The variable's kind and permissions must match the declaration.
    pub fn insert(
        &mut self,
        key: VariableKey,
        mut variable: Box<dyn ReplicatedVariable>,
    ) -> ReplicationResult<()> {
        let index = self
            .schema
            .index_of(key)
            .ok_or(ReplicationError::UnknownVariable { key })?;
        let (_, def) = self
            .schema
            .variable(index)
            .ok_or(ReplicationError::UnknownVariable { key })?;
        let found = variable.kind();
        if found != def.kind {
            return Err(ReplicationError::KindMismatch {
                key,
                expected: def.kind.clone(),
                found,
            });
        }
        if variable.permissions() != def.permissions {
            return Err(ReplicationError::PermissionMismatch { key });
        }
        if self.slots[index].is_some() {
            return Err(ReplicationError::DuplicateVariable { key });
        }
        if let Some(authority) = &self.authority {
            variable.attach(Rc::downgrade(authority));
        }
        self.slots[index] = Some(variable);
        Ok(())
    }

    /// Fails with the first declared variable that has no slot filled.
    pub fn ensure_complete(&self) -> ReplicationResult<()> {
        match self.keys().zip(&self.slots).find(|(_, slot)| slot.is_none()) {
            Some((key, _)) => Err(ReplicationError::MissingVariable { key }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    #[must_use]
    pub const fn layout_hash(&self) -> u64 {
        self.layout_hash
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Keys in wire-index order.
    pub fn keys(&self) -> impl Iterator<Item = VariableKey> + '_ {
        self.schema.variables().map(|(key, _)| key)
    }

    /// Returns the shared authority once the object is spawned.
    #[must_use]
    pub const fn authority(&self) -> Option<&Rc<ObjectAuthority>> {
        self.authority.as_ref()
    }

    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        self.authority.as_ref().map(|a| a.object_id())
    }

    #[must_use]
    pub fn owner(&self) -> Option<ClientId> {
        self.authority.as_ref().map(|a| a.owner())
    }

    #[must_use]
    pub fn get(&self, key: VariableKey) -> Option<&dyn ReplicatedVariable> {
        let index = self.schema.index_of(key)?;
        self.slots.get(index)?.as_deref()
    }

    pub fn get_mut(&mut self, key: VariableKey) -> Option<&mut (dyn ReplicatedVariable + 'static)> {
        let index = self.schema.index_of(key)?;
        self.slots.get_mut(index)?.as_deref_mut()
    }

    /// Returns the variable at `key` as its concrete type.
    #[must_use]
    pub fn variable<V: ReplicatedVariable>(&self, key: VariableKey) -> Option<&V> {
        self.get(key)?.as_any().downcast_ref()
    }

    pub fn variable_mut<V: ReplicatedVariable>(&mut self, key: VariableKey) -> Option<&mut V> {
        self.get_mut(key)?.as_any_mut().downcast_mut()
    }

    /// Returns `true` if any variable is dirty, without rechecking.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.slots.iter().flatten().any(|variable| variable.is_dirty())
    }

    pub(crate) fn bind(&mut self, authority: &Rc<ObjectAuthority>) {
        for variable in self.slots.iter_mut().flatten() {
            variable.attach(Rc::downgrade(authority));
        }
        self.authority = Some(Rc::clone(authority));
    }

    pub(crate) fn slot(&self, index: usize) -> Option<(VariableKey, &dyn ReplicatedVariable)> {
        let (key, _) = self.schema.variable(index)?;
        let variable = self.slots.get(index)?.as_deref()?;
        Some((key, variable))
    }

    pub(crate) fn slot_mut(
        &mut self,
        index: usize,
    ) -> Option<(VariableKey, &mut (dyn ReplicatedVariable + 'static))> {
        let (key, _) = self.schema.variable(index)?;
        let variable = self.slots.get_mut(index)?.as_deref_mut()?;
        Some((key, variable))
    }

    pub(crate) fn slots_mut(
        &mut self,
    ) -> impl Iterator<Item = (usize, VariableKey, &mut (dyn ReplicatedVariable + 'static))> {
        self.schema
            .variables()
            .map(|(key, _)| key)
            .zip(self.slots.iter_mut())
            .enumerate()
            .filter_map(|(index, (key, slot))| Some((index, key, slot.as_deref_mut()?)))
    }
}

impl fmt::Debug for ReplicatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedObject")
            .field("layout_hash", &format_args!("0x{:016X}", self.layout_hash))
            .field("variables", &self.slots.len())
            .field("object_id", &self.object_id())
            .field("owner", &self.owner())
            .finish_non_exhaustive()
    }
}
