//! Event-based replicated set.
//!
//! Delta layout: `[varint event count]([tag][payload])*`.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Weak;

use bitstream::{BufferReader, BufferWriter};
use codec::{DecodeContext, DeltaSection, NetworkValue, RejectReason};
use schema::{Permissions, ValueKind};
use tracing::warn;

use crate::authority::{self, ObjectAuthority};
use crate::error::{VariableError, VariableResult};
use crate::listeners::{Listeners, SubscriptionId};
use crate::replicated::ReplicatedVariable;

const TAG_ADD: u8 = 0;
const TAG_REMOVE: u8 = 1;
const TAG_CLEAR: u8 = 2;
const TAG_FULL: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum SetEvent<T> {
    Add(T),
    Remove(T),
    Clear,
    Full,
}

type SetCallback<T> = dyn FnMut(&SetEvent<T>);

/// A replicated `HashSet<T>` synchronized as a stream of operations.
pub struct NetworkSet<T> {
    items: HashSet<T>,
    pending: Vec<SetEvent<T>>,
    permissions: Permissions,
    authority: Weak<ObjectAuthority>,
    listeners: Listeners<SetCallback<T>>,
    last_modified_tick: Option<u32>,
}

impl<T> NetworkSet<T>
where
    T: NetworkValue + Eq + Hash,
{
    #[must_use]
    pub fn new(items: HashSet<T>) -> Self {
        Self::with_permissions(items, Permissions::default())
    }

    #[must_use]
    pub fn with_permissions(items: HashSet<T>, permissions: Permissions) -> Self {
        Self {
            items,
            pending: Vec::new(),
            permissions,
            authority: Weak::new(),
            listeners: Listeners::new(),
            last_modified_tick: None,
        }
    }

    #[must_use]
    pub const fn as_set(&self) -> &HashSet<T> {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.items.contains(value)
    }

    #[must_use]
    pub fn pending_events(&self) -> &[SetEvent<T>] {
        &self.pending
    }

    /// Returns `false` if the value was already present.
    pub fn insert(&mut self, value: T) -> VariableResult<bool> {
        self.ensure_writable()?;
        if !self.items.insert(value.duplicate()) {
            return Ok(false);
        }
        self.queue(SetEvent::Add(value));
        Ok(true)
    }

    /// Returns `false` if the value was absent.
    pub fn remove(&mut self, value: &T) -> VariableResult<bool> {
        self.ensure_writable()?;
        let Some(value) = self.items.take(value) else {
            return Ok(false);
        };
        self.queue(SetEvent::Remove(value));
        Ok(true)
    }

    pub fn clear(&mut self) -> VariableResult<()> {
        self.ensure_writable()?;
        self.items.clear();
        self.queue(SetEvent::Clear);
        Ok(())
    }

    /// Registers a callback invoked once per applied operation, local or
    /// received.
    pub fn on_set_changed(&mut self, callback: impl FnMut(&SetEvent<T>) + 'static) -> SubscriptionId {
        self.listeners.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn ensure_writable(&self) -> VariableResult<()> {
        match authority::write_denied(&self.authority, self.permissions) {
            None => Ok(()),
            Some(err) => {
                warn!(%err, "set operation denied");
                Err(err.into())
            }
        }
    }

    fn queue(&mut self, event: SetEvent<T>) {
        self.notify(&event);
        self.pending.push(event);
    }

    fn notify(&mut self, event: &SetEvent<T>) {
        for callback in self.listeners.iter_mut() {
            callback(event);
        }
    }

    fn write_event(&self, event: &SetEvent<T>, writer: &mut BufferWriter) -> VariableResult<()> {
        match event {
            SetEvent::Add(value) => {
                writer.write_byte(TAG_ADD)?;
                value.write(writer)?;
            }
            SetEvent::Remove(value) => {
                writer.write_byte(TAG_REMOVE)?;
                value.write(writer)?;
            }
            SetEvent::Clear => writer.write_byte(TAG_CLEAR)?,
            SetEvent::Full => {
                writer.write_byte(TAG_FULL)?;
                self.items.write(writer)?;
            }
        }
        Ok(())
    }

    fn apply_event(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<Option<SetEvent<T>>> {
        let event = match reader.read_byte()? {
            TAG_ADD => {
                let value = T::read(reader, ctx)?;
                if self.items.contains(&value) {
                    ctx.reject(DeltaSection::Added, RejectReason::DuplicateKey);
                    return Ok(None);
                }
                if !ctx.can_grow(self.items.len()) {
                    let limit = ctx.limits().max_collection_len;
                    ctx.reject(DeltaSection::Added, RejectReason::CapacityExceeded { limit });
                    return Ok(None);
                }
                self.items.insert(value.duplicate());
                SetEvent::Add(value)
            }
            TAG_REMOVE => {
                let value = T::read(reader, ctx)?;
                let Some(value) = self.items.take(&value) else {
                    ctx.reject(DeltaSection::Removed, RejectReason::MissingKey);
                    return Ok(None);
                };
                SetEvent::Remove(value)
            }
            TAG_CLEAR => {
                self.items.clear();
                SetEvent::Clear
            }
            TAG_FULL => {
                self.items.read_in_place(reader, ctx)?;
                SetEvent::Full
            }
            tag => return Err(VariableError::InvalidEvent { tag }),
        };
        Ok(Some(event))
    }
}

impl<T> ReplicatedVariable for NetworkSet<T>
where
    T: NetworkValue + Eq + Hash,
{
    fn kind(&self) -> ValueKind {
        ValueKind::hash_set(T::kind())
    }

    fn permissions(&self) -> Permissions {
        self.permissions
    }

    fn attach(&mut self, authority: Weak<ObjectAuthority>) {
        self.authority = authority;
    }

    fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.pending.clear();
        if dirty {
            self.pending.push(SetEvent::Full);
        }
    }

    fn reset_dirty(&mut self) {
        self.pending.clear();
    }

    fn check_dirty_state(&mut self) -> VariableResult<bool> {
        Ok(self.is_dirty())
    }

    fn encode_field(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.items.write(writer)?;
        Ok(())
    }

    fn encode_delta(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        if self.pending.iter().any(|event| matches!(event, SetEvent::Full)) {
            writer.write_len(1)?;
            return self.write_event(&SetEvent::Full, writer);
        }
        writer.write_len(self.pending.len())?;
        for event in &self.pending {
            self.write_event(event, writer)?;
        }
        Ok(())
    }

    fn commit(&mut self) {
        self.pending.clear();
    }

    fn read_field(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<()> {
        self.items.read_in_place(reader, ctx)?;
        self.pending.clear();
        self.notify(&SetEvent::Full);
        Ok(())
    }

    fn read_delta(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
        keep_dirty_delta: bool,
    ) -> VariableResult<()> {
        let count = reader.read_len()?;
        ctx.check_collection_len(count)?;
        for _ in 0..count {
            let Some(event) = self.apply_event(reader, ctx)? else {
                continue;
            };
            self.notify(&event);
            if keep_dirty_delta {
                self.pending.push(event);
            }
        }
        Ok(())
    }

    fn last_modified_tick(&self) -> Option<u32> {
        self.last_modified_tick
    }

    fn set_last_modified_tick(&mut self, tick: u32) {
        self.last_modified_tick = Some(tick);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for NetworkSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSet")
            .field("items", &self.items)
            .field("pending", &self.pending.len())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}
