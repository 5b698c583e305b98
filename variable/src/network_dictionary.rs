//! Event-based replicated dictionary.
//!
//! Delta layout: `[varint event count]([tag][payload])*`, where Add and Value
//! carry a key and a value, Remove carries a key, and Full carries the whole
//! map.

use std::any::Any;
use std::collections::HashMap;
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
const TAG_VALUE: u8 = 2;
const TAG_CLEAR: u8 = 3;
const TAG_FULL: u8 = 4;

/// One dictionary operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DictionaryEvent<K, V> {
    Add { key: K, value: V },
    Remove { key: K, value: V },
    /// An existing key took a new value.
    Value { key: K, previous: V, value: V },
    Clear,
    Full,
}

type DictionaryCallback<K, V> = dyn FnMut(&DictionaryEvent<K, V>);

/// A replicated `HashMap<K, V>` synchronized as a stream of operations.
pub struct NetworkDictionary<K, V> {
    entries: HashMap<K, V>,
    pending: Vec<DictionaryEvent<K, V>>,
    permissions: Permissions,
    authority: Weak<ObjectAuthority>,
    listeners: Listeners<DictionaryCallback<K, V>>,
    last_modified_tick: Option<u32>,
}

impl<K, V> NetworkDictionary<K, V>
where
    K: NetworkValue + Eq + Hash,
    V: NetworkValue,
{
    #[must_use]
    pub fn new(entries: HashMap<K, V>) -> Self {
        Self::with_permissions(entries, Permissions::default())
    }

    #[must_use]
    pub fn with_permissions(entries: HashMap<K, V>, permissions: Permissions) -> Self {
        Self {
            entries,
            pending: Vec::new(),
            permissions,
            authority: Weak::new(),
            listeners: Listeners::new(),
            last_modified_tick: None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> &HashMap<K, V> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Operations queued since the last commit.
    #[must_use]
    pub fn pending_events(&self) -> &[DictionaryEvent<K, V>] {
        &self.pending
    }

    /// Adds or replaces the value under `key` and returns the previous one.
    /// Storing an equal value queues nothing.
    pub fn insert(&mut self, key: K, value: V) -> VariableResult<Option<V>> {
        self.ensure_writable()?;
        if let Some(slot) = self.entries.get_mut(&key) {
            if slot.are_equal(&value) {
                return Ok(Some(value));
            }
            let previous = std::mem::replace(slot, value.duplicate());
            self.queue(DictionaryEvent::Value {
                key,
                previous: previous.duplicate(),
                value,
            });
            return Ok(Some(previous));
        }
        self.entries.insert(key.duplicate(), value.duplicate());
        self.queue(DictionaryEvent::Add { key, value });
        Ok(None)
    }

    pub fn remove(&mut self, key: &K) -> VariableResult<Option<V>> {
        self.ensure_writable()?;
        let Some((key, value)) = self.entries.remove_entry(key) else {
            return Ok(None);
        };
        self.queue(DictionaryEvent::Remove {
            key,
            value: value.duplicate(),
        });
        Ok(Some(value))
    }

    pub fn clear(&mut self) -> VariableResult<()> {
        self.ensure_writable()?;
        self.entries.clear();
        self.queue(DictionaryEvent::Clear);
        Ok(())
    }

    /// Registers a callback invoked once per applied operation, local or
    /// received.
    pub fn on_dictionary_changed(
        &mut self,
        callback: impl FnMut(&DictionaryEvent<K, V>) + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn ensure_writable(&self) -> VariableResult<()> {
        match authority::write_denied(&self.authority, self.permissions) {
            None => Ok(()),
            Some(err) => {
                warn!(%err, "dictionary operation denied");
                Err(err.into())
            }
        }
    }

    fn queue(&mut self, event: DictionaryEvent<K, V>) {
        self.notify(&event);
        self.pending.push(event);
    }

    fn notify(&mut self, event: &DictionaryEvent<K, V>) {
        for callback in self.listeners.iter_mut() {
            callback(event);
        }
    }

    fn write_event(
        &self,
        event: &DictionaryEvent<K, V>,
        writer: &mut BufferWriter,
    ) -> VariableResult<()> {
        match event {
            DictionaryEvent::Add { key, value } => {
                writer.write_byte(TAG_ADD)?;
                key.write(writer)?;
                value.write(writer)?;
            }
            DictionaryEvent::Remove { key, .. } => {
                writer.write_byte(TAG_REMOVE)?;
                key.write(writer)?;
            }
            DictionaryEvent::Value { key, value, .. } => {
                writer.write_byte(TAG_VALUE)?;
                key.write(writer)?;
                value.write(writer)?;
            }
            DictionaryEvent::Clear => writer.write_byte(TAG_CLEAR)?,
            DictionaryEvent::Full => {
                writer.write_byte(TAG_FULL)?;
                self.entries.write(writer)?;
            }
        }
        Ok(())
    }

    /// Decodes and applies one event. Returns `None` if it was rejected.
    fn apply_event(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<Option<DictionaryEvent<K, V>>> {
        let event = match reader.read_byte()? {
            TAG_ADD => {
                let key = K::read(reader, ctx)?;
                let value = V::read(reader, ctx)?;
                if self.entries.contains_key(&key) {
                    ctx.reject(DeltaSection::Added, RejectReason::DuplicateKey);
                    return Ok(None);
                }
                if !ctx.can_grow(self.entries.len()) {
                    let limit = ctx.limits().max_collection_len;
                    ctx.reject(DeltaSection::Added, RejectReason::CapacityExceeded { limit });
                    return Ok(None);
                }
                self.entries.insert(key.duplicate(), value.duplicate());
                DictionaryEvent::Add { key, value }
            }
            TAG_REMOVE => {
                let key = K::read(reader, ctx)?;
                let Some((key, value)) = self.entries.remove_entry(&key) else {
                    ctx.reject(DeltaSection::Removed, RejectReason::MissingKey);
                    return Ok(None);
                };
                DictionaryEvent::Remove { key, value }
            }
            TAG_VALUE => {
                let key = K::read(reader, ctx)?;
                let value = V::read(reader, ctx)?;
                let Some(slot) = self.entries.get_mut(&key) else {
                    ctx.reject(DeltaSection::Changed, RejectReason::MissingKey);
                    return Ok(None);
                };
                let previous = std::mem::replace(slot, value.duplicate());
                DictionaryEvent::Value {
                    key,
                    previous,
                    value,
                }
            }
            TAG_CLEAR => {
                self.entries.clear();
                DictionaryEvent::Clear
            }
            TAG_FULL => {
                self.entries.read_in_place(reader, ctx)?;
                DictionaryEvent::Full
            }
            tag => return Err(VariableError::InvalidEvent { tag }),
        };
        Ok(Some(event))
    }
}

impl<K, V> ReplicatedVariable for NetworkDictionary<K, V>
where
    K: NetworkValue + Eq + Hash,
    V: NetworkValue,
{
    fn kind(&self) -> ValueKind {
        ValueKind::dictionary(K::kind(), V::kind())
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

    /// Marking dirty queues a full resend.
    fn set_dirty(&mut self, dirty: bool) {
        self.pending.clear();
        if dirty {
            self.pending.push(DictionaryEvent::Full);
        }
    }

    fn reset_dirty(&mut self) {
        self.pending.clear();
    }

    fn check_dirty_state(&mut self) -> VariableResult<bool> {
        Ok(self.is_dirty())
    }

    fn encode_field(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.entries.write(writer)?;
        Ok(())
    }

    fn encode_delta(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        if self
            .pending
            .iter()
            .any(|event| matches!(event, DictionaryEvent::Full))
        {
            writer.write_len(1)?;
            return self.write_event(&DictionaryEvent::Full, writer);
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
        self.entries.read_in_place(reader, ctx)?;
        self.pending.clear();
        self.notify(&DictionaryEvent::Full);
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

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for NetworkDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkDictionary")
            .field("entries", &self.entries)
            .field("pending", &self.pending.len())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}
