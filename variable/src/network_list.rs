//! Event-based replicated list.
//!
//! Instead of diffing snapshots, every local operation is queued as a
//! [`ListEvent`] and the queue is the delta. Delta layout:
//! `[varint event count]([tag][payload])*`.

use std::any::Any;
use std::fmt;
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
const TAG_INSERT: u8 = 1;
const TAG_REMOVE: u8 = 2;
const TAG_REMOVE_AT: u8 = 3;
const TAG_SET: u8 = 4;
const TAG_CLEAR: u8 = 5;
const TAG_FULL: u8 = 6;

/// One list operation, as queued by the writer and reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent<T> {
    Add { index: usize, value: T },
    Insert { index: usize, value: T },
    Remove { index: usize, value: T },
    RemoveAt { index: usize, value: T },
    Set { index: usize, previous: T, value: T },
    Clear,
    /// The whole list was replaced.
    Full,
}

type ListCallback<T> = dyn FnMut(&ListEvent<T>);

/// A replicated `Vec<T>` synchronized as a stream of operations.
pub struct NetworkList<T> {
    items: Vec<T>,
    pending: Vec<ListEvent<T>>,
    permissions: Permissions,
    authority: Weak<ObjectAuthority>,
    listeners: Listeners<ListCallback<T>>,
    last_modified_tick: Option<u32>,
}

impl<T: NetworkValue> NetworkList<T> {
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self::with_permissions(items, Permissions::default())
    }

    #[must_use]
    pub fn with_permissions(items: Vec<T>, permissions: Permissions) -> Self {
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
    pub fn as_slice(&self) -> &[T] {
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
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    #[must_use]
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.items.iter().position(|item| item.are_equal(value))
    }

    /// Operations queued since the last commit.
    #[must_use]
    pub fn pending_events(&self) -> &[ListEvent<T>] {
        &self.pending
    }

    pub fn push(&mut self, value: T) -> VariableResult<()> {
        self.ensure_writable()?;
        let index = self.items.len();
        self.items.push(value.duplicate());
        self.queue(ListEvent::Add { index, value });
        Ok(())
    }

    pub fn insert(&mut self, index: usize, value: T) -> VariableResult<()> {
        self.ensure_writable()?;
        self.check_index(index, self.items.len() + 1)?;
        self.items.insert(index, value.duplicate());
        self.queue(ListEvent::Insert { index, value });
        Ok(())
    }

    /// Removes the first element equal to `value`; returns `false` if none.
    pub fn remove(&mut self, value: &T) -> VariableResult<bool> {
        self.ensure_writable()?;
        let Some(index) = self.index_of(value) else {
            return Ok(false);
        };
        let value = self.items.remove(index);
        self.queue(ListEvent::Remove { index, value });
        Ok(true)
    }

    pub fn remove_at(&mut self, index: usize) -> VariableResult<T> {
        self.ensure_writable()?;
        self.check_index(index, self.items.len())?;
        let value = self.items.remove(index);
        self.queue(ListEvent::RemoveAt {
            index,
            value: value.duplicate(),
        });
        Ok(value)
    }

    /// Replaces the element at `index`. Setting an equal value queues nothing.
    pub fn set(&mut self, index: usize, value: T) -> VariableResult<()> {
        self.ensure_writable()?;
        self.check_index(index, self.items.len())?;
        if self.items[index].are_equal(&value) {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.items[index], value.duplicate());
        self.queue(ListEvent::Set {
            index,
            previous,
            value,
        });
        Ok(())
    }

    pub fn clear(&mut self) -> VariableResult<()> {
        self.ensure_writable()?;
        self.items.clear();
        self.queue(ListEvent::Clear);
        Ok(())
    }

    /// Registers a callback invoked once per applied operation, local or
    /// received.
    pub fn on_list_changed(
        &mut self,
        callback: impl FnMut(&ListEvent<T>) + 'static,
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
                warn!(%err, "list operation denied");
                Err(err.into())
            }
        }
    }

    /// Reports a local operation and queues it for the next delta.
    fn queue(&mut self, event: ListEvent<T>) {
        self.notify(&event);
        self.pending.push(event);
    }

    fn check_index(&self, index: usize, bound: usize) -> VariableResult<()> {
        if index >= bound {
            return Err(VariableError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    fn write_event(&self, event: &ListEvent<T>, writer: &mut BufferWriter) -> VariableResult<()> {
        match event {
            ListEvent::Add { value, .. } => {
                writer.write_byte(TAG_ADD)?;
                value.write(writer)?;
            }
            ListEvent::Insert { index, value } => {
                writer.write_byte(TAG_INSERT)?;
                writer.write_len(*index)?;
                value.write(writer)?;
            }
            ListEvent::Remove { value, .. } => {
                writer.write_byte(TAG_REMOVE)?;
                value.write(writer)?;
            }
            ListEvent::RemoveAt { index, .. } => {
                writer.write_byte(TAG_REMOVE_AT)?;
                writer.write_len(*index)?;
            }
            ListEvent::Set { index, value, .. } => {
                writer.write_byte(TAG_SET)?;
                writer.write_len(*index)?;
                value.write(writer)?;
            }
            ListEvent::Clear => writer.write_byte(TAG_CLEAR)?,
            ListEvent::Full => {
                writer.write_byte(TAG_FULL)?;
                self.items.write(writer)?;
            }
        }
        Ok(())
    }

    /// Decodes and applies one event. Returns `None` if it was rejected.
    fn apply_event(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<Option<ListEvent<T>>> {
        let tag = reader.read_byte()?;
        let event = match tag {
            TAG_ADD => {
                let value = T::read(reader, ctx)?;
                if !self.has_room(ctx) {
                    return Ok(None);
                }
                let index = self.items.len();
                self.items.push(value.duplicate());
                ListEvent::Add { index, value }
            }
            TAG_INSERT => {
                let index = reader.read_len()?;
                let value = T::read(reader, ctx)?;
                if index > self.items.len() {
                    ctx.reject(
                        DeltaSection::Added,
                        RejectReason::IndexGap {
                            index,
                            len: self.items.len(),
                        },
                    );
                    return Ok(None);
                }
                if !self.has_room(ctx) {
                    return Ok(None);
                }
                self.items.insert(index, value.duplicate());
                ListEvent::Insert { index, value }
            }
            TAG_REMOVE => {
                let value = T::read(reader, ctx)?;
                let Some(index) = self.index_of(&value) else {
                    ctx.reject(DeltaSection::Removed, RejectReason::MissingKey);
                    return Ok(None);
                };
                let value = self.items.remove(index);
                ListEvent::Remove { index, value }
            }
            TAG_REMOVE_AT => {
                let index = reader.read_len()?;
                if index >= self.items.len() {
                    ctx.reject(DeltaSection::Removed, RejectReason::MissingElement { index });
                    return Ok(None);
                }
                let value = self.items.remove(index);
                ListEvent::RemoveAt { index, value }
            }
            TAG_SET => {
                let index = reader.read_len()?;
                let value = T::read(reader, ctx)?;
                let Some(slot) = self.items.get_mut(index) else {
                    ctx.reject(DeltaSection::Changed, RejectReason::MissingElement { index });
                    return Ok(None);
                };
                let previous = std::mem::replace(slot, value.duplicate());
                ListEvent::Set {
                    index,
                    previous,
                    value,
                }
            }
            TAG_CLEAR => {
                self.items.clear();
                ListEvent::Clear
            }
            TAG_FULL => {
                self.items.read_in_place(reader, ctx)?;
                ListEvent::Full
            }
            tag => return Err(VariableError::InvalidEvent { tag }),
        };
        Ok(Some(event))
    }

    /// Rejects growth past the decode length limit.
    fn has_room(&self, ctx: &mut DecodeContext) -> bool {
        if ctx.can_grow(self.items.len()) {
            return true;
        }
        let limit = ctx.limits().max_collection_len;
        ctx.reject(DeltaSection::Added, RejectReason::CapacityExceeded { limit });
        false
    }

    fn notify(&mut self, event: &ListEvent<T>) {
        for callback in self.listeners.iter_mut() {
            callback(event);
        }
    }
}

impl<T: NetworkValue> ReplicatedVariable for NetworkList<T> {
    fn kind(&self) -> ValueKind {
        ValueKind::list(T::kind())
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
            self.pending.push(ListEvent::Full);
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
        if self.pending.iter().any(|event| matches!(event, ListEvent::Full)) {
            writer.write_len(1)?;
            return self.write_event(&ListEvent::Full, writer);
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
        self.notify(&ListEvent::Full);
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

impl<T: fmt::Debug> fmt::Debug for NetworkList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkList")
            .field("items", &self.items)
            .field("pending", &self.pending.len())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use codec::{CodecLimits, RejectedEntry};
    use schema::{ClientId, ObjectId, Topology};

    use super::*;

    fn sync(from: &mut NetworkList<u32>, to: &mut NetworkList<u32>) -> Vec<RejectedEntry> {
        let mut writer = BufferWriter::with_max_capacity(64, 1 << 16);
        from.write_delta(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut ctx = DecodeContext::default();
        to.read_delta(&mut BufferReader::new(&bytes), &mut ctx, false)
            .unwrap();
        ctx.take_rejected()
    }

    #[test]
    fn operations_replicate_in_order() {
        let mut server = NetworkList::new(vec![1u32, 2, 3]);
        let mut client = NetworkList::new(vec![1u32, 2, 3]);

        server.push(4).unwrap();
        server.insert(0, 0).unwrap();
        assert!(server.remove(&2).unwrap());
        assert_eq!(server.remove_at(1).unwrap(), 1);
        server.set(0, 10).unwrap();
        assert!(server.is_dirty());

        assert!(sync(&mut server, &mut client).is_empty());
        assert_eq!(client.as_slice(), server.as_slice());
        assert_eq!(client.as_slice(), &[10, 3, 4]);
        assert!(!server.is_dirty());
    }

    #[test]
    fn observers_see_each_applied_event() {
        let mut server = NetworkList::new(vec![5u32]);
        let mut client = NetworkList::new(vec![5u32]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        client.on_list_changed(move |event| log.borrow_mut().push(event.clone()));

        server.set(0, 6).unwrap();
        server.clear().unwrap();
        sync(&mut server, &mut client);

        assert_eq!(
            *seen.borrow(),
            vec![
                ListEvent::Set {
                    index: 0,
                    previous: 5,
                    value: 6
                },
                ListEvent::Clear
            ]
        );
    }

    #[test]
    fn out_of_range_events_are_rejected_and_rest_applies() {
        let mut server = NetworkList::new(vec![1u32, 2, 3, 4]);
        let mut client = NetworkList::new(vec![1u32]);

        server.remove_at(3).unwrap();
        server.push(9).unwrap();
        let rejected = sync(&mut server, &mut client);

        assert_eq!(rejected.len(), 1);
        assert_eq!(
            rejected[0].reason,
            RejectReason::MissingElement { index: 3 }
        );
        assert_eq!(client.as_slice(), &[1, 9]);
    }

    #[test]
    fn set_dirty_sends_full_list() {
        let mut server = NetworkList::new(vec![7u32, 8]);
        let mut client = NetworkList::<u32>::new(Vec::new());
        server.set_dirty(true);
        sync(&mut server, &mut client);
        assert_eq!(client.as_slice(), &[7, 8]);
    }

    #[test]
    fn keep_dirty_delta_requeues_events() {
        let mut owner = NetworkList::<u32>::new(Vec::new());
        let mut server = NetworkList::<u32>::new(Vec::new());
        owner.push(1).unwrap();

        let mut writer = BufferWriter::new(32);
        owner.write_delta(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        server
            .read_delta(&mut BufferReader::new(&bytes), &mut DecodeContext::default(), true)
            .unwrap();
        assert_eq!(
            server.pending_events(),
            &[ListEvent::Add { index: 0, value: 1 }]
        );
    }

    #[test]
    fn denied_operation_does_not_mutate() {
        let authority = Rc::new(ObjectAuthority::new(
            ObjectId::new(1),
            ClientId::new(5),
            ClientId::SERVER,
            Topology::ClientServer,
        ));
        authority.set_spawned(true);
        let mut list = NetworkList::new(vec![1u32]);
        list.attach(Rc::downgrade(&authority));

        assert!(matches!(
            list.push(2),
            Err(VariableError::Permission(_))
        ));
        assert_eq!(list.as_slice(), &[1]);
        assert!(!list.is_dirty());
    }

    #[test]
    fn local_operations_notify_in_order() {
        let mut list = NetworkList::new(vec![1u32]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        list.on_list_changed(move |event| log.borrow_mut().push(event.clone()));

        list.push(2).unwrap();
        list.set(0, 5).unwrap();
        list.set(0, 5).unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![
                ListEvent::Add { index: 1, value: 2 },
                ListEvent::Set {
                    index: 0,
                    previous: 1,
                    value: 5
                },
            ]
        );
        assert_eq!(list.pending_events(), seen.borrow().as_slice());
    }

    #[test]
    fn received_growth_stops_at_collection_limit() {
        let limits = CodecLimits {
            max_collection_len: 3,
            ..CodecLimits::for_testing()
        };
        let mut server = NetworkList::<u32>::new(Vec::new());
        let mut client = NetworkList::<u32>::new(vec![7, 8]);
        server.push(1).unwrap();
        server.insert(0, 2).unwrap();
        server.push(3).unwrap();

        let mut writer = BufferWriter::new(64);
        server.write_delta(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut ctx = DecodeContext::new(limits);
        client
            .read_delta(&mut BufferReader::new(&bytes), &mut ctx, false)
            .unwrap();

        assert_eq!(client.as_slice(), &[7, 8, 1]);
        assert_eq!(
            ctx.take_rejected(),
            vec![
                RejectedEntry {
                    section: DeltaSection::Added,
                    reason: RejectReason::CapacityExceeded { limit: 3 }
                };
                2
            ]
        );
    }

    #[test]
    fn invalid_index_is_an_error() {
        let mut list = NetworkList::new(vec![1u32]);
        assert!(matches!(
            list.remove_at(4),
            Err(VariableError::IndexOutOfRange { index: 4, len: 1 })
        ));
        assert!(list.insert(1, 2).is_ok());
    }

    #[test]
    fn unknown_event_tag_is_an_error() {
        let mut list = NetworkList::<u32>::new(Vec::new());
        let bytes = [1u8, 0xEE];
        let err = list
            .read_delta(&mut BufferReader::new(&bytes), &mut DecodeContext::default(), false)
            .unwrap_err();
        assert_eq!(err, VariableError::InvalidEvent { tag: 0xEE });
    }
}
