//! Single-value replicated variable.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use bitstream::{BufferReader, BufferWriter};
use codec::{CodecLimits, DecodeContext, DefaultCodec, NetworkValue, ValueCodec};
use schema::{Permissions, ValueKind};
use tracing::{debug, warn};

use crate::authority::{self, ObjectAuthority};
use crate::dirty::DirtyState;
use crate::error::{PermissionError, VariableResult};
use crate::listeners::{Listeners, SubscriptionId};
use crate::replicated::ReplicatedVariable;

type ChangeCallback<T> = dyn FnMut(&T, &T);

/// A value of type `T` synchronized between peers.
///
/// Holds the live value, the last synchronized snapshot, and the dirty state.
/// Containers obtained through [`NetworkVariable::value_mut`] are not tracked
/// automatically: call [`ReplicatedVariable::check_dirty_state`] (or
/// [`ReplicatedVariable::set_dirty`]) after mutating them.
///
/// ```
/// use variable::{NetworkVariable, ReplicatedVariable};
/// use codec::{BufferReader, BufferWriter, DecodeContext};
///
/// let mut sender = NetworkVariable::new(vec![1u8, 2, 3]);
/// let mut receiver = NetworkVariable::new(vec![1u8, 2, 3]);
///
/// sender.value_mut()[1] = 9;
/// assert!(sender.check_dirty_state().unwrap());
///
/// let mut writer = BufferWriter::new(64);
/// sender.write_delta(&mut writer).unwrap();
/// assert!(!sender.is_dirty());
///
/// let bytes = writer.into_bytes();
/// receiver
///     .read_delta(&mut BufferReader::new(&bytes), &mut DecodeContext::default(), false)
///     .unwrap();
/// assert_eq!(receiver.value(), &vec![1, 9, 3]);
/// ```
pub struct NetworkVariable<T, C = DefaultCodec> {
    value: T,
    snapshot: T,
    state: DirtyState,
    permissions: Permissions,
    codec: C,
    authority: Weak<ObjectAuthority>,
    listeners: Listeners<ChangeCallback<T>>,
    last_modified_tick: Option<u32>,
}

impl<T: NetworkValue> NetworkVariable<T> {
    /// Creates a server-writable, everyone-readable variable.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_codec(value, Permissions::default(), DefaultCodec)
    }

    #[must_use]
    pub fn with_permissions(value: T, permissions: Permissions) -> Self {
        Self::with_codec(value, permissions, DefaultCodec)
    }
}

impl<T, C: ValueCodec<T>> NetworkVariable<T, C> {
    /// Creates a variable using an explicit codec handle.
    #[must_use]
    pub fn with_codec(value: T, permissions: Permissions, codec: C) -> Self {
        let snapshot = codec.duplicate(&value);
        Self {
            value,
            snapshot,
            state: DirtyState::Clean,
            permissions,
            codec,
            authority: Weak::new(),
            listeners: Listeners::new(),
            last_modified_tick: None,
        }
    }

    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Mutable access to the live value. Changes are picked up by the next
    /// dirty check.
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// The last synchronized value.
    #[must_use]
    pub const fn snapshot(&self) -> &T {
        &self.snapshot
    }

    #[must_use]
    pub const fn dirty_state(&self) -> DirtyState {
        self.state
    }

    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Links the variable to `authority`; shorthand for
    /// [`ReplicatedVariable::attach`].
    pub fn attach_to(&mut self, authority: &Rc<ObjectAuthority>) {
        self.authority = Rc::downgrade(authority);
    }

    /// Replaces the value.
    ///
    /// Without write permission the value still changes locally, one
    /// [`PermissionError`] is returned, and the next dirty check restores the
    /// snapshot without reporting again. Listeners hear only accepted changes.
    pub fn set(&mut self, value: T) -> VariableResult<()> {
        if self.codec.are_equal(&self.value, &value) {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.value, value);
        if let Some(err) = self.write_denied() {
            warn!(%err, "write denied; value reverts on next check");
            self.state = DirtyState::PendingRevert;
            return Err(err.into());
        }
        self.state = DirtyState::Dirty;
        self.notify(&previous);
        Ok(())
    }

    /// Returns `true` if the local peer may currently write this variable.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.write_denied().is_none()
    }

    /// Registers a callback invoked with `(previous, current)` after every
    /// accepted [`NetworkVariable::set`] and every applied full or delta read.
    pub fn subscribe(&mut self, callback: impl FnMut(&T, &T) + 'static) -> SubscriptionId {
        self.listeners.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn write_denied(&self) -> Option<PermissionError> {
        authority::write_denied(&self.authority, self.permissions)
    }

    fn revert(&mut self) {
        self.value = self.codec.duplicate(&self.snapshot);
        self.state = DirtyState::Clean;
    }

    /// Drops a local change this peer may not make before remote data lands
    /// on top of it.
    fn discard_denied_change(&mut self) {
        let denied = match self.state {
            DirtyState::PendingRevert => true,
            DirtyState::Forwarding => false,
            DirtyState::Dirty => self.write_denied().is_some(),
            DirtyState::Clean => {
                !self.codec.are_equal(&self.value, &self.snapshot) && self.write_denied().is_some()
            }
        };
        if !denied {
            return;
        }
        if self.state == DirtyState::Clean {
            warn!("in-place change without write permission discarded by remote update");
        } else {
            debug!(state = ?self.state, "restoring snapshot before applying remote data");
        }
        self.revert();
    }

    /// Puts `previous` back after a failed read, decoding it into the live
    /// value so containers keep their storage.
    fn restore(&mut self, previous: T) {
        let mut writer = BufferWriter::with_max_capacity(64, usize::MAX);
        if self.codec.write(&previous, &mut writer).is_ok() {
            let mut reader = BufferReader::new(writer.as_slice());
            let mut ctx = DecodeContext::new(CodecLimits::unlimited());
            if self
                .codec
                .read_in_place(&mut self.value, &mut reader, &mut ctx)
                .is_ok()
            {
                return;
            }
        }
        self.value = previous;
    }

    /// The value that may leave this peer: the snapshot while a denied
    /// change is pending.
    fn outgoing(&self) -> &T {
        if self.state == DirtyState::PendingRevert {
            &self.snapshot
        } else {
            &self.value
        }
    }

    fn notify(&mut self, previous: &T) {
        for callback in self.listeners.iter_mut() {
            callback(previous, &self.value);
        }
    }
}

impl<T: 'static, C: ValueCodec<T> + 'static> ReplicatedVariable for NetworkVariable<T, C> {
    fn kind(&self) -> ValueKind {
        self.codec.kind()
    }

    fn permissions(&self) -> Permissions {
        self.permissions
    }

    fn attach(&mut self, authority: Weak<ObjectAuthority>) {
        self.authority = authority;
    }

    fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.state = if dirty {
            DirtyState::Dirty
        } else {
            DirtyState::Clean
        };
    }

    fn reset_dirty(&mut self) {
        self.state = DirtyState::Clean;
    }

    fn check_dirty_state(&mut self) -> VariableResult<bool> {
        match self.state {
            DirtyState::PendingRevert => {
                debug!("restoring snapshot after denied write");
                self.revert();
                Ok(false)
            }
            DirtyState::Forwarding => Ok(true),
            DirtyState::Dirty => {
                if self.write_denied().is_some() {
                    debug!("dropping unsent change after losing write permission");
                    self.revert();
                    return Ok(false);
                }
                Ok(true)
            }
            DirtyState::Clean => {
                if self.codec.are_equal(&self.value, &self.snapshot) {
                    return Ok(false);
                }
                if let Some(err) = self.write_denied() {
                    warn!(%err, "in-place change without write permission reverted");
                    self.revert();
                    return Err(err.into());
                }
                self.state = DirtyState::Dirty;
                Ok(true)
            }
        }
    }

    fn encode_field(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.codec.write(self.outgoing(), writer)?;
        Ok(())
    }

    fn encode_delta(&self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.codec
            .write_delta(self.outgoing(), &self.snapshot, writer)?;
        Ok(())
    }

    fn commit(&mut self) {
        if self.state == DirtyState::PendingRevert {
            self.revert();
            return;
        }
        self.snapshot = self.codec.duplicate(&self.value);
        self.state = DirtyState::Clean;
    }

    fn read_field(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<()> {
        self.discard_denied_change();
        let previous = self.codec.duplicate(&self.value);
        if let Err(err) = self.codec.read_in_place(&mut self.value, reader, ctx) {
            self.restore(previous);
            return Err(err.into());
        }
        self.snapshot = self.codec.duplicate(&self.value);
        self.state = DirtyState::Clean;
        self.notify(&previous);
        Ok(())
    }

    fn read_delta(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
        keep_dirty_delta: bool,
    ) -> VariableResult<()> {
        self.discard_denied_change();
        let previous = self.codec.duplicate(&self.value);
        if let Err(err) = self.codec.read_delta(&mut self.value, reader, ctx) {
            self.restore(previous);
            return Err(err.into());
        }
        if keep_dirty_delta {
            self.state = DirtyState::Forwarding;
        } else {
            self.snapshot = self.codec.duplicate(&self.value);
            self.state = DirtyState::Clean;
        }
        self.notify(&previous);
        Ok(())
    }

    /// A denied local change is reverted here and nothing is written.
    fn write_delta(&mut self, writer: &mut BufferWriter) -> VariableResult<()> {
        if self.state == DirtyState::PendingRevert {
            self.revert();
            return Ok(());
        }
        self.encode_delta(writer)?;
        self.commit();
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

impl<T: fmt::Debug, C> fmt::Debug for NetworkVariable<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkVariable")
            .field("value", &self.value)
            .field("snapshot", &self.snapshot)
            .field("state", &self.state)
            .field("permissions", &self.permissions)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
