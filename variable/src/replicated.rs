//! Object-safe interface over every replicated variable type.

use std::any::Any;
use std::rc::Weak;

use bitstream::{BufferReader, BufferWriter};
use codec::DecodeContext;
use schema::{Permissions, ValueKind};

use crate::authority::ObjectAuthority;
use crate::error::VariableResult;

/// The four-function synchronization contract plus dirty and permission
/// queries, usable through `Box<dyn ReplicatedVariable>`.
///
/// Encoding is split from committing so one sweep can encode a delta for
/// several observers and capture the snapshot once.
pub trait ReplicatedVariable: Any {
    /// Encoding shape of the value.
    fn kind(&self) -> ValueKind;

    fn permissions(&self) -> Permissions;

    /// Links the variable to its object's ownership record.
    fn attach(&mut self, authority: Weak<ObjectAuthority>);

    /// Pure query: `true` if the next sweep sends this variable.
    fn is_dirty(&self) -> bool;

    fn set_dirty(&mut self, dirty: bool);

    /// Forces the clean state without touching the snapshot.
    fn reset_dirty(&mut self);

    /// Compares the value against the snapshot and updates the dirty state.
    ///
    /// Returns `Ok(true)` if the variable must be sent. A change made by a
    /// peer without write permission is reverted and reported as an error.
    fn check_dirty_state(&mut self) -> VariableResult<bool>;

    /// Writes the full value without changing any state.
    fn encode_field(&self, writer: &mut BufferWriter) -> VariableResult<()>;

    /// Writes the change since the snapshot without changing any state.
    fn encode_delta(&self, writer: &mut BufferWriter) -> VariableResult<()>;

    /// Captures the current value as the snapshot and clears the dirty state.
    fn commit(&mut self);

    /// Full decode, used at spawn.
    fn read_field(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> VariableResult<()>;

    /// Applies a received delta in place.
    ///
    /// With `keep_dirty_delta`, the snapshot is kept and the variable stays
    /// dirty so the change is forwarded to other peers.
    fn read_delta(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
        keep_dirty_delta: bool,
    ) -> VariableResult<()>;

    /// Full encode followed by [`ReplicatedVariable::commit`].
    fn write_field(&mut self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.encode_field(writer)?;
        self.commit();
        Ok(())
    }

    /// Delta encode followed by [`ReplicatedVariable::commit`].
    fn write_delta(&mut self, writer: &mut BufferWriter) -> VariableResult<()> {
        self.encode_delta(writer)?;
        self.commit();
        Ok(())
    }

    /// Tick at which the value last changed, if known.
    fn last_modified_tick(&self) -> Option<u32>;

    fn set_last_modified_tick(&mut self, tick: u32);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
