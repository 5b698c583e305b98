//! Dirty tracking state.

/// Whether a variable's value differs from its last synchronized snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    #[default]
    Clean,
    /// Changed locally; the next sweep sends it.
    Dirty,
    /// Received from a peer and kept dirty so it is forwarded to others.
    Forwarding,
    /// Mutated by a peer without write permission; the next check restores
    /// the snapshot.
    PendingRevert,
}

impl DirtyState {
    /// Returns `true` if the next sweep should send this variable.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Dirty | Self::Forwarding)
    }
}
