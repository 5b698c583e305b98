//! Read/write permission descriptors and network topology.

/// Who may observe a variable's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadPermission {
    /// Replicated to every peer.
    #[default]
    Everyone,
    /// Replicated only to the owner (and the authority).
    Owner,
}

/// Who may mutate a variable's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WritePermission {
    /// Only the server (or, with distributed authority, the object's authority).
    #[default]
    Server,
    /// Only the object's current owner.
    Owner,
}

/// How authority over objects is distributed between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topology {
    /// The server is authoritative; owners may only write owner variables.
    #[default]
    ClientServer,
    /// The current owner is the authority for every variable on its objects.
    DistributedAuthority,
}

/// Construction-time permission pair for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permissions {
    pub read: ReadPermission,
    pub write: WritePermission,
}

impl Permissions {
    /// Creates a permission pair.
    #[must_use]
    pub const fn new(read: ReadPermission, write: WritePermission) -> Self {
        Self { read, write }
    }

    /// Everyone reads, server writes.
    #[must_use]
    pub const fn server_write() -> Self {
        Self::new(ReadPermission::Everyone, WritePermission::Server)
    }

    /// Everyone reads, owner writes.
    #[must_use]
    pub const fn owner_write() -> Self {
        Self::new(ReadPermission::Everyone, WritePermission::Owner)
    }

    /// Owner reads, owner writes.
    #[must_use]
    pub const fn owner_only() -> Self {
        Self::new(ReadPermission::Owner, WritePermission::Owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_authority() {
        let permissions = Permissions::default();
        assert_eq!(permissions, Permissions::server_write());
        assert_eq!(Topology::default(), Topology::ClientServer);
    }

    #[test]
    fn presets() {
        assert_eq!(Permissions::owner_write().write, WritePermission::Owner);
        assert_eq!(Permissions::owner_only().read, ReadPermission::Owner);
    }
}
