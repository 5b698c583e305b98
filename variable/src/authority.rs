//! Shared ownership state of one replicated object.

use std::cell::Cell;
use std::rc::Weak;

use schema::{ClientId, ObjectId, Permissions, Topology};

use crate::error::PermissionError;
use crate::permission::PermissionGuard;

/// Ownership and spawn state shared by every variable of an object.
///
/// Held in an `Rc` by the object; variables keep a `Weak` link and resolve
/// owner and authority at check time, so an ownership change applies to every
/// variable at once. Single-threaded by construction.
#[derive(Debug)]
pub struct ObjectAuthority {
    object_id: ObjectId,
    local: ClientId,
    topology: Topology,
    owner: Cell<ClientId>,
    epoch: Cell<u32>,
    spawned: Cell<bool>,
}

impl ObjectAuthority {
    /// Creates the authority record for `object_id` as seen by peer `local`.
    #[must_use]
    pub const fn new(object_id: ObjectId, local: ClientId, owner: ClientId, topology: Topology) -> Self {
        Self {
            object_id,
            local,
            topology,
            owner: Cell::new(owner),
            epoch: Cell::new(0),
            spawned: Cell::new(false),
        }
    }

    #[must_use]
    pub const fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// The peer this record lives on.
    #[must_use]
    pub const fn local(&self) -> ClientId {
        self.local
    }

    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    #[must_use]
    pub fn owner(&self) -> ClientId {
        self.owner.get()
    }

    /// Ownership epoch; incremented on every ownership change.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch.get()
    }

    #[must_use]
    pub fn is_spawned(&self) -> bool {
        self.spawned.get()
    }

    pub fn set_spawned(&self, spawned: bool) {
        self.spawned.set(spawned);
    }

    /// Returns `true` if the local peer owns the object.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.local == self.owner()
    }

    /// Hands the object to `owner`, bumping the epoch. Returns the new epoch.
    pub fn change_owner(&self, owner: ClientId) -> u32 {
        let epoch = self.epoch().wrapping_add(1);
        self.apply_ownership(owner, epoch);
        epoch
    }

    /// Applies an ownership change decided elsewhere.
    pub fn apply_ownership(&self, owner: ClientId, epoch: u32) {
        self.owner.set(owner);
        self.epoch.set(epoch);
    }

    #[must_use]
    pub fn guard(&self) -> PermissionGuard {
        PermissionGuard::new(self.topology, self.owner())
    }

    /// Returns `true` if the local peer may write a variable with `permissions`.
    ///
    /// Variables on an object that is not spawned yet are always writable.
    #[must_use]
    pub fn local_can_write(&self, permissions: Permissions) -> bool {
        !self.is_spawned() || self.guard().can_write(self.local, permissions)
    }
}

/// The error a local write would raise, if any. Variables not linked to a
/// live authority are freely writable.
pub(crate) fn write_denied(
    authority: &Weak<ObjectAuthority>,
    permissions: Permissions,
) -> Option<PermissionError> {
    let authority = authority.upgrade()?;
    if authority.local_can_write(permissions) {
        return None;
    }
    Some(PermissionError::WriteDenied {
        local: authority.local(),
        owner: authority.owner(),
        required: permissions.write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_change_bumps_epoch() {
        let authority = ObjectAuthority::new(
            ObjectId::new(1),
            ClientId::SERVER,
            ClientId::SERVER,
            Topology::ClientServer,
        );
        assert!(authority.is_owner());
        assert_eq!(authority.change_owner(ClientId::new(3)), 1);
        assert_eq!(authority.owner(), ClientId::new(3));
        assert!(!authority.is_owner());
        assert_eq!(authority.epoch(), 1);
    }

    #[test]
    fn unspawned_object_is_writable() {
        let authority = ObjectAuthority::new(
            ObjectId::new(1),
            ClientId::new(2),
            ClientId::SERVER,
            Topology::ClientServer,
        );
        assert!(authority.local_can_write(Permissions::server_write()));
        authority.set_spawned(true);
        assert!(!authority.local_can_write(Permissions::server_write()));
    }
}
