//! Who may read and who may write a variable.

use schema::{ClientId, Permissions, ReadPermission, Topology, WritePermission};

/// Evaluates permission descriptors against one object's ownership.
///
/// With [`Topology::ClientServer`], [`WritePermission::Server`] is satisfied by
/// the server only and [`WritePermission::Owner`] by the owner only. With
/// [`Topology::DistributedAuthority`], the owner is the authority and satisfies
/// both. Owner-readable variables are visible to the owner and the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionGuard {
    topology: Topology,
    owner: ClientId,
}

impl PermissionGuard {
    #[must_use]
    pub const fn new(topology: Topology, owner: ClientId) -> Self {
        Self { topology, owner }
    }

    #[must_use]
    pub const fn owner(&self) -> ClientId {
        self.owner
    }

    /// Returns `true` if `client` may modify a variable with `permissions`.
    #[must_use]
    pub fn can_write(&self, client: ClientId, permissions: Permissions) -> bool {
        match (self.topology, permissions.write) {
            (Topology::ClientServer, WritePermission::Server) => client.is_server(),
            (Topology::ClientServer, WritePermission::Owner)
            | (Topology::DistributedAuthority, _) => client == self.owner,
        }
    }

    /// Returns `true` if `client` may observe a variable with `permissions`.
    #[must_use]
    pub fn can_read(&self, client: ClientId, permissions: Permissions) -> bool {
        match permissions.read {
            ReadPermission::Everyone => true,
            ReadPermission::Owner => client == self.owner || client.is_server(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: ClientId = ClientId::new(7);
    const OTHER: ClientId = ClientId::new(8);

    #[test]
    fn client_server_write_rules() {
        let guard = PermissionGuard::new(Topology::ClientServer, OWNER);
        let server_write = Permissions::server_write();
        let owner_write = Permissions::owner_write();

        assert!(guard.can_write(ClientId::SERVER, server_write));
        assert!(!guard.can_write(OWNER, server_write));
        assert!(guard.can_write(OWNER, owner_write));
        assert!(!guard.can_write(OTHER, owner_write));
        assert!(!guard.can_write(ClientId::SERVER, owner_write));
    }

    #[test]
    fn server_owned_object_accepts_server_owner_writes() {
        let guard = PermissionGuard::new(Topology::ClientServer, ClientId::SERVER);
        assert!(guard.can_write(ClientId::SERVER, Permissions::owner_write()));
        assert!(!guard.can_write(OTHER, Permissions::owner_write()));
    }

    #[test]
    fn distributed_authority_owner_writes_everything() {
        let guard = PermissionGuard::new(Topology::DistributedAuthority, OWNER);
        assert!(guard.can_write(OWNER, Permissions::server_write()));
        assert!(guard.can_write(OWNER, Permissions::owner_write()));
        assert!(!guard.can_write(ClientId::SERVER, Permissions::server_write()));
        assert!(!guard.can_write(OTHER, Permissions::owner_write()));
    }

    #[test]
    fn owner_read_visibility() {
        let guard = PermissionGuard::new(Topology::ClientServer, OWNER);
        let owner_only = Permissions::owner_only();
        assert!(guard.can_read(OWNER, owner_only));
        assert!(guard.can_read(ClientId::SERVER, owner_only));
        assert!(!guard.can_read(OTHER, owner_only));
        assert!(guard.can_read(OTHER, Permissions::server_write()));
    }
}
