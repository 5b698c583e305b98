//! Replicated variables.
//!
//! A [`NetworkVariable`] couples a value with its last synchronized snapshot,
//! a dirty state, a permission descriptor and a weak link to the owning
//! object's [`ObjectAuthority`]. [`NetworkList`], [`NetworkDictionary`] and
//! [`NetworkSet`] replicate collections as queues of operations instead of
//! snapshot diffs.
//!
//! All of them implement [`ReplicatedVariable`], the object-safe contract used by
//! the replication graph: `write_field`/`read_field` at spawn,
//! `write_delta`/`read_delta` afterwards, plus dirty and permission queries.
//!
//! # Design Principles
//!
//! - **Explicit rechecks** - In-place container mutation is found by
//!   `check_dirty_state`, never by hidden hooks.
//! - **Denied writes never leave the peer** - A denied change is reported once
//!   and reverted to the snapshot on the next check.
//! - **No global registries** - Codecs and authorities are explicit handles.

mod authority;
mod dirty;
mod error;
mod listeners;
mod network_dictionary;
mod network_list;
mod network_set;
mod network_variable;
mod permission;
mod replicated;

pub use authority::ObjectAuthority;
pub use dirty::DirtyState;
pub use error::{PermissionError, VariableError, VariableResult};
pub use listeners::SubscriptionId;
pub use network_dictionary::{DictionaryEvent, NetworkDictionary};
pub use network_list::{ListEvent, NetworkList};
pub use network_set::{NetworkSet, SetEvent};
pub use network_variable::NetworkVariable;
pub use permission::PermissionGuard;
pub use replicated::ReplicatedVariable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = DirtyState::default();
        let _ = NetworkVariable::new(0u8);
        let _ = NetworkList::<u8>::new(Vec::new());
        let _ = NetworkDictionary::<u8, u8>::new(std::collections::HashMap::new());
        let _ = NetworkSet::<u8>::new(std::collections::HashSet::new());
        let _ = PermissionGuard::new(schema::Topology::ClientServer, schema::ClientId::SERVER);
        let _: VariableResult<()> = Ok(());
    }
}
