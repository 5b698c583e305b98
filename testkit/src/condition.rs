//! Named convergence conditions.

use std::fmt;

use codec::NetworkValue;
use repgraph::ReplicationGraph;
use schema::{ClientId, ObjectId, ReadPermission, VariableKey};
use variable::NetworkVariable;

use crate::network::SimNetwork;

type Check = Box<dyn Fn(&SimNetwork) -> bool>;

/// A predicate over the whole simulated session, reported by name when it
/// does not hold in time.
pub struct Condition {
    name: String,
    check: Check,
}

impl Condition {
    pub fn new(name: impl Into<String>, check: impl Fn(&SimNetwork) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    /// Every client that observes `object` and may read `key` holds the
    /// server's value.
    pub fn converged<T: NetworkValue>(object: ObjectId, key: VariableKey) -> Self {
        Self::new(format!("{object} {key} converged"), move |net| {
            replicas_agree::<T>(net, object, key)
        })
    }

    /// Every connected client holds a copy of `object`.
    pub fn spawned(object: ObjectId) -> Self {
        Self::new(format!("{object} spawned"), move |net| {
            net.clients().all(|graph| graph.object(object).is_some())
        })
    }

    /// No peer holds `object`.
    pub fn despawned(object: ObjectId) -> Self {
        Self::new(format!("{object} despawned"), move |net| {
            net.server().object(object).is_none()
                && net.clients().all(|graph| graph.object(object).is_none())
        })
    }

    /// The server and every client holding `object` see `owner` as its owner.
    pub fn owned_by(object: ObjectId, owner: ClientId) -> Self {
        Self::new(format!("{object} owned by {owner}"), move |net| {
            let owned = |graph: &ReplicationGraph| {
                graph
                    .ownership(object)
                    .is_ok_and(|(found, _)| found == owner)
            };
            owned(net.server())
                && net
                    .clients()
                    .filter(|graph| graph.object(object).is_some())
                    .all(owned)
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn holds(&self, net: &SimNetwork) -> bool {
        (self.check)(net)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reads a [`NetworkVariable`] value from one peer.
pub fn value_of<T: NetworkValue>(
    graph: &ReplicationGraph,
    object: ObjectId,
    key: VariableKey,
) -> Option<&T> {
    graph
        .object(object)?
        .variable::<NetworkVariable<T>>(key)
        .map(|variable| variable.value())
}

fn can_read(graph: &ReplicationGraph, object: ObjectId, key: VariableKey, client: ClientId) -> bool {
    let Some(replica) = graph.object(object) else {
        return false;
    };
    let schema = replica.schema();
    schema
        .index_of(key)
        .and_then(|index| schema.variable(index))
        .is_some_and(|(_, def)| {
            def.permissions.read == ReadPermission::Everyone || replica.owner() == Some(client)
        })
}

fn replicas_agree<T: NetworkValue>(net: &SimNetwork, object: ObjectId, key: VariableKey) -> bool {
    let Some(expected) = value_of::<T>(net.server(), object, key) else {
        return false;
    };
    net.clients()
        .filter(|graph| can_read(graph, object, key, graph.local()))
        .all(|graph| value_of::<T>(graph, object, key).is_some_and(|found| found.are_equal(expected)))
}
