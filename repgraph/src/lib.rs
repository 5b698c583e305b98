//! Replication graph: which variables go to which peer, and when.
//!
//! A [`ReplicatedObject`] is a flat table of replicated variables keyed by
//! `(component, field)` and checked against an [`schema::ObjectSchema`]. Each
//! peer owns one [`ReplicationGraph`]. Once per network tick,
//! [`ReplicationGraph::sweep`] rechecks every variable, encodes each dirty
//! one once, and frames per-recipient messages with the `wire` crate;
//! [`ReplicationGraph::receive`] applies messages from peers with permission
//! checks and an ownership-epoch barrier.
//!
//! ```
//! use repgraph::{ReplicatedObject, ReplicationConfig, ReplicationGraph};
//! use schema::{ClientId, ComponentDef, ComponentId, FieldId, ObjectId, ObjectSchema, ValueKind, VariableDef, VariableKey};
//! use variable::NetworkVariable;
//!
//! const SCORE: VariableKey = VariableKey::new(1, 0);
//!
//! fn build() -> repgraph::ReplicationResult<ReplicatedObject> {
//!     let layout = ObjectSchema::builder()
//!         .component(ComponentDef::new(ComponentId::new(1)).variable(VariableDef::new(
//!             FieldId::new(0),
//!             "score",
//!             ValueKind::sint(32),
//!         )))
//!         .build()?;
//!     ReplicatedObject::new(layout)?.with(SCORE, NetworkVariable::new(0i32))
//! }
//!
//! let mut server = ReplicationGraph::server(ReplicationConfig::default());
//! let mut client = ReplicationGraph::new(ClientId::new(1), ReplicationConfig::default());
//! client.register_layout(build).unwrap();
//! server.add_client(ClientId::new(1)).unwrap();
//! server.spawn(ObjectId::new(1), ClientId::SERVER, build().unwrap()).unwrap();
//!
//! let object = server.object_mut(ObjectId::new(1)).unwrap();
//! object.variable_mut::<NetworkVariable<i32>>(SCORE).unwrap().set(111).unwrap();
//!
//! for message in server.sweep(1).unwrap().messages {
//!     client.receive(ClientId::SERVER, &message.bytes).unwrap();
//! }
//! let replica = client.object(ObjectId::new(1)).unwrap();
//! assert_eq!(replica.variable::<NetworkVariable<i32>>(SCORE).unwrap().value(), &111);
//! ```

mod config;
mod error;
mod graph;
mod object;
mod report;

pub use config::ReplicationConfig;
pub use error::{ReplicationError, ReplicationResult};
pub use graph::ReplicationGraph;
pub use object::ReplicatedObject;
pub use report::{
    ApplyReport, OutgoingMessage, PermissionIssue, SectionRejection, SweepFailure, SweepReport,
};
