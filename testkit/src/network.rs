//! A lossless in-memory network of one server and many clients.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use repgraph::{ReplicatedObject, ReplicationConfig, ReplicationGraph, ReplicationResult};
use schema::{ClientId, ObjectId};
use tracing::{debug, warn};
use wire::MessageFlags;

use crate::condition::Condition;
use crate::error::{ConvergenceError, SimResult};

type SharedFactory = Rc<dyn Fn() -> ReplicationResult<ReplicatedObject>>;

/// Settings shared by every peer of a simulated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Ticks between a message being swept and being received.
    pub latency_ticks: u32,
    pub replication: ReplicationConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 1,
            replication: ReplicationConfig::for_testing(),
        }
    }
}

impl SimConfig {
    #[must_use]
    pub fn latency(mut self, ticks: u32) -> Self {
        self.latency_ticks = ticks;
        self
    }
}

/// One message on the simulated wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: ClientId,
    pub to: ClientId,
    pub object: ObjectId,
    pub flags: MessageFlags,
    pub sent_at: u32,
    pub deliver_at: u32,
    pub bytes: Vec<u8>,
}

/// What one [`SimNetwork::step`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: u32,
    /// Messages swept this tick, in send order.
    pub sent: Vec<Envelope>,
    pub delivered: usize,
    /// Messages the receiver refused or could not reach.
    pub dropped: usize,
    pub permission_errors: usize,
    /// Objects a peer could not sweep this tick.
    pub sweep_failures: usize,
}

/// A deterministic session: every peer sweeps once per tick and messages
/// arrive `latency_ticks` later in send order.
pub struct SimNetwork {
    config: SimConfig,
    server: ReplicationGraph,
    clients: BTreeMap<ClientId, ReplicationGraph>,
    layouts: Vec<SharedFactory>,
    in_flight: VecDeque<Envelope>,
    tick: u32,
}

impl SimNetwork {
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let server = ReplicationGraph::server(config.replication.clone());
        Self {
            config,
            server,
            clients: BTreeMap::new(),
            layouts: Vec::new(),
            in_flight: VecDeque::new(),
            tick: 0,
        }
    }

    /// Registers a layout with every current and future client.
    pub fn register_layout(
        &mut self,
        factory: impl Fn() -> ReplicationResult<ReplicatedObject> + 'static,
    ) -> SimResult<()> {
        let factory: SharedFactory = Rc::new(factory);
        for (&id, graph) in &mut self.clients {
            register(graph, &factory).map_err(|source| ConvergenceError::Replication {
                peer: id,
                source,
            })?;
        }
        self.layouts.push(factory);
        Ok(())
    }

    /// Connects a client. It receives every visible object at the next step.
    pub fn add_client(&mut self, id: ClientId) -> SimResult<()> {
        let mut graph = ReplicationGraph::new(id, self.config.replication.clone());
        for factory in &self.layouts {
            register(&mut graph, factory)
                .map_err(|source| ConvergenceError::Replication { peer: id, source })?;
        }
        self.server
            .add_client(id)
            .map_err(|source| ConvergenceError::Replication {
                peer: ClientId::SERVER,
                source,
            })?;
        self.clients.insert(id, graph);
        debug!(client = %id, "client connected");
        Ok(())
    }

    /// Disconnects a client and drops everything in flight to or from it.
    pub fn remove_client(&mut self, id: ClientId) -> Option<ReplicationGraph> {
        let graph = self.clients.remove(&id)?;
        self.server.remove_client(id);
        self.in_flight
            .retain(|envelope| envelope.from != id && envelope.to != id);
        debug!(client = %id, "client disconnected");
        Some(graph)
    }

    #[must_use]
    pub const fn server(&self) -> &ReplicationGraph {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut ReplicationGraph {
        &mut self.server
    }

    pub fn client(&self, id: ClientId) -> SimResult<&ReplicationGraph> {
        self.clients
            .get(&id)
            .ok_or(ConvergenceError::UnknownPeer { client: id })
    }

    pub fn client_mut(&mut self, id: ClientId) -> SimResult<&mut ReplicationGraph> {
        self.clients
            .get_mut(&id)
            .ok_or(ConvergenceError::UnknownPeer { client: id })
    }

    /// Any peer, server included.
    pub fn peer_mut(&mut self, id: ClientId) -> SimResult<&mut ReplicationGraph> {
        if id.is_server() {
            Ok(&mut self.server)
        } else {
            self.client_mut(id)
        }
    }

    pub fn clients(&self) -> impl Iterator<Item = &ReplicationGraph> {
        self.clients.values()
    }

    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Advances one tick: the server sweeps, every client sweeps, then every
    /// message due by this tick is delivered.
    pub fn step(&mut self) -> SimResult<StepReport> {
        self.tick = self.tick.wrapping_add(1);
        let tick = self.tick;
        let deliver_at = tick.wrapping_add(self.config.latency_ticks);
        let mut report = StepReport {
            tick,
            ..StepReport::default()
        };

        let mut sweeps = Vec::with_capacity(self.clients.len() + 1);
        let server = self
            .server
            .sweep(tick)
            .map_err(|source| ConvergenceError::Replication {
                peer: ClientId::SERVER,
                source,
            })?;
        sweeps.push((ClientId::SERVER, server));
        for (&id, graph) in &mut self.clients {
            let sweep = graph
                .sweep(tick)
                .map_err(|source| ConvergenceError::Replication { peer: id, source })?;
            sweeps.push((id, sweep));
        }

        for (from, sweep) in sweeps {
            report.permission_errors += sweep.permission_errors.len();
            report.sweep_failures += sweep.failed.len();
            for message in sweep.messages {
                let envelope = Envelope {
                    from,
                    to: message.recipient,
                    object: message.object,
                    flags: message.flags,
                    sent_at: tick,
                    deliver_at,
                    bytes: message.bytes,
                };
                report.sent.push(envelope.clone());
                self.in_flight.push_back(envelope);
            }
        }

        while self
            .in_flight
            .front()
            .is_some_and(|envelope| !is_later(envelope.deliver_at, tick))
        {
            let Some(envelope) = self.in_flight.pop_front() else {
                break;
            };
            let Ok(receiver) = self.peer_mut(envelope.to) else {
                report.dropped += 1;
                continue;
            };
            match receiver.receive(envelope.from, &envelope.bytes) {
                Ok(applied) if applied.is_clean() => report.delivered += 1,
                Ok(applied) => {
                    debug!(
                        from = %envelope.from,
                        to = %envelope.to,
                        object = %applied.object,
                        stale = applied.stale,
                        rejected = applied.rejected.len(),
                        "message partially applied"
                    );
                    report.delivered += 1;
                }
                Err(err) => {
                    warn!(from = %envelope.from, to = %envelope.to, %err, "message refused");
                    report.dropped += 1;
                }
            }
        }
        Ok(report)
    }

    /// Runs `ticks` steps and returns their reports.
    pub fn run(&mut self, ticks: u32) -> SimResult<Vec<StepReport>> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Steps until every condition holds, for at most `timeout_ticks` steps.
    ///
    /// Returns the number of steps taken. On timeout the error names every
    /// condition that still fails.
    pub fn wait_for(&mut self, conditions: &[Condition], timeout_ticks: u32) -> SimResult<u32> {
        let mut elapsed = 0;
        loop {
            let net: &Self = self;
            let failed: Vec<String> = conditions
                .iter()
                .filter(|condition| !condition.holds(net))
                .map(|condition| condition.name().to_string())
                .collect();
            if failed.is_empty() {
                return Ok(elapsed);
            }
            if elapsed >= timeout_ticks {
                return Err(ConvergenceError::Timeout {
                    failed,
                    ticks: elapsed,
                });
            }
            self.step()?;
            elapsed += 1;
        }
    }
}

impl fmt::Debug for SimNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimNetwork")
            .field("tick", &self.tick)
            .field("latency_ticks", &self.config.latency_ticks)
            .field("clients", &self.clients.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

fn register(graph: &mut ReplicationGraph, factory: &SharedFactory) -> ReplicationResult<u64> {
    let factory = Rc::clone(factory);
    graph.register_layout(move || factory())
}

#[allow(clippy::cast_possible_wrap)]
const fn is_later(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}
