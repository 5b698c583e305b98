//! The per-peer replication graph: spawn, sweep, receive, hand off.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use bitstream::{BufferReader, BufferWriter};
use codec::{CodecLimits, DecodeContext};
use schema::{ClientId, ObjectId, Permissions, ReadPermission};
use tracing::{debug, error, trace, warn};
use variable::{ObjectAuthority, ReplicatedVariable, VariableError};
use wire::{decode_message, encode_control, Message, MessageEncoder, MessageFlags, MessageHeader};

use crate::config::ReplicationConfig;
use crate::error::{ReplicationError, ReplicationResult};
use crate::object::ReplicatedObject;
use crate::report::{
    ApplyReport, OutgoingMessage, PermissionIssue, SectionRejection, SweepFailure, SweepReport,
};

type ObjectFactory = Box<dyn Fn() -> ReplicationResult<ReplicatedObject>>;

/// Serial-number comparison: `a` is ahead of `b` by less than half the range.
#[allow(clippy::cast_possible_wrap)]
const fn serial_is_newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Layouts hold at most `u16::MAX` variables, so wire indices fit in `u32`.
#[allow(clippy::cast_possible_truncation)]
const fn wire_index(index: usize) -> u32 {
    index as u32
}

/// One encoded variable body, shared by every recipient of a sweep.
struct Body {
    index: u32,
    permissions: Permissions,
    bytes: Vec<u8>,
}

/// Messages one object contributes to a sweep, kept aside until all of
/// them encode.
#[derive(Default)]
struct SweepPlan {
    messages: Vec<OutgoingMessage>,
    spawned: Vec<ClientId>,
}

struct ObjectEntry {
    object: ReplicatedObject,
    authority: Rc<ObjectAuthority>,
    /// Clients that hold a spawned copy.
    known: BTreeSet<ClientId>,
    /// Clients the object is kept out of scope for.
    hidden: BTreeSet<ClientId>,
    /// Clients that need full values again at the next sweep.
    refresh: BTreeSet<ClientId>,
    ownership_pending: bool,
    handoff_ready_at: Option<u32>,
}

impl ObjectEntry {
    fn new(object: ReplicatedObject, authority: Rc<ObjectAuthority>) -> Self {
        Self {
            object,
            authority,
            known: BTreeSet::new(),
            hidden: BTreeSet::new(),
            refresh: BTreeSet::new(),
            ownership_pending: false,
            handoff_ready_at: None,
        }
    }

    fn id(&self) -> ObjectId {
        self.authority.object_id()
    }

    fn header(&self, flags: MessageFlags, tick: u32) -> MessageHeader {
        MessageHeader::new(
            flags,
            self.object.layout_hash(),
            self.id().raw(),
            self.authority.owner().raw(),
            tick,
            self.authority.epoch(),
        )
    }

    fn check_layout(&self, found: u64) -> ReplicationResult<()> {
        let expected = self.object.layout_hash();
        if found == expected {
            return Ok(());
        }
        Err(ReplicationError::LayoutMismatch {
            object: self.id(),
            expected,
            found,
        })
    }

    fn has_owner_read(&self) -> bool {
        self.object
            .schema()
            .variables()
            .any(|(_, def)| def.permissions.read == ReadPermission::Owner)
    }

    /// Takes a newer ownership epoch. Returns `false` for stale or repeated ones.
    fn adopt_ownership(&mut self, owner: ClientId, epoch: u32, tick: u32, delay: u32) -> bool {
        if !serial_is_newer(epoch, self.authority.epoch()) {
            return false;
        }
        self.authority.apply_ownership(owner, epoch);
        self.handoff_ready_at = Some(tick.wrapping_add(delay));
        true
    }

    /// Rechecks every variable and returns the wire indices that are dirty.
    fn collect_dirty(&mut self, tick: u32, report: &mut SweepReport) -> ReplicationResult<Vec<usize>> {
        let object = self.id();
        let mut dirty = Vec::new();
        for (index, key, variable) in self.object.slots_mut() {
            match variable.check_dirty_state() {
                Ok(true) => {
                    variable.set_last_modified_tick(tick);
                    dirty.push(index);
                }
                Ok(false) => {}
                Err(VariableError::Permission(error)) => {
                    report
                        .permission_errors
                        .push(PermissionIssue { object, key, error });
                }
                Err(source) => {
                    return Err(ReplicationError::Variable {
                        object,
                        key,
                        source,
                    })
                }
            }
        }
        Ok(dirty)
    }

    fn encode_bodies(
        &self,
        indices: impl IntoIterator<Item = usize>,
        full: bool,
        scratch: &mut BufferWriter,
    ) -> ReplicationResult<Vec<Body>> {
        let object = self.id();
        let mut bodies = Vec::new();
        for index in indices {
            let Some((key, variable)) = self.object.slot(index) else {
                continue;
            };
            scratch.clear();
            let encoded = if full {
                variable.encode_field(scratch)
            } else {
                variable.encode_delta(scratch)
            };
            encoded.map_err(|source| ReplicationError::Variable {
                object,
                key,
                source,
            })?;
            bodies.push(Body {
                index: wire_index(index),
                permissions: variable.permissions(),
                bytes: scratch.as_slice().to_vec(),
            });
        }
        Ok(bodies)
    }

    fn encode_message<'b>(
        &self,
        flags: MessageFlags,
        tick: u32,
        bodies: impl IntoIterator<Item = &'b Body>,
        limits: &wire::Limits,
    ) -> ReplicationResult<Vec<u8>> {
        let mut encoder = MessageEncoder::new(&self.header(flags, tick), limits)?;
        for body in bodies {
            encoder.push_section(body.index, &body.bytes)?;
        }
        Ok(encoder.finish()?)
    }

    /// Builds, sends and commits this object's share of a sweep.
    ///
    /// Nothing is sent or committed unless every message encodes, so a
    /// failed object keeps its dirty state for the next sweep.
    fn sweep(
        &mut self,
        local: ClientId,
        clients: &BTreeSet<ClientId>,
        tick: u32,
        limits: &wire::Limits,
        scratch: &mut BufferWriter,
        report: &mut SweepReport,
    ) -> ReplicationResult<()> {
        let dirty = self.collect_dirty(tick, report)?;
        let plan = if local.is_server() {
            self.plan_observers(clients, &dirty, tick, limits, scratch)?
        } else {
            self.plan_to_server(local, &dirty, tick, limits, scratch)?
        };

        report.messages.extend(plan.messages);
        self.known.extend(plan.spawned);
        self.refresh.clear();
        self.ownership_pending = false;
        self.commit(&dirty);
        report.committed += dirty.len();
        Ok(())
    }

    /// Server side: SPAWN for new observers, DELTA for the rest.
    fn plan_observers(
        &self,
        clients: &BTreeSet<ClientId>,
        dirty: &[usize],
        tick: u32,
        limits: &wire::Limits,
        scratch: &mut BufferWriter,
    ) -> ReplicationResult<SweepPlan> {
        let object = self.id();
        let mut plan = SweepPlan::default();
        let guard = self.authority.guard();
        let needs_spawn = |client: &ClientId| !self.known.contains(client) || self.refresh.contains(client);
        let spawning: Vec<ClientId> = clients
            .iter()
            .copied()
            .filter(|client| !self.hidden.contains(client) && needs_spawn(client))
            .collect();

        let fulls = if spawning.is_empty() {
            Vec::new()
        } else {
            self.encode_bodies(0..self.object.len(), true, scratch)?
        };
        let deltas = self.encode_bodies(dirty.iter().copied(), false, scratch)?;

        for &client in clients {
            if self.hidden.contains(&client) {
                continue;
            }
            if spawning.contains(&client) {
                let flags = MessageFlags::spawn();
                let readable = fulls
                    .iter()
                    .filter(|body| guard.can_read(client, body.permissions));
                let bytes = self.encode_message(flags, tick, readable, limits)?;
                trace!(%object, %client, bytes = bytes.len(), "spawn");
                plan.messages.push(OutgoingMessage {
                    recipient: client,
                    object,
                    flags,
                    bytes,
                });
                plan.spawned.push(client);
                continue;
            }

            if self.ownership_pending {
                let flags = MessageFlags::ownership();
                let bytes = encode_control(&self.header(flags, tick), limits)?;
                plan.messages.push(OutgoingMessage {
                    recipient: client,
                    object,
                    flags,
                    bytes,
                });
            }

            // An owner never gets its own writes echoed back.
            let outgoing: Vec<&Body> = deltas
                .iter()
                .filter(|body| {
                    guard.can_read(client, body.permissions)
                        && !guard.can_write(client, body.permissions)
                })
                .collect();
            if outgoing.is_empty() {
                continue;
            }
            let flags = MessageFlags::delta();
            let bytes = self.encode_message(flags, tick, outgoing, limits)?;
            trace!(%object, %client, bytes = bytes.len(), "delta");
            plan.messages.push(OutgoingMessage {
                recipient: client,
                object,
                flags,
                bytes,
            });
        }
        Ok(plan)
    }

    /// Client side: the dirty variables this peer may write, to the server.
    fn plan_to_server(
        &self,
        local: ClientId,
        dirty: &[usize],
        tick: u32,
        limits: &wire::Limits,
        scratch: &mut BufferWriter,
    ) -> ReplicationResult<SweepPlan> {
        let mut plan = SweepPlan::default();
        let guard = self.authority.guard();
        let writable: Vec<usize> = dirty
            .iter()
            .copied()
            .filter(|&index| {
                self.object
                    .slot(index)
                    .is_some_and(|(_, variable)| guard.can_write(local, variable.permissions()))
            })
            .collect();
        if writable.is_empty() {
            return Ok(plan);
        }

        let bodies = self.encode_bodies(writable, false, scratch)?;
        let flags = MessageFlags::delta();
        let bytes = self.encode_message(flags, tick, &bodies, limits)?;
        trace!(object = %self.id(), bytes = bytes.len(), "delta to server");
        plan.messages.push(OutgoingMessage {
            recipient: ClientId::SERVER,
            object: self.id(),
            flags,
            bytes,
        });
        Ok(plan)
    }

    fn commit(&mut self, dirty: &[usize]) {
        for &index in dirty {
            if let Some((_, variable)) = self.object.slot_mut(index) {
                variable.commit();
            }
        }
    }

    /// Applies each section with `apply`, collecting the outcome in `report`.
    fn apply_sections(
        &mut self,
        message: &Message<'_>,
        sender: ClientId,
        check_writer: bool,
        codec_limits: &CodecLimits,
        report: &mut ApplyReport,
        mut apply: impl FnMut(
            &mut (dyn ReplicatedVariable + 'static),
            &mut BufferReader<'_>,
            &mut DecodeContext,
        ) -> Result<(), VariableError>,
    ) {
        let object = self.id();
        let guard = self.authority.guard();
        for section in &message.sections {
            let Some((key, variable)) = self.object.slot_mut(section.index as usize) else {
                warn!(%object, %sender, index = section.index, "skipping section for unknown variable");
                report.rejected.push(SectionRejection::UnknownIndex {
                    index: section.index,
                });
                continue;
            };
            if check_writer && !guard.can_write(sender, variable.permissions()) {
                warn!(%object, %key, %sender, "rejecting write without permission");
                report
                    .rejected
                    .push(SectionRejection::WriteDenied { key, sender });
                continue;
            }

            let mut reader = BufferReader::new(section.body);
            let mut ctx = DecodeContext::new(codec_limits.clone());
            match apply(variable, &mut reader, &mut ctx) {
                Ok(()) => {
                    variable.set_last_modified_tick(message.header.tick);
                    report.applied.push(key);
                    report
                        .rejected_entries
                        .extend(ctx.take_rejected().into_iter().map(|entry| (key, entry)));
                }
                Err(error) => {
                    error!(%object, %key, %sender, %error, "dropping malformed section");
                    report
                        .rejected
                        .push(SectionRejection::Malformed { key, error });
                }
            }
        }
    }
}

/// Replication state of one peer.
///
/// The server spawns objects, tracks which clients observe them and builds
/// per-client messages in [`ReplicationGraph::sweep`]. Clients build objects
/// from SPAWN messages through registered layouts and send the variables they
/// may write back to the server. All state is single-threaded.
pub struct ReplicationGraph {
    local: ClientId,
    config: ReplicationConfig,
    objects: BTreeMap<ObjectId, ObjectEntry>,
    clients: BTreeSet<ClientId>,
    factories: HashMap<u64, ObjectFactory>,
    pending_despawns: Vec<(ObjectId, u64, ClientId)>,
    tick: u32,
}

impl ReplicationGraph {
    #[must_use]
    pub fn new(local: ClientId, config: ReplicationConfig) -> Self {
        Self {
            local,
            config,
            objects: BTreeMap::new(),
            clients: BTreeSet::new(),
            factories: HashMap::new(),
            pending_despawns: Vec::new(),
            tick: 0,
        }
    }

    /// Creates the server peer's graph.
    #[must_use]
    pub fn server(config: ReplicationConfig) -> Self {
        Self::new(ClientId::SERVER, config)
    }

    #[must_use]
    pub const fn local(&self) -> ClientId {
        self.local
    }

    #[must_use]
    pub const fn is_server(&self) -> bool {
        self.local.is_server()
    }

    #[must_use]
    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Tick of the most recent sweep.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    fn require_server(&self) -> ReplicationResult<()> {
        if self.is_server() {
            Ok(())
        } else {
            Err(ReplicationError::NotServer { local: self.local })
        }
    }

    fn entry(&self, object: ObjectId) -> ReplicationResult<&ObjectEntry> {
        self.objects
            .get(&object)
            .ok_or(ReplicationError::UnknownObject { object })
    }

    fn entry_mut(&mut self, object: ObjectId) -> ReplicationResult<&mut ObjectEntry> {
        self.objects
            .get_mut(&object)
            .ok_or(ReplicationError::UnknownObject { object })
    }

    /// Registers how to build objects of one layout when a SPAWN arrives.
    ///
    /// Returns the layout hash the factory answers to.
    pub fn register_layout(
        &mut self,
        factory: impl Fn() -> ReplicationResult<ReplicatedObject> + 'static,
    ) -> ReplicationResult<u64> {
        let sample = factory()?;
        sample.ensure_complete()?;
        let hash = sample.layout_hash();
        self.factories.insert(hash, Box::new(factory));
        Ok(hash)
    }

    /// Starts observing from `client`. Every object is spawned to it at the
    /// next sweep.
    pub fn add_client(&mut self, client: ClientId) -> ReplicationResult<()> {
        self.require_server()?;
        if client.is_server() {
            return Err(ReplicationError::UnknownClient { client });
        }
        if self.clients.insert(client) {
            debug!(%client, "client added");
        }
        Ok(())
    }

    /// Forgets a client. Objects it owned return to the server.
    pub fn remove_client(&mut self, client: ClientId) -> bool {
        if !self.clients.remove(&client) {
            return false;
        }
        let mut orphaned = Vec::new();
        for (&id, entry) in &mut self.objects {
            entry.known.remove(&client);
            entry.hidden.remove(&client);
            entry.refresh.remove(&client);
            if entry.authority.owner() == client {
                orphaned.push(id);
            }
        }
        self.pending_despawns
            .retain(|&(_, _, recipient)| recipient != client);
        for id in orphaned {
            if let Err(err) = self.change_ownership(id, ClientId::SERVER) {
                warn!(object = %id, %err, "could not reclaim ownership");
            }
        }
        debug!(%client, "client removed");
        true
    }

    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.iter().copied()
    }

    /// Spawns an object owned by `owner`; observers receive it at the next sweep.
    pub fn spawn(
        &mut self,
        id: ObjectId,
        owner: ClientId,
        mut object: ReplicatedObject,
    ) -> ReplicationResult<()> {
        self.require_server()?;
        if self.objects.contains_key(&id) {
            return Err(ReplicationError::DuplicateObject { object: id });
        }
        if self.objects.len() >= self.config.max_objects {
            return Err(ReplicationError::TooManyObjects {
                max: self.config.max_objects,
            });
        }
        if !owner.is_server() && !self.clients.contains(&owner) {
            return Err(ReplicationError::UnknownClient { client: owner });
        }
        object.ensure_complete()?;

        let authority = Rc::new(ObjectAuthority::new(
            id,
            self.local,
            owner,
            self.config.topology,
        ));
        authority.set_spawned(true);
        object.bind(&authority);
        self.objects.insert(id, ObjectEntry::new(object, authority));
        debug!(object = %id, %owner, "spawned");
        Ok(())
    }

    /// Removes an object. Observers receive a DESPAWN at the next sweep.
    pub fn despawn(&mut self, id: ObjectId) -> ReplicationResult<ReplicatedObject> {
        self.require_server()?;
        let entry = self
            .objects
            .remove(&id)
            .ok_or(ReplicationError::UnknownObject { object: id })?;
        let hash = entry.object.layout_hash();
        self.pending_despawns
            .extend(entry.known.iter().map(|&client| (id, hash, client)));
        entry.authority.set_spawned(false);
        debug!(object = %id, "despawned");
        Ok(entry.object)
    }

    /// Puts an object in or out of one client's scope.
    pub fn set_visibility(
        &mut self,
        id: ObjectId,
        client: ClientId,
        visible: bool,
    ) -> ReplicationResult<()> {
        self.require_server()?;
        if !self.clients.contains(&client) {
            return Err(ReplicationError::UnknownClient { client });
        }
        let entry = self
            .objects
            .get_mut(&id)
            .ok_or(ReplicationError::UnknownObject { object: id })?;
        if visible {
            entry.hidden.remove(&client);
        } else if entry.hidden.insert(client) && entry.known.remove(&client) {
            self.pending_despawns
                .push((id, entry.object.layout_hash(), client));
        }
        Ok(())
    }

    /// Moves ownership of an object and bumps its epoch.
    ///
    /// Every variable sees the new owner at once. Deltas stamped with an
    /// earlier epoch are dropped on arrival, and the new owner should hold
    /// its writes until [`ReplicationGraph::hand_off_ready`].
    pub fn change_ownership(&mut self, id: ObjectId, owner: ClientId) -> ReplicationResult<u32> {
        self.require_server()?;
        if !owner.is_server() && !self.clients.contains(&owner) {
            return Err(ReplicationError::UnknownClient { client: owner });
        }
        let ready_at = self.tick.wrapping_add(self.config.handoff_delay_ticks);
        let entry = self.entry_mut(id)?;
        let previous = entry.authority.owner();
        let epoch = entry.authority.change_owner(owner);
        entry.ownership_pending = true;
        entry.handoff_ready_at = Some(ready_at);
        if !owner.is_server() && entry.known.contains(&owner) && entry.has_owner_read() {
            entry.refresh.insert(owner);
        }
        debug!(object = %id, %previous, %owner, epoch, "ownership changed");
        Ok(epoch)
    }

    /// Returns `true` once the hand-off delay after the last ownership change
    /// has elapsed at `tick`. Unknown objects are never ready.
    #[must_use]
    pub fn hand_off_ready(&self, id: ObjectId, tick: u32) -> bool {
        self.objects.get(&id).is_some_and(|entry| {
            entry
                .handoff_ready_at
                .map_or(true, |ready_at| !serial_is_newer(ready_at, tick))
        })
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&ReplicatedObject> {
        self.objects.get(&id).map(|entry| &entry.object)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut ReplicatedObject> {
        self.objects.get_mut(&id).map(|entry| &mut entry.object)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Owner and ownership epoch of an object.
    pub fn ownership(&self, id: ObjectId) -> ReplicationResult<(ClientId, u32)> {
        let entry = self.entry(id)?;
        Ok((entry.authority.owner(), entry.authority.epoch()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Runs one network tick.
    ///
    /// Every variable is rechecked; denied local changes are reverted and
    /// reported. The server then builds a SPAWN or DELTA per observer and a
    /// client builds one DELTA per object for the server. Each dirty
    /// variable is encoded once and committed once, however many observers
    /// receive it.
    ///
    /// An object whose messages fail to encode is left out of this sweep,
    /// keeps its dirty state and is listed in [`SweepReport::failed`].
    pub fn sweep(&mut self, tick: u32) -> ReplicationResult<SweepReport> {
        self.tick = tick;
        let mut report = SweepReport::default();
        let mut scratch = BufferWriter::from_config(&self.config.buffer);

        let despawns = self
            .pending_despawns
            .iter()
            .map(|&(object, layout_hash, recipient)| -> ReplicationResult<OutgoingMessage> {
                let flags = MessageFlags::despawn();
                let header = MessageHeader::new(flags, layout_hash, object.raw(), 0, tick, 0);
                Ok(OutgoingMessage {
                    recipient,
                    object,
                    flags,
                    bytes: encode_control(&header, &self.config.limits)?,
                })
            })
            .collect::<ReplicationResult<Vec<_>>>()?;
        self.pending_despawns.clear();
        report.messages.extend(despawns);

        for entry in self.objects.values_mut() {
            let swept = entry.sweep(
                self.local,
                &self.clients,
                tick,
                &self.config.limits,
                &mut scratch,
                &mut report,
            );
            if let Err(error) = swept {
                let object = entry.id();
                error!(local = %self.local, %object, %error, "object left out of sweep");
                report.failed.push(SweepFailure { object, error });
            }
        }

        debug!(
            local = %self.local,
            tick,
            messages = report.messages.len(),
            bytes = report.byte_count(),
            committed = report.committed,
            failed = report.failed.len(),
            "sweep"
        );
        Ok(report)
    }

    /// Applies one message from `sender`.
    ///
    /// The server accepts only DELTA messages from known clients, rejects
    /// sections the sender may not write and keeps accepted changes dirty so
    /// the next sweep forwards them. Clients accept every kind from the
    /// server. Malformed framing and layout mismatches fail the whole
    /// message; malformed sections fail only themselves.
    pub fn receive(&mut self, sender: ClientId, bytes: &[u8]) -> ReplicationResult<ApplyReport> {
        let message = decode_message(bytes, &self.config.limits).map_err(|err| {
            error!(local = %self.local, %sender, %err, "dropping malformed message");
            err
        })?;
        let flags = message.header.flags;

        if self.is_server() {
            if !self.clients.contains(&sender) {
                return Err(ReplicationError::UnknownClient { client: sender });
            }
            if !flags.is_delta() {
                warn!(%sender, kind = flags.kind_name(), "clients may only send deltas");
                return Err(ReplicationError::UnexpectedMessage {
                    sender,
                    kind: flags.kind_name(),
                });
            }
            return self.apply_delta(sender, &message, true);
        }

        if !sender.is_server() {
            return Err(ReplicationError::UnexpectedMessage {
                sender,
                kind: flags.kind_name(),
            });
        }
        if flags.is_spawn() {
            self.apply_spawn(&message)
        } else if flags.is_delta() {
            self.apply_delta(sender, &message, false)
        } else if flags.is_ownership() {
            self.apply_ownership(&message)
        } else {
            self.apply_despawn(&message)
        }
    }

    fn apply_delta(
        &mut self,
        sender: ClientId,
        message: &Message<'_>,
        from_client: bool,
    ) -> ReplicationResult<ApplyReport> {
        let header = message.header;
        let id = ObjectId::new(header.object_id);
        let codec_limits = self.config.codec_limits.clone();
        let entry = self.entry_mut(id)?;
        entry.check_layout(header.layout_hash)?;

        let mut report = ApplyReport::new(id, header.flags);
        let current = entry.authority.epoch();
        if serial_is_newer(current, header.epoch) {
            debug!(object = %id, %sender, epoch = header.epoch, current, "dropping delta from an earlier ownership epoch");
            report.stale = true;
        } else {
            entry.apply_sections(
                message,
                sender,
                from_client,
                &codec_limits,
                &mut report,
                |variable, reader, ctx| variable.read_delta(reader, ctx, from_client),
            );
            trace!(object = %id, %sender, applied = report.applied.len(), "delta applied");
        }

        // The sender kept changes the server did not take.
        if from_client && !report.is_clean() && entry.known.contains(&sender) {
            debug!(object = %id, %sender, "resyncing sender with full values");
            entry.refresh.insert(sender);
            report.resync = true;
        }
        Ok(report)
    }

    fn apply_spawn(&mut self, message: &Message<'_>) -> ReplicationResult<ApplyReport> {
        let header = message.header;
        let id = ObjectId::new(header.object_id);
        let owner = ClientId::new(header.owner);

        if !self.objects.contains_key(&id) {
            if self.objects.len() >= self.config.max_objects {
                return Err(ReplicationError::TooManyObjects {
                    max: self.config.max_objects,
                });
            }
            let factory = self
                .factories
                .get(&header.layout_hash)
                .ok_or(ReplicationError::UnknownLayout {
                    hash: header.layout_hash,
                })?;
            let mut object = factory()?;
            object.ensure_complete()?;
            let authority = Rc::new(ObjectAuthority::new(
                id,
                self.local,
                owner,
                self.config.topology,
            ));
            authority.apply_ownership(owner, header.epoch);
            authority.set_spawned(true);
            object.bind(&authority);
            self.objects.insert(id, ObjectEntry::new(object, authority));
            debug!(local = %self.local, object = %id, %owner, "spawned from server");
        }

        let delay = self.config.handoff_delay_ticks;
        let codec_limits = self.config.codec_limits.clone();
        let entry = self.entry_mut(id)?;
        entry.check_layout(header.layout_hash)?;
        entry.adopt_ownership(owner, header.epoch, header.tick, delay);

        let mut report = ApplyReport::new(id, header.flags);
        entry.apply_sections(
            message,
            ClientId::SERVER,
            false,
            &codec_limits,
            &mut report,
            |variable, reader, ctx| variable.read_field(reader, ctx),
        );
        Ok(report)
    }

    fn apply_ownership(&mut self, message: &Message<'_>) -> ReplicationResult<ApplyReport> {
        let header = message.header;
        let id = ObjectId::new(header.object_id);
        let delay = self.config.handoff_delay_ticks;
        let local = self.local;
        let entry = self.entry_mut(id)?;
        entry.check_layout(header.layout_hash)?;

        let mut report = ApplyReport::new(id, header.flags);
        let owner = ClientId::new(header.owner);
        if entry.adopt_ownership(owner, header.epoch, header.tick, delay) {
            debug!(%local, object = %id, %owner, epoch = header.epoch, "ownership adopted");
        } else {
            report.stale = true;
        }
        Ok(report)
    }

    fn apply_despawn(&mut self, message: &Message<'_>) -> ReplicationResult<ApplyReport> {
        let header = message.header;
        let id = ObjectId::new(header.object_id);
        self.entry(id)?.check_layout(header.layout_hash)?;
        if let Some(entry) = self.objects.remove(&id) {
            entry.authority.set_spawned(false);
        }
        debug!(local = %self.local, object = %id, "despawned by server");
        Ok(ApplyReport::new(id, header.flags))
    }
}

impl fmt::Debug for ReplicationGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationGraph")
            .field("local", &self.local)
            .field("objects", &self.objects.len())
            .field("clients", &self.clients)
            .field("layouts", &self.factories.len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}
