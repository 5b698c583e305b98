use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use repgraph::{ReplicatedObject, ReplicationResult};
use schema::{
    ClientId, ComponentDef, ComponentId, FieldId, ObjectId, ObjectSchema, Permissions, ValueKind,
    VariableDef, VariableKey,
};
use serde::Serialize;
use testkit::{Condition, ConvergenceError, Envelope, SimConfig, SimNetwork};
use tools::inspect_message;
use tracing::info;
use tracing_subscriber::EnvFilter;
use variable::{NetworkList, NetworkVariable};

const POSITION: VariableKey = VariableKey::new(1, 0);
const HEALTH: VariableKey = VariableKey::new(2, 0);
const INVENTORY: VariableKey = VariableKey::new(3, 0);

const POS_LIMIT: i32 = 10_000;
const MAX_HEALTH: u16 = 100;
const MAX_ITEMS: usize = 16;
const SETTLE_TICKS: u32 = 50;

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Deterministic replication capture generator"
)]
struct Cli {
    /// Number of simulated clients; each owns one avatar.
    #[arg(long, default_value_t = 4)]
    clients: u32,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Link latency in ticks.
    #[arg(long, default_value_t = 1)]
    latency: u32,
    /// Output directory for captures.
    #[arg(long, default_value = "captures")]
    out_dir: PathBuf,
    /// Fail if p95 delta message size exceeds this value.
    #[arg(long)]
    max_p95_delta_bytes: Option<u64>,
}

fn avatar() -> ReplicationResult<ReplicatedObject> {
    let layout = ObjectSchema::builder()
        .component(
            ComponentDef::new(ComponentId::new(1)).variable(
                VariableDef::new(FieldId::new(0), "position", ValueKind::sint(32))
                    .permissions(Permissions::owner_write()),
            ),
        )
        .component(ComponentDef::new(ComponentId::new(2)).variable(VariableDef::new(
            FieldId::new(0),
            "health",
            ValueKind::uint(16),
        )))
        .component(ComponentDef::new(ComponentId::new(3)).variable(VariableDef::new(
            FieldId::new(0),
            "inventory",
            ValueKind::list(ValueKind::uint(16)),
        )))
        .build()?;
    ReplicatedObject::new(layout)?
        .with(
            POSITION,
            NetworkVariable::with_permissions(0i32, Permissions::owner_write()),
        )?
        .with(HEALTH, NetworkVariable::new(MAX_HEALTH))?
        .with(INVENTORY, NetworkList::<u16>::new(Vec::new()))
}

fn avatar_of(client: ClientId) -> ObjectId {
    ObjectId::new(client.raw())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir {}", cli.out_dir.display()))?;

    let mut net = SimNetwork::new(SimConfig::default().latency(cli.latency));
    net.register_layout(avatar)?;
    let clients: Vec<ClientId> = (1..=u64::from(cli.clients)).map(ClientId::new).collect();
    for &client in &clients {
        net.add_client(client)?;
        net.server_mut()
            .spawn(avatar_of(client), client, avatar()?)
            .with_context(|| format!("spawn avatar for {client}"))?;
    }

    let mut rng = Rng::new(cli.seed);
    let mut summary = Summary::new(&cli);
    for _ in 0..cli.ticks {
        for &client in &clients {
            move_avatar(&mut net, client, &mut rng)?;
        }
        server_events(&mut net, &clients, &mut rng)?;
        let report = net.step()?;
        for envelope in &report.sent {
            capture(&cli.out_dir, envelope)?;
            summary.push(envelope);
        }
        summary.permission_errors += report.permission_errors;
        summary.dropped += report.dropped;
    }

    let conditions = convergence_conditions(&clients);
    match net.wait_for(&conditions, SETTLE_TICKS) {
        Ok(ticks) => {
            summary.converged = true;
            summary.settle_ticks = ticks;
        }
        Err(ConvergenceError::Timeout { failed, ticks }) => {
            summary.settle_ticks = ticks;
            summary.failed_conditions = failed;
        }
        Err(err) => return Err(err.into()),
    }

    summary.finalize();
    write_summary_json(&cli.out_dir, &summary)?;
    info!(
        messages = summary.message_count,
        bytes = summary.bytes_total,
        converged = summary.converged,
        "simulation finished"
    );
    if !summary.converged {
        anyhow::bail!(
            "replicas did not converge: {}",
            summary.failed_conditions.join(", ")
        );
    }
    summary.assert_budget(cli.max_p95_delta_bytes)
}

/// Owners nudge their avatar most ticks.
fn move_avatar(net: &mut SimNetwork, client: ClientId, rng: &mut Rng) -> Result<()> {
    if rng.next_u32() % 4 == 0 {
        return Ok(());
    }
    let step = rng.range_i32(-25, 25);
    let graph = net.client_mut(client)?;
    let Some(object) = graph.object_mut(avatar_of(client)) else {
        // Not spawned on this client yet.
        return Ok(());
    };
    let position = object
        .variable_mut::<NetworkVariable<i32>>(POSITION)
        .context("position variable")?;
    let next = (position.value() + step).clamp(-POS_LIMIT, POS_LIMIT);
    position.set(next)?;
    Ok(())
}

/// The server applies damage, heals, and hands out items.
fn server_events(net: &mut SimNetwork, clients: &[ClientId], rng: &mut Rng) -> Result<()> {
    for &client in clients {
        let roll = rng.next_u32() % 20;
        let item = u16::try_from(rng.next_u32() % 512).unwrap_or_default();
        let object = net
            .server_mut()
            .object_mut(avatar_of(client))
            .context("avatar on server")?;
        match roll {
            0 | 1 => {
                let health = object
                    .variable_mut::<NetworkVariable<u16>>(HEALTH)
                    .context("health variable")?;
                let damaged = health.value().saturating_sub(7);
                health.set(if damaged == 0 { MAX_HEALTH } else { damaged })?;
            }
            2 => {
                let inventory = object
                    .variable_mut::<NetworkList<u16>>(INVENTORY)
                    .context("inventory variable")?;
                if inventory.len() >= MAX_ITEMS {
                    inventory.remove_at(0)?;
                }
                inventory.push(item)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn convergence_conditions(clients: &[ClientId]) -> Vec<Condition> {
    let mut conditions = Vec::new();
    for &client in clients {
        let object = avatar_of(client);
        conditions.push(Condition::spawned(object));
        conditions.push(Condition::converged::<i32>(object, POSITION));
        conditions.push(Condition::converged::<u16>(object, HEALTH));
        conditions.push(Condition::new(
            format!("{object} {INVENTORY} converged"),
            move |net: &SimNetwork| {
                let items = |graph: &repgraph::ReplicationGraph| {
                    graph
                        .object(object)
                        .and_then(|o| o.variable::<NetworkList<u16>>(INVENTORY))
                        .map(|list| list.as_slice().to_vec())
                };
                let expected = items(net.server());
                expected.is_some() && net.clients().all(|graph| items(graph) == expected)
            },
        ));
    }
    conditions
}

fn capture(out_dir: &Path, envelope: &Envelope) -> Result<()> {
    let name = format!(
        "t{:06}_o{}_{}_{}_to_{}.bin",
        envelope.sent_at,
        envelope.object.raw(),
        envelope.flags.kind_name(),
        envelope.from.raw(),
        envelope.to.raw()
    );
    let path = out_dir.join(name);
    inspect_message(&envelope.bytes, &wire::Limits::default())
        .with_context(|| format!("inspect {}", path.display()))?;
    fs::write(&path, &envelope.bytes).with_context(|| format!("write {}", path.display()))
}

fn write_summary_json(out_dir: &Path, summary: &Summary) -> Result<()> {
    let path = out_dir.join("summary.json");
    let contents = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

struct Rng {
    state: u64,
}

impl Rng {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        let span = (max - min).unsigned_abs() + 1;
        min + (self.next_u32() % span) as i32
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    clients: u32,
    ticks: u32,
    seed: u64,
    latency: u32,
    message_count: u64,
    bytes_total: u64,
    /// Message counts keyed by kind (spawn, delta, ownership, despawn).
    messages_by_kind: BTreeMap<&'static str, u64>,
    bytes_by_kind: BTreeMap<&'static str, u64>,
    avg_delta_bytes: u64,
    p95_delta_bytes: u64,
    permission_errors: usize,
    dropped: usize,
    converged: bool,
    settle_ticks: u32,
    failed_conditions: Vec<String>,
    #[serde(skip)]
    delta_sizes: Vec<u64>,
}

impl Summary {
    fn new(cli: &Cli) -> Self {
        Self {
            clients: cli.clients,
            ticks: cli.ticks,
            seed: cli.seed,
            latency: cli.latency,
            message_count: 0,
            bytes_total: 0,
            messages_by_kind: BTreeMap::new(),
            bytes_by_kind: BTreeMap::new(),
            avg_delta_bytes: 0,
            p95_delta_bytes: 0,
            permission_errors: 0,
            dropped: 0,
            converged: false,
            settle_ticks: 0,
            failed_conditions: Vec::new(),
            delta_sizes: Vec::new(),
        }
    }

    fn push(&mut self, envelope: &Envelope) {
        let bytes = envelope.bytes.len() as u64;
        let kind = envelope.flags.kind_name();
        self.message_count += 1;
        self.bytes_total += bytes;
        *self.messages_by_kind.entry(kind).or_default() += 1;
        *self.bytes_by_kind.entry(kind).or_default() += bytes;
        if envelope.flags.is_delta() {
            self.delta_sizes.push(bytes);
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn finalize(&mut self) {
        if self.delta_sizes.is_empty() {
            return;
        }
        let total: u64 = self.delta_sizes.iter().sum();
        self.avg_delta_bytes = total / self.delta_sizes.len() as u64;
        self.delta_sizes.sort_unstable();
        let idx = ((self.delta_sizes.len() as f64) * 0.95).ceil() as usize;
        let idx = idx.saturating_sub(1).min(self.delta_sizes.len() - 1);
        self.p95_delta_bytes = self.delta_sizes[idx];
    }

    fn assert_budget(&self, max_p95: Option<u64>) -> Result<()> {
        if let Some(max_p95) = max_p95 {
            if self.p95_delta_bytes > max_p95 {
                anyhow::bail!(
                    "p95 delta bytes {} exceeds budget {}",
                    self.p95_delta_bytes,
                    max_p95
                );
            }
        }
        Ok(())
    }
}
