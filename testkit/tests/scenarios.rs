use repgraph::{ReplicatedObject, ReplicationResult};
use schema::{
    ClientId, ComponentDef, ComponentId, FieldId, ObjectId, ObjectSchema, Permissions, ValueKind,
    VariableDef, VariableKey,
};
use testkit::{value_of, Condition, ConvergenceError, SimConfig, SimNetwork};
use variable::NetworkVariable;

const SCORE: VariableKey = VariableKey::new(1, 0);
const NAME: VariableKey = VariableKey::new(2, 0);

const PLAYER: ObjectId = ObjectId::new(10);
const ALICE: ClientId = ClientId::new(1);
const BOB: ClientId = ClientId::new(2);
const CAROL: ClientId = ClientId::new(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn player() -> ReplicationResult<ReplicatedObject> {
    let layout = ObjectSchema::builder()
        .component(ComponentDef::new(ComponentId::new(1)).variable(VariableDef::new(
            FieldId::new(0),
            "score",
            ValueKind::sint(32),
        )))
        .component(
            ComponentDef::new(ComponentId::new(2)).variable(
                VariableDef::new(FieldId::new(0), "name", ValueKind::list(ValueKind::uint(8)))
                    .permissions(Permissions::owner_write()),
            ),
        )
        .build()?;
    ReplicatedObject::new(layout)?
        .with(SCORE, NetworkVariable::new(0i32))?
        .with(
            NAME,
            NetworkVariable::with_permissions(Vec::<u8>::new(), Permissions::owner_write()),
        )
}

fn session(latency: u32, clients: &[ClientId]) -> SimNetwork {
    init_tracing();
    let mut net = SimNetwork::new(SimConfig::default().latency(latency));
    net.register_layout(player).unwrap();
    for &client in clients {
        net.add_client(client).unwrap();
    }
    net
}

fn set_name(net: &mut SimNetwork, peer: ClientId, name: &[u8]) -> bool {
    net.client_mut(peer)
        .unwrap()
        .object_mut(PLAYER)
        .unwrap()
        .variable_mut::<NetworkVariable<Vec<u8>>>(NAME)
        .unwrap()
        .set(name.to_vec())
        .is_ok()
}

#[test]
fn server_write_converges_under_latency() {
    let mut net = session(2, &[ALICE, BOB, CAROL]);
    net.server_mut()
        .spawn(PLAYER, ClientId::SERVER, player().unwrap())
        .unwrap();

    let ticks = net
        .wait_for(&[Condition::spawned(PLAYER)], 10)
        .unwrap();
    assert_eq!(ticks, 3);

    net.server_mut()
        .object_mut(PLAYER)
        .unwrap()
        .variable_mut::<NetworkVariable<i32>>(SCORE)
        .unwrap()
        .set(111)
        .unwrap();
    net.wait_for(&[Condition::converged::<i32>(PLAYER, SCORE)], 10)
        .unwrap();
    for client in [ALICE, BOB, CAROL] {
        let graph = net.client(client).unwrap();
        assert_eq!(value_of::<i32>(graph, PLAYER, SCORE), Some(&111));
    }
    assert_eq!(net.in_flight(), 0);
}

#[test]
fn owner_writes_reach_every_other_client() {
    let mut net = session(1, &[ALICE, BOB, CAROL]);
    net.server_mut()
        .spawn(PLAYER, ALICE, player().unwrap())
        .unwrap();
    net.wait_for(&[Condition::spawned(PLAYER)], 10).unwrap();

    assert!(set_name(&mut net, ALICE, b"alice"));
    net.wait_for(&[Condition::converged::<Vec<u8>>(PLAYER, NAME)], 10)
        .unwrap();
    assert_eq!(
        value_of::<Vec<u8>>(net.client(CAROL).unwrap(), PLAYER, NAME),
        Some(&b"alice".to_vec())
    );

    assert!(!set_name(&mut net, BOB, b"bob"));
    let report = net.step().unwrap();
    assert!(report.sent.iter().all(|envelope| envelope.from != BOB));
    assert_eq!(
        value_of::<Vec<u8>>(net.client(BOB).unwrap(), PLAYER, NAME),
        Some(&b"alice".to_vec())
    );
}

#[test]
fn ownership_hand_off_waits_for_the_barrier() {
    let mut net = session(1, &[ALICE, BOB]);
    net.server_mut()
        .spawn(PLAYER, ALICE, player().unwrap())
        .unwrap();
    net.wait_for(&[Condition::spawned(PLAYER)], 10).unwrap();

    assert!(set_name(&mut net, ALICE, b"in flight"));
    net.step().unwrap();
    let epoch = net.server_mut().change_ownership(PLAYER, BOB).unwrap();
    assert_eq!(epoch, 1);

    net.wait_for(&[Condition::owned_by(PLAYER, BOB)], 10).unwrap();
    let ready = Condition::new("hand-off ready", |net: &SimNetwork| {
        net.server().hand_off_ready(PLAYER, net.tick())
    });
    net.wait_for(&[ready], 10).unwrap();
    assert_eq!(
        value_of::<Vec<u8>>(net.server(), PLAYER, NAME),
        Some(&Vec::new())
    );

    assert!(set_name(&mut net, BOB, b"bob"));
    net.wait_for(&[Condition::converged::<Vec<u8>>(PLAYER, NAME)], 10)
        .unwrap();
    assert_eq!(
        value_of::<Vec<u8>>(net.client(ALICE).unwrap(), PLAYER, NAME),
        Some(&b"bob".to_vec())
    );
}

#[test]
fn dropped_write_is_undone_on_the_previous_owner() {
    let mut net = session(1, &[ALICE, BOB]);
    net.server_mut()
        .spawn(PLAYER, ALICE, player().unwrap())
        .unwrap();
    net.wait_for(&[Condition::spawned(PLAYER)], 10).unwrap();

    assert!(set_name(&mut net, ALICE, b"in flight"));
    net.step().unwrap();
    net.server_mut().change_ownership(PLAYER, BOB).unwrap();

    net.wait_for(&[Condition::converged::<Vec<u8>>(PLAYER, NAME)], 10)
        .unwrap();
    for peer in [ALICE, BOB] {
        assert_eq!(
            value_of::<Vec<u8>>(net.client(peer).unwrap(), PLAYER, NAME),
            Some(&Vec::new())
        );
    }
    assert_eq!(
        value_of::<Vec<u8>>(net.server(), PLAYER, NAME),
        Some(&Vec::new())
    );
}

#[test]
fn hidden_client_times_out_with_named_condition() {
    let mut net = session(0, &[ALICE, BOB]);
    net.server_mut()
        .spawn(PLAYER, ClientId::SERVER, player().unwrap())
        .unwrap();
    net.server_mut().set_visibility(PLAYER, BOB, false).unwrap();

    let err = net
        .wait_for(
            &[
                Condition::spawned(PLAYER),
                Condition::owned_by(PLAYER, ClientId::SERVER),
            ],
            5,
        )
        .unwrap_err();
    assert_eq!(
        err,
        ConvergenceError::Timeout {
            failed: vec!["object#10 spawned".to_string()],
            ticks: 5,
        }
    );
}

#[test]
fn disconnecting_the_owner_returns_the_object() {
    let mut net = session(1, &[ALICE, BOB]);
    net.server_mut()
        .spawn(PLAYER, ALICE, player().unwrap())
        .unwrap();
    net.wait_for(&[Condition::spawned(PLAYER)], 10).unwrap();

    assert!(net.remove_client(ALICE).is_some());
    assert!(net.remove_client(ALICE).is_none());
    net.wait_for(&[Condition::owned_by(PLAYER, ClientId::SERVER)], 10)
        .unwrap();
    assert!(net.client(ALICE).is_err());
}

#[test]
fn despawn_clears_every_replica() {
    let mut net = session(1, &[ALICE, BOB]);
    net.server_mut()
        .spawn(PLAYER, ClientId::SERVER, player().unwrap())
        .unwrap();
    net.wait_for(&[Condition::spawned(PLAYER)], 10).unwrap();

    net.server_mut().despawn(PLAYER).unwrap();
    net.wait_for(&[Condition::despawned(PLAYER)], 10).unwrap();
}
