use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use codec::{classify_list, BufferReader, BufferWriter, DecodeContext, FixedString};
use schema::{ClientId, ObjectId, Permissions, Topology};
use variable::{NetworkVariable, ObjectAuthority, ReplicatedVariable, VariableError};

fn spawned(local: ClientId, owner: ClientId) -> Rc<ObjectAuthority> {
    let authority = Rc::new(ObjectAuthority::new(
        ObjectId::new(42),
        local,
        owner,
        Topology::ClientServer,
    ));
    authority.set_spawned(true);
    authority
}

fn send_delta<V: ReplicatedVariable>(from: &mut V, to: &mut V) {
    let mut writer = BufferWriter::with_max_capacity(64, 1 << 16);
    from.write_delta(&mut writer).unwrap();
    let bytes = writer.into_bytes();
    to.read_delta(
        &mut BufferReader::new(&bytes),
        &mut DecodeContext::default(),
        false,
    )
    .unwrap();
}

fn send_field<V: ReplicatedVariable>(from: &mut V, to: &mut V) {
    let mut writer = BufferWriter::with_max_capacity(64, 1 << 16);
    from.write_field(&mut writer).unwrap();
    let bytes = writer.into_bytes();
    to.read_field(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
        .unwrap();
}

#[test]
fn scalar_server_write_and_client_denial() {
    let server_side = spawned(ClientId::SERVER, ClientId::SERVER);
    let client_side = spawned(ClientId::new(1), ClientId::SERVER);

    let mut server = NetworkVariable::<i32>::new(0);
    server.attach_to(&server_side);
    let mut client = NetworkVariable::<i32>::new(0);
    client.attach_to(&client_side);

    server.set(111).unwrap();
    send_delta(&mut server, &mut client);
    assert_eq!(client.value(), &111);

    let err = client.set(5).unwrap_err();
    assert!(matches!(err, VariableError::Permission(_)));
    assert!(!client.check_dirty_state().unwrap());
    assert_eq!(client.value(), &111);
}

#[test]
fn list_single_change_classifies_and_applies() {
    let mut server = NetworkVariable::new(vec![b'a', b'b', b'c']);
    let mut client = NetworkVariable::new(vec![b'a', b'b', b'c']);

    server.value_mut()[1] = b'd';
    let delta = classify_list(server.snapshot(), server.value());
    assert_eq!(delta.changed.len(), 1);
    assert_eq!(delta.changed[0].key, 1);
    assert_eq!(*delta.changed[0].current, b'd');
    let unchanged: Vec<u8> = delta.unchanged.iter().map(|(_, v)| **v).collect();
    assert_eq!(unchanged, vec![b'a', b'c']);
    assert!(delta.added.is_empty());
    assert!(delta.removed.is_empty());

    assert!(server.check_dirty_state().unwrap());
    send_delta(&mut server, &mut client);
    assert_eq!(client.value(), &vec![b'a', b'd', b'c']);
}

#[test]
fn full_then_delta_sequence_keeps_replicas_equal() {
    let mut server: NetworkVariable<HashMap<u16, BTreeSet<i8>>> = NetworkVariable::new(
        (0..6).map(|k| (k, (0..4).collect())).collect(),
    );
    let mut client = NetworkVariable::new(HashMap::new());
    send_field(&mut server, &mut client);
    assert_eq!(client.value(), server.value());

    for round in 0..5i8 {
        let map = server.value_mut();
        map.entry(round as u16).or_default().insert(round + 10);
        map.remove(&(5 - round as u16));
        if server.check_dirty_state().unwrap() {
            send_delta(&mut server, &mut client);
        }
        assert_eq!(client.value(), server.value(), "round {round}");
        assert!(!server.is_dirty());
    }
}

#[test]
fn owner_write_variable_follows_ownership() {
    let authority = spawned(ClientId::new(3), ClientId::new(3));
    let mut var = NetworkVariable::<FixedString<16>>::with_permissions(
        FixedString::default(),
        Permissions::owner_write(),
    );
    var.attach_to(&authority);

    var.set(FixedString::new("mine").unwrap()).unwrap();
    assert!(var.check_dirty_state().unwrap());

    authority.apply_ownership(ClientId::new(4), 1);
    assert!(!var.check_dirty_state().unwrap());
    assert_eq!(var.value().as_str(), "");
    assert!(var.set(FixedString::new("late").unwrap()).is_err());
}

#[test]
fn change_callbacks_receive_previous_and_current() {
    let mut server = NetworkVariable::new(vec![1u32]);
    let mut client = NetworkVariable::new(vec![1u32]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    client.subscribe(move |previous: &Vec<u32>, current: &Vec<u32>| {
        log.borrow_mut().push((previous.clone(), current.clone()));
    });

    server.value_mut().push(2);
    server.check_dirty_state().unwrap();
    send_delta(&mut server, &mut client);

    assert_eq!(*seen.borrow(), vec![(vec![1], vec![1, 2])]);
}
