use std::collections::HashMap;

use codec::{BufferReader, BufferWriter, DecodeContext};
use proptest::prelude::*;
use variable::{DirtyState, NetworkDictionary, NetworkList, NetworkVariable, ReplicatedVariable};

fn send_delta<V: ReplicatedVariable>(from: &mut V, to: &mut V) {
    let mut writer = BufferWriter::with_max_capacity(64, 1 << 16);
    from.write_delta(&mut writer).unwrap();
    let bytes = writer.into_bytes();
    let mut ctx = DecodeContext::default();
    to.read_delta(&mut BufferReader::new(&bytes), &mut ctx, false)
        .unwrap();
    assert!(ctx.rejected().is_empty());
}

/// Sends whatever the dirty check finds.
fn sync<V: ReplicatedVariable>(from: &mut V, to: &mut V) {
    if from.check_dirty_state().unwrap() {
        send_delta(from, to);
    }
}

#[derive(Debug, Clone)]
enum VecOp {
    Set(Vec<u16>),
    Push(u16),
    Pop,
    Assign(usize, u16),
    Sync,
}

fn vec_op() -> impl Strategy<Value = VecOp> {
    prop_oneof![
        prop::collection::vec(any::<u16>(), 0..12).prop_map(VecOp::Set),
        any::<u16>().prop_map(VecOp::Push),
        Just(VecOp::Pop),
        (any::<usize>(), any::<u16>()).prop_map(|(index, value)| VecOp::Assign(index, value)),
        Just(VecOp::Sync),
    ]
}

#[derive(Debug, Clone)]
enum MapOp {
    Insert(u8, u16),
    Remove(u8),
    Sync,
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        (0u8..16, any::<u16>()).prop_map(|(key, value)| MapOp::Insert(key, value)),
        (0u8..16).prop_map(MapOp::Remove),
        Just(MapOp::Sync),
    ]
}

#[derive(Debug, Clone)]
enum ListOp {
    Push(u8),
    Insert(usize, u8),
    RemoveAt(usize),
    Set(usize, u8),
    Clear,
    Sync,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        any::<u8>().prop_map(ListOp::Push),
        (any::<usize>(), any::<u8>()).prop_map(|(index, value)| ListOp::Insert(index, value)),
        any::<usize>().prop_map(ListOp::RemoveAt),
        (any::<usize>(), any::<u8>()).prop_map(|(index, value)| ListOp::Set(index, value)),
        Just(ListOp::Clear),
        Just(ListOp::Sync),
    ]
}

proptest! {
    #[test]
    fn vec_variable_converges(initial in prop::collection::vec(any::<u16>(), 0..8), ops in prop::collection::vec(vec_op(), 1..40)) {
        let mut server = NetworkVariable::new(initial.clone());
        let mut client = NetworkVariable::new(initial);

        for op in ops {
            match op {
                VecOp::Set(value) => server.set(value).unwrap(),
                VecOp::Push(value) => server.value_mut().push(value),
                VecOp::Pop => {
                    server.value_mut().pop();
                }
                VecOp::Assign(index, value) => {
                    let items = server.value_mut();
                    if !items.is_empty() {
                        let len = items.len();
                        items[index % len] = value;
                    }
                }
                VecOp::Sync => sync(&mut server, &mut client),
            }
        }
        sync(&mut server, &mut client);

        prop_assert_eq!(client.value(), server.value());
        prop_assert_eq!(server.snapshot(), server.value());
        prop_assert_eq!(server.dirty_state(), DirtyState::Clean);
        prop_assert!(!server.check_dirty_state().unwrap());
    }

    #[test]
    fn map_variable_converges(ops in prop::collection::vec(map_op(), 1..40)) {
        let mut server = NetworkVariable::new(HashMap::<u8, u16>::new());
        let mut client = NetworkVariable::new(HashMap::<u8, u16>::new());

        for op in ops {
            match op {
                MapOp::Insert(key, value) => {
                    server.value_mut().insert(key, value);
                }
                MapOp::Remove(key) => {
                    server.value_mut().remove(&key);
                }
                MapOp::Sync => sync(&mut server, &mut client),
            }
        }
        sync(&mut server, &mut client);

        prop_assert_eq!(client.value(), server.value());
        prop_assert_eq!(server.dirty_state(), DirtyState::Clean);
    }

    #[test]
    fn list_events_converge(initial in prop::collection::vec(any::<u8>(), 0..6), ops in prop::collection::vec(list_op(), 1..40)) {
        let mut server = NetworkList::new(initial.clone());
        let mut client = NetworkList::new(initial);

        for op in ops {
            let len = server.len();
            match op {
                ListOp::Push(value) => server.push(value).unwrap(),
                ListOp::Insert(index, value) => server.insert(index % (len + 1), value).unwrap(),
                ListOp::RemoveAt(index) if len > 0 => {
                    server.remove_at(index % len).unwrap();
                }
                ListOp::Set(index, value) if len > 0 => server.set(index % len, value).unwrap(),
                ListOp::RemoveAt(_) | ListOp::Set(..) => {}
                ListOp::Clear => server.clear().unwrap(),
                ListOp::Sync => sync(&mut server, &mut client),
            }
        }
        sync(&mut server, &mut client);

        prop_assert_eq!(client.as_slice(), server.as_slice());
        prop_assert!(!server.is_dirty());
    }

    #[test]
    fn dictionary_events_converge(ops in prop::collection::vec(map_op(), 1..40)) {
        let mut server = NetworkDictionary::<u8, u16>::new(HashMap::new());
        let mut client = NetworkDictionary::<u8, u16>::new(HashMap::new());

        for op in ops {
            match op {
                MapOp::Insert(key, value) => {
                    server.insert(key, value).unwrap();
                }
                MapOp::Remove(key) => {
                    server.remove(&key).unwrap();
                }
                MapOp::Sync => sync(&mut server, &mut client),
            }
        }
        sync(&mut server, &mut client);

        prop_assert_eq!(client.as_map(), server.as_map());
    }
}
