#![no_main]

use codec::{BufferReader, CodecLimits, DecodeContext};
use libfuzzer_sys::fuzz_target;
use repgraph::{ReplicatedObject, ReplicationConfig, ReplicationGraph, ReplicationResult};
use schema::{
    ClientId, ComponentDef, ComponentId, FieldId, ObjectSchema, ValueKind, VariableDef,
    VariableKey,
};
use variable::{NetworkList, NetworkVariable, ReplicatedVariable};

const SCORES: VariableKey = VariableKey::new(1, 0);
const ITEMS: VariableKey = VariableKey::new(2, 0);

fn layout() -> ReplicationResult<ReplicatedObject> {
    let schema = ObjectSchema::builder()
        .component(ComponentDef::new(ComponentId::new(1)).variable(VariableDef::new(
            FieldId::new(0),
            "scores",
            ValueKind::list(ValueKind::uint(16)),
        )))
        .component(ComponentDef::new(ComponentId::new(2)).variable(VariableDef::new(
            FieldId::new(0),
            "items",
            ValueKind::list(ValueKind::uint(16)),
        )))
        .build()?;
    ReplicatedObject::new(schema)?
        .with(SCORES, NetworkVariable::new(vec![1u16, 2, 3]))?
        .with(ITEMS, NetworkList::<u16>::new(vec![4, 5]))
}

fuzz_target!(|data: &[u8]| {
    let limits = wire::Limits::for_testing();

    // Raw section bodies straight into both variable kinds.
    if let Ok(message) = wire::decode_message(data, &limits) {
        let mut scores = NetworkVariable::new(vec![1u16, 2, 3]);
        let mut items = NetworkList::<u16>::new(vec![4, 5]);
        for section in &message.sections {
            let mut ctx = DecodeContext::new(CodecLimits::for_testing());
            let _ = scores.read_delta(&mut BufferReader::new(section.body), &mut ctx, false);
            let _ = items.read_delta(&mut BufferReader::new(section.body), &mut ctx, true);
            let _ = scores.read_field(&mut BufferReader::new(section.body), &mut ctx);
        }
    }

    // And through a client graph, which must never panic on server input.
    let mut client = ReplicationGraph::new(ClientId::new(1), ReplicationConfig::for_testing());
    if client.register_layout(layout).is_ok() {
        let _ = client.receive(ClientId::SERVER, data);
        let _ = client.sweep(1);
    }
});
