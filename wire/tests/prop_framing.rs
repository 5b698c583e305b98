//! Property tests for message framing.

use proptest::prelude::*;
use wire::{decode_message, Limits, MessageEncoder, MessageFlags, MessageHeader, HEADER_SIZE};

fn sections() -> impl Strategy<Value = Vec<(u32, Vec<u8>)>> {
    prop::collection::btree_map(any::<u32>(), prop::collection::vec(any::<u8>(), 0..64), 0..12)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #[test]
    fn encoded_sections_decode_in_order(
        sections in sections(),
        object_id in any::<u64>(),
        tick in any::<u32>(),
        epoch in any::<u32>(),
    ) {
        let header = MessageHeader::new(MessageFlags::delta(), 0xA5A5, object_id, 1, tick, epoch);
        let mut encoder = MessageEncoder::new(&header, &Limits::default()).unwrap();
        for (index, body) in &sections {
            encoder.push_section(*index, body).unwrap();
        }
        let bytes = encoder.finish().unwrap();

        let message = decode_message(&bytes, &Limits::default()).unwrap();
        prop_assert_eq!(message.header.object_id, object_id);
        prop_assert_eq!(message.header.tick, tick);
        prop_assert_eq!(message.header.epoch, epoch);
        prop_assert_eq!(message.header.payload_len as usize, bytes.len() - HEADER_SIZE);
        prop_assert_eq!(message.sections.len(), sections.len());
        for (section, (index, body)) in message.sections.iter().zip(&sections) {
            prop_assert_eq!(section.index, *index);
            prop_assert_eq!(section.body, body.as_slice());
        }
    }

    #[test]
    fn decoding_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_message(&bytes, &Limits::for_testing());
    }

    #[test]
    fn corrupted_payload_never_panics(
        sections in sections(),
        flip in any::<usize>(),
        value in any::<u8>(),
    ) {
        let header = MessageHeader::new(MessageFlags::spawn(), 1, 2, 0, 3, 0);
        let mut encoder = MessageEncoder::new(&header, &Limits::default()).unwrap();
        for (index, body) in &sections {
            encoder.push_section(*index, body).unwrap();
        }
        let mut bytes = encoder.finish().unwrap();
        if bytes.len() > HEADER_SIZE {
            let at = HEADER_SIZE + flip % (bytes.len() - HEADER_SIZE);
            bytes[at] = value;
        }
        let _ = decode_message(&bytes, &Limits::default());
    }
}
