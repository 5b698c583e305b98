//! `HashMap` and `BTreeMap` encoding.
//!
//! Delta layout after the marker:
//! `[added count][(key, value)]* [removed count][key]* [changed count][(key, prefixed value delta)]*`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use super::{classify_map, keyed_prefers_full, read_marker, DELTA_MARKER, FULL_MARKER};
use crate::context::{read_prefixed, DecodeContext, DeltaSection, RejectReason};
use crate::error::CodecResult;
use crate::value::{write_prefixed, NetworkValue};

macro_rules! impl_network_map {
    ($map:ident, $seen:ident, $($key_bound:tt)+) => {
        impl<K, V> NetworkValue for $map<K, V>
        where
            K: NetworkValue + $($key_bound)+,
            V: NetworkValue,
        {
            fn kind() -> ValueKind {
                ValueKind::dictionary(K::kind(), V::kind())
            }

            fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
                writer.write_len(self.len())?;
                for (key, value) in self {
                    key.write(writer)?;
                    value.write(writer)?;
                }
                Ok(())
            }

            fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self> {
                let mut map = Self::new();
                map.read_in_place(reader, ctx)?;
                Ok(map)
            }

            fn read_in_place(
                &mut self,
                reader: &mut BufferReader<'_>,
                ctx: &mut DecodeContext,
            ) -> CodecResult<()> {
                let len = reader.read_len()?;
                ctx.check_collection_len(len)?;
                ctx.nested(|ctx| {
                    let mut seen = $seen::new();
                    for _ in 0..len {
                        let key = K::read(reader, ctx)?;
                        if let Some(value) = self.get_mut(&key) {
                            value.read_in_place(reader, ctx)?;
                        } else {
                            let value = V::read(reader, ctx)?;
                            self.insert(key.clone(), value);
                        }
                        seen.insert(key);
                    }
                    self.retain(|key, _| seen.contains(key));
                    Ok(())
                })
            }

            fn write_delta(&self, previous: &Self, writer: &mut BufferWriter) -> CodecResult<()> {
                let delta = classify_map(previous, self);
                if keyed_prefers_full(delta.change_count(), self.len()) {
                    writer.write_byte(FULL_MARKER)?;
                    return self.write(writer);
                }

                writer.write_byte(DELTA_MARKER)?;
                writer.write_len(delta.added.len())?;
                for (key, value) in &delta.added {
                    key.write(writer)?;
                    value.write(writer)?;
                }
                writer.write_len(delta.removed.len())?;
                for (key, _) in &delta.removed {
                    key.write(writer)?;
                }
                writer.write_len(delta.changed.len())?;
                for change in &delta.changed {
                    change.key.write(writer)?;
                    write_prefixed(writer, |w| change.current.write_delta(change.previous, w))?;
                }
                Ok(())
            }

            fn read_delta(
                &mut self,
                reader: &mut BufferReader<'_>,
                ctx: &mut DecodeContext,
            ) -> CodecResult<()> {
                if read_marker(reader)? {
                    return self.read_in_place(reader, ctx);
                }
                ctx.nested(|ctx| {
                    let added = reader.read_len()?;
                    ctx.check_collection_len(added)?;
                    for _ in 0..added {
                        let key = K::read(reader, ctx)?;
                        let value = V::read(reader, ctx)?;
                        if self.contains_key(&key) {
                            ctx.reject(DeltaSection::Added, RejectReason::DuplicateKey);
                        } else {
                            self.insert(key, value);
                        }
                    }

                    let removed = reader.read_len()?;
                    ctx.check_collection_len(removed)?;
                    for _ in 0..removed {
                        let key = K::read(reader, ctx)?;
                        if self.remove(&key).is_none() {
                            ctx.reject(DeltaSection::Removed, RejectReason::MissingKey);
                        }
                    }

                    let changed = reader.read_len()?;
                    ctx.check_collection_len(changed)?;
                    for _ in 0..changed {
                        let key = K::read(reader, ctx)?;
                        let mut entry = read_prefixed(reader)?;
                        match self.get_mut(&key) {
                            Some(value) => value.read_delta(&mut entry, ctx)?,
                            None => ctx.reject(DeltaSection::Changed, RejectReason::MissingKey),
                        }
                    }
                    Ok(())
                })
            }

            fn are_equal(&self, other: &Self) -> bool {
                self.len() == other.len()
                    && self
                        .iter()
                        .all(|(key, value)| other.get(key).is_some_and(|o| value.are_equal(o)))
            }

            fn duplicate(&self) -> Self {
                self.iter()
                    .map(|(key, value)| (key.duplicate(), value.duplicate()))
                    .collect()
            }
        }
    };
}

impl_network_map!(HashMap, HashSet, Eq + Hash);
impl_network_map!(BTreeMap, BTreeSet, Ord);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RejectedEntry;

    fn encode_delta<T: NetworkValue>(current: &T, previous: &T) -> Vec<u8> {
        let mut writer = BufferWriter::new(4096);
        current.write_delta(previous, &mut writer).unwrap();
        writer.into_bytes()
    }

    fn apply_delta<T: NetworkValue>(target: &mut T, bytes: &[u8]) -> Vec<RejectedEntry> {
        let mut reader = BufferReader::new(bytes);
        let mut ctx = DecodeContext::default();
        target.read_delta(&mut reader, &mut ctx).unwrap();
        assert!(reader.is_at_end());
        ctx.take_rejected()
    }

    fn sample(range: std::ops::Range<u16>) -> HashMap<u16, i32> {
        range.map(|k| (k, i32::from(k) * 10)).collect()
    }

    #[test]
    fn add_remove_change_roundtrip() {
        let previous = sample(0..10);
        let mut current = previous.clone();
        current.insert(50, 500);
        current.remove(&3);
        current.insert(4, -4);

        let bytes = encode_delta(&current, &previous);
        assert_eq!(bytes[0], DELTA_MARKER);

        let mut receiver = previous;
        assert!(apply_delta(&mut receiver, &bytes).is_empty());
        assert_eq!(receiver, current);
    }

    #[test]
    fn full_fallback_when_everything_changes() {
        let previous = sample(0..3);
        let current = sample(10..13);
        let bytes = encode_delta(&current, &previous);
        assert_eq!(bytes[0], FULL_MARKER);

        let mut receiver = previous;
        apply_delta(&mut receiver, &bytes);
        assert_eq!(receiver, current);
    }

    #[test]
    fn nested_dictionary_changes_in_place() {
        let inner: BTreeMap<u8, Vec<u8>> = (0..8).map(|k| (k, vec![k; 4])).collect();
        let previous: BTreeMap<u8, BTreeMap<u8, Vec<u8>>> =
            (0..8).map(|k| (k, inner.clone())).collect();
        let mut current = previous.clone();
        if let Some(map) = current.get_mut(&2) {
            map.insert(100, vec![1]);
        }

        let mut receiver = previous.clone();
        apply_delta(&mut receiver, &encode_delta(&current, &previous));
        assert_eq!(receiver, current);
    }

    #[test]
    fn mismatched_entries_are_rejected_individually() {
        let previous = sample(0..10);
        let mut current = previous.clone();
        current.insert(1, 111);
        current.insert(2, 222);
        current.remove(&9);
        current.insert(20, 200);

        let mut receiver = previous.clone();
        receiver.remove(&1);
        receiver.remove(&9);
        receiver.insert(20, 0);

        let rejected = apply_delta(&mut receiver, &encode_delta(&current, &previous));
        assert_eq!(rejected.len(), 3);
        assert_eq!(receiver.get(&2), Some(&222));
        assert_eq!(receiver.get(&20), Some(&0));
        assert!(!receiver.contains_key(&1));
        assert!(rejected.contains(&RejectedEntry {
            section: DeltaSection::Changed,
            reason: RejectReason::MissingKey
        }));
        assert!(rejected.contains(&RejectedEntry {
            section: DeltaSection::Removed,
            reason: RejectReason::MissingKey
        }));
        assert!(rejected.contains(&RejectedEntry {
            section: DeltaSection::Added,
            reason: RejectReason::DuplicateKey
        }));
    }

    #[test]
    fn read_in_place_drops_stale_keys() {
        let mut receiver = sample(0..5);
        let source = sample(3..6);
        let mut writer = BufferWriter::new(256);
        source.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        receiver
            .read_in_place(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap();
        assert_eq!(receiver, source);
    }

    #[test]
    fn equality_is_order_independent() {
        let a: HashMap<u8, f32> = [(1, 1.0), (2, f32::NAN)].into();
        let b: HashMap<u8, f32> = [(2, f32::NAN), (1, 1.0)].into();
        assert!(a.are_equal(&b));
    }
}
