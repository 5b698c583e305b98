//! `Vec<T>` encoding.
//!
//! Delta layout after the marker:
//! `[len][previous len][change bitmask: len bits][prefixed entry]*`.
//! Entries below the previous length are nested element deltas; entries past
//! it are full elements.

use std::cmp::Ordering;

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use super::{classify_list, list_prefers_full, read_marker, DELTA_MARKER, FULL_MARKER};
use crate::context::{read_prefixed, DecodeContext, DeltaSection, RejectReason};
use crate::error::CodecResult;
use crate::value::{write_prefixed, NetworkValue};

impl<T: NetworkValue> NetworkValue for Vec<T> {
    fn kind() -> ValueKind {
        ValueKind::list(T::kind())
    }

    fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
        writer.write_len(self.len())?;
        for item in self {
            item.write(writer)?;
        }
        Ok(())
    }

    fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self> {
        let mut list = Self::new();
        list.read_in_place(reader, ctx)?;
        Ok(list)
    }

    fn read_in_place(
        &mut self,
        reader: &mut BufferReader<'_>,
        ctx: &mut DecodeContext,
    ) -> CodecResult<()> {
        let len = reader.read_len()?;
        ctx.check_collection_len(len)?;
        ctx.nested(|ctx| {
            self.truncate(len);
            for index in 0..len {
                match self.get_mut(index) {
                    Some(item) => item.read_in_place(reader, ctx)?,
                    None => self.push(T::read(reader, ctx)?),
                }
            }
            Ok(())
        })
    }

    fn write_delta(&self, previous: &Self, writer: &mut BufferWriter) -> CodecResult<()> {
        let delta = classify_list(previous, self);
        let mut mask = vec![false; self.len()];
        for change in &delta.changed {
            mask[change.key] = true;
        }
        for (index, _) in &delta.added {
            mask[*index] = true;
        }

        let changes = delta.changed.len() + delta.added.len();
        if list_prefers_full(changes, self.len()) {
            writer.write_byte(FULL_MARKER)?;
            return self.write(writer);
        }

        writer.write_byte(DELTA_MARKER)?;
        writer.write_len(self.len())?;
        writer.write_len(previous.len())?;
        {
            let mut bits = writer.enter_bitwise();
            for flag in &mask {
                bits.write_bit(*flag)?;
            }
        }
        for (index, item) in self.iter().enumerate() {
            if !mask[index] {
                continue;
            }
            write_prefixed(writer, |w| match previous.get(index) {
                Some(old) => item.write_delta(old, w),
                None => item.write(w),
            })?;
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

        let len = reader.read_len()?;
        ctx.check_collection_len(len)?;
        let previous_len = reader.read_len()?;
        ctx.check_collection_len(previous_len)?;

        reader.try_begin_read(len.div_ceil(8))?;
        let mut mask = Vec::with_capacity(len);
        {
            let mut bits = reader.enter_bitwise();
            for _ in 0..len {
                mask.push(bits.read_bit()?);
            }
        }

        if self.len() != previous_len {
            ctx.reject(
                DeltaSection::Changed,
                RejectReason::LengthMismatch {
                    expected: previous_len,
                    actual: self.len(),
                },
            );
        }
        self.truncate(len);

        ctx.nested(|ctx| {
            for (index, changed) in mask.into_iter().enumerate() {
                if !changed {
                    continue;
                }
                let mut entry = read_prefixed(reader)?;
                if index < previous_len {
                    match self.get_mut(index) {
                        Some(item) => item.read_delta(&mut entry, ctx)?,
                        None => ctx.reject(
                            DeltaSection::Changed,
                            RejectReason::MissingElement { index },
                        ),
                    }
                    continue;
                }
                let item = T::read(&mut entry, ctx)?;
                match index.cmp(&self.len()) {
                    Ordering::Less => self[index] = item,
                    Ordering::Equal => self.push(item),
                    Ordering::Greater => ctx.reject(
                        DeltaSection::Added,
                        RejectReason::IndexGap {
                            index,
                            len: self.len(),
                        },
                    ),
                }
            }
            Ok(())
        })
    }

    fn are_equal(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.are_equal(b))
    }

    fn duplicate(&self) -> Self {
        self.iter().map(T::duplicate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RejectedEntry;
    use crate::CodecError;

    fn encode_delta<T: NetworkValue>(current: &T, previous: &T) -> Vec<u8> {
        let mut writer = BufferWriter::new(1024);
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

    #[test]
    fn single_change_uses_delta() {
        let previous: Vec<u32> = (0..20).collect();
        let mut current = previous.clone();
        current[7] = 700;

        let bytes = encode_delta(&current, &previous);
        assert_eq!(bytes[0], DELTA_MARKER);

        let mut receiver = previous;
        assert!(apply_delta(&mut receiver, &bytes).is_empty());
        assert_eq!(receiver, current);
    }

    #[test]
    fn mostly_changed_falls_back_to_full() {
        let previous = vec![1u8, 2, 3, 4];
        let current = vec![5u8, 6, 7, 8];
        let bytes = encode_delta(&current, &previous);
        assert_eq!(bytes[0], FULL_MARKER);

        let mut receiver = previous;
        apply_delta(&mut receiver, &bytes);
        assert_eq!(receiver, current);
    }

    #[test]
    fn growth_and_shrink() {
        let previous: Vec<i16> = (0..30).collect();
        let mut grown = previous.clone();
        grown.extend([100, 101]);
        let mut receiver = previous.clone();
        apply_delta(&mut receiver, &encode_delta(&grown, &previous));
        assert_eq!(receiver, grown);

        let shrunk: Vec<i16> = (0..10).collect();
        apply_delta(&mut receiver, &encode_delta(&shrunk, &grown));
        assert_eq!(receiver, shrunk);
    }

    #[test]
    fn nested_lists_apply_nested_deltas() {
        let previous: Vec<Vec<u8>> = (0..12).map(|i| vec![i; 12]).collect();
        let mut current = previous.clone();
        current[3][5] = 99;

        let mut receiver = previous.clone();
        apply_delta(&mut receiver, &encode_delta(&current, &previous));
        assert_eq!(receiver, current);
    }

    #[test]
    fn in_place_keeps_allocation() {
        let previous: Vec<u64> = (0..16).collect();
        let mut current = previous.clone();
        current[2] = 42;

        let mut receiver = Vec::with_capacity(64);
        receiver.extend(previous.iter().copied());
        let ptr = receiver.as_ptr();
        apply_delta(&mut receiver, &encode_delta(&current, &previous));
        assert_eq!(receiver.as_ptr(), ptr);

        let mut writer = BufferWriter::new(256);
        previous.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        receiver
            .read_in_place(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap();
        assert_eq!(receiver.as_ptr(), ptr);
        assert_eq!(receiver, previous);
    }

    #[test]
    fn short_receiver_rejects_missing_element_and_continues() {
        let previous: Vec<u8> = (0..20).collect();
        let mut current = previous.clone();
        current[1] = 50;
        current[15] = 51;

        let mut receiver: Vec<u8> = (0..10).collect();
        let rejected = apply_delta(&mut receiver, &encode_delta(&current, &previous));

        assert_eq!(receiver[1], 50);
        assert!(rejected.contains(&RejectedEntry {
            section: DeltaSection::Changed,
            reason: RejectReason::LengthMismatch {
                expected: 20,
                actual: 10
            }
        }));
        assert!(rejected.contains(&RejectedEntry {
            section: DeltaSection::Changed,
            reason: RejectReason::MissingElement { index: 15 }
        }));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut writer = BufferWriter::new(16);
        writer.write_byte(DELTA_MARKER).unwrap();
        writer.write_len(1 << 20).unwrap();
        let bytes = writer.into_bytes();

        let mut receiver = Vec::<u8>::new();
        let err = receiver
            .read_delta(&mut BufferReader::new(&bytes), &mut DecodeContext::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::LimitsExceeded { .. }));
    }

    #[test]
    fn duplicate_is_independent() {
        let original = vec![vec![1u8, 2]];
        let mut copy = original.duplicate();
        copy[0].push(3);
        assert_eq!(original, vec![vec![1, 2]]);
    }
}
