//! `HashSet` and `BTreeSet` encoding.
//!
//! Delta layout after the marker:
//! `[added count][item]* [removed count][item]* [changed count][item]*`.
//! Changed items replace the receiver's stored element.

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use bitstream::{BufferReader, BufferWriter};
use schema::ValueKind;

use super::{classify_set, keyed_prefers_full, read_marker, DELTA_MARKER, FULL_MARKER};
use crate::context::{DecodeContext, DeltaSection, RejectReason};
use crate::error::CodecResult;
use crate::value::NetworkValue;

macro_rules! impl_network_set {
    ($set:ident, $($bound:tt)+) => {
        impl<T> NetworkValue for $set<T>
        where
            T: NetworkValue + $($bound)+,
        {
            fn kind() -> ValueKind {
                ValueKind::hash_set(T::kind())
            }

            fn write(&self, writer: &mut BufferWriter) -> CodecResult<()> {
                writer.write_len(self.len())?;
                for item in self {
                    item.write(writer)?;
                }
                Ok(())
            }

            fn read(reader: &mut BufferReader<'_>, ctx: &mut DecodeContext) -> CodecResult<Self> {
                let mut set = Self::new();
                set.read_in_place(reader, ctx)?;
                Ok(set)
            }

            fn read_in_place(
                &mut self,
                reader: &mut BufferReader<'_>,
                ctx: &mut DecodeContext,
            ) -> CodecResult<()> {
                let len = reader.read_len()?;
                ctx.check_collection_len(len)?;
                ctx.nested(|ctx| {
                    self.clear();
                    for _ in 0..len {
                        self.insert(T::read(reader, ctx)?);
                    }
                    Ok(())
                })
            }

            fn write_delta(&self, previous: &Self, writer: &mut BufferWriter) -> CodecResult<()> {
                let delta = classify_set(previous, self);
                if keyed_prefers_full(delta.change_count(), self.len()) {
                    writer.write_byte(FULL_MARKER)?;
                    return self.write(writer);
                }

                writer.write_byte(DELTA_MARKER)?;
                for section in [&delta.added, &delta.removed] {
                    writer.write_len(section.len())?;
                    for (item, ()) in section {
                        item.write(writer)?;
                    }
                }
                writer.write_len(delta.changed.len())?;
                for change in &delta.changed {
                    change.key.write(writer)?;
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
                        let item = T::read(reader, ctx)?;
                        if self.contains(&item) {
                            ctx.reject(DeltaSection::Added, RejectReason::DuplicateKey);
                        } else {
                            self.insert(item);
                        }
                    }

                    let removed = reader.read_len()?;
                    ctx.check_collection_len(removed)?;
                    for _ in 0..removed {
                        let item = T::read(reader, ctx)?;
                        if !self.remove(&item) {
                            ctx.reject(DeltaSection::Removed, RejectReason::MissingKey);
                        }
                    }

                    let changed = reader.read_len()?;
                    ctx.check_collection_len(changed)?;
                    for _ in 0..changed {
                        let item = T::read(reader, ctx)?;
                        if self.contains(&item) {
                            self.replace(item);
                        } else {
                            ctx.reject(DeltaSection::Changed, RejectReason::MissingKey);
                        }
                    }
                    Ok(())
                })
            }

            fn are_equal(&self, other: &Self) -> bool {
                self.len() == other.len()
                    && self
                        .iter()
                        .all(|item| other.get(item).is_some_and(|o| item.are_equal(o)))
            }

            fn duplicate(&self) -> Self {
                self.iter().map(T::duplicate).collect()
            }
        }
    };
}

impl_network_set!(HashSet, Eq + Hash);
impl_network_set!(BTreeSet, Ord);
