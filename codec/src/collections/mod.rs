//! Collection delta engine.
//!
//! Every container delta starts with one marker byte: [`FULL_MARKER`] means a
//! full encoding follows, [`DELTA_MARKER`] means a structural delta follows.
//! The sender falls back to a full encoding when the delta would touch most of
//! the collection anyway.
//!
//! Receivers apply deltas in place. An entry that does not fit the receiver's
//! contents (unknown key, duplicate add, list gap) is skipped and recorded on
//! the [`crate::DecodeContext`]; the remaining entries still apply.

mod list;
mod map;
mod set;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use bitstream::BufferReader;

use crate::error::{CodecError, CodecResult};
use crate::value::NetworkValue;

/// Marker byte for a structural delta.
pub const DELTA_MARKER: u8 = 0;

/// Marker byte for a full encoding.
pub const FULL_MARKER: u8 = 1;

/// An entry present in both snapshots whose value differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<K, V> {
    pub key: K,
    pub previous: V,
    pub current: V,
}

/// Classification of every entry of two snapshots into four disjoint parts.
///
/// For lists the key is the index; for maps it is the map key; for sets it is
/// the element itself and the value is `()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDelta<K, V> {
    pub added: Vec<(K, V)>,
    pub removed: Vec<(K, V)>,
    pub changed: Vec<Change<K, V>>,
    pub unchanged: Vec<(K, V)>,
}

impl<K, V> Default for CollectionDelta<K, V> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<K, V> CollectionDelta<K, V> {
    /// Number of added, removed and changed entries.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Returns `true` if the two snapshots are equivalent.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.change_count() == 0
    }
}

/// Read access to a keyed container.
pub trait MapView<K, V> {
    fn entry_count(&self) -> usize;
    fn lookup(&self, key: &K) -> Option<&V>;
    fn entries<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a;
}

impl<K: Eq + Hash, V, S: BuildHasher> MapView<K, V> for HashMap<K, V, S> {
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn entries<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
    {
        self.iter()
    }
}

impl<K: Ord, V> MapView<K, V> for BTreeMap<K, V> {
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn entries<'a>(&'a self) -> impl Iterator<Item = (&'a K, &'a V)>
    where
        K: 'a,
        V: 'a,
    {
        self.iter()
    }
}

/// Read access to a set.
pub trait SetView<T> {
    fn item_count(&self) -> usize;
    /// Returns the stored element equal to `item`.
    fn lookup(&self, item: &T) -> Option<&T>;
    fn items<'a>(&'a self) -> impl Iterator<Item = &'a T>
    where
        T: 'a;
}

impl<T: Eq + Hash, S: BuildHasher> SetView<T> for HashSet<T, S> {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn lookup(&self, item: &T) -> Option<&T> {
        self.get(item)
    }

    fn items<'a>(&'a self) -> impl Iterator<Item = &'a T>
    where
        T: 'a,
    {
        self.iter()
    }
}

impl<T: Ord> SetView<T> for BTreeSet<T> {
    fn item_count(&self) -> usize {
        self.len()
    }

    fn lookup(&self, item: &T) -> Option<&T> {
        self.get(item)
    }

    fn items<'a>(&'a self) -> impl Iterator<Item = &'a T>
    where
        T: 'a,
    {
        self.iter()
    }
}

/// Classifies two list snapshots.
///
/// Indices below the shorter length compare positionally; indices past it
/// are Added (current is longer) or Removed (previous is longer).
pub fn classify_list<'a, T: NetworkValue>(
    previous: &'a [T],
    current: &'a [T],
) -> CollectionDelta<usize, &'a T> {
    let mut delta = CollectionDelta::default();
    let shared = previous.len().min(current.len());

    for (index, (old, new)) in previous.iter().zip(current).enumerate() {
        if old.are_equal(new) {
            delta.unchanged.push((index, new));
        } else {
            delta.changed.push(Change {
                key: index,
                previous: old,
                current: new,
            });
        }
    }
    delta
        .added
        .extend(current.iter().enumerate().skip(shared));
    delta
        .removed
        .extend(previous.iter().enumerate().skip(shared));
    delta
}

/// Classifies two map snapshots per key.
pub fn classify_map<'a, K, V, M>(previous: &'a M, current: &'a M) -> CollectionDelta<&'a K, &'a V>
where
    K: 'a,
    V: NetworkValue,
    M: MapView<K, V>,
{
    let mut delta = CollectionDelta::default();
    for (key, value) in current.entries() {
        match previous.lookup(key) {
            None => delta.added.push((key, value)),
            Some(old) if old.are_equal(value) => delta.unchanged.push((key, value)),
            Some(old) => delta.changed.push(Change {
                key,
                previous: old,
                current: value,
            }),
        }
    }
    for (key, value) in previous.entries() {
        if current.lookup(key).is_none() {
            delta.removed.push((key, value));
        }
    }
    delta
}

/// Classifies two set snapshots by membership.
///
/// An element found in both sets whose stored copy is not codec-equal (equal
/// by `Eq` but carrying a different payload) is Changed.
pub fn classify_set<'a, T, S>(previous: &'a S, current: &'a S) -> CollectionDelta<&'a T, ()>
where
    T: NetworkValue,
    S: SetView<T>,
{
    let mut delta = CollectionDelta::default();
    for item in current.items() {
        match previous.lookup(item) {
            None => delta.added.push((item, ())),
            Some(old) if old.are_equal(item) => delta.unchanged.push((item, ())),
            Some(_) => delta.changed.push(Change {
                key: item,
                previous: (),
                current: (),
            }),
        }
    }
    for item in previous.items() {
        if current.lookup(item).is_none() {
            delta.removed.push((item, ()));
        }
    }
    delta
}

/// Lists fall back to a full encoding when at least 90% of slots changed.
pub(crate) const fn list_prefers_full(changes: usize, len: usize) -> bool {
    len == 0 || changes.saturating_mul(10) >= len.saturating_mul(9)
}

/// Maps and sets fall back when the change count reaches the entry count.
pub(crate) const fn keyed_prefers_full(changes: usize, len: usize) -> bool {
    len == 0 || changes >= len
}

/// Reads the marker byte; returns `true` for a full encoding.
pub(crate) fn read_marker(reader: &mut BufferReader<'_>) -> CodecResult<bool> {
    match reader.read_byte()? {
        DELTA_MARKER => Ok(false),
        FULL_MARKER => Ok(true),
        value => Err(CodecError::InvalidMarker { value }),
    }
}
