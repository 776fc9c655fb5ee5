use std::collections::BTreeMap;

/// A logical value as stored in the memtable and in segment files.
///
/// `Tombstone` marks a deletion. It is a real entry: it must survive flushes
/// so it can shadow older values of the same key in segments written earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Value(Vec<u8>),
    Tombstone,
}

impl Entry {
    /// Returns the live value, or `None` for a tombstone.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Entry::Tombstone)
    }
}

/// The ordered in-memory buffer of the most recent writes.
///
/// One entry per key; a later `insert` or `insert_tombstone` replaces any
/// earlier entry in place. The caller (the engine façade) is serialized, so
/// "later call" and "newer write" coincide and no per-entry ordering stamp
/// is needed.
///
/// `len()` counts entries including tombstones; the engine flushes when the
/// count crosses its configured bound.
#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Entry>,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Inserts or overwrites `key → value`.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.map.insert(key, Entry::Value(value));
    }

    /// Records a deletion for `key`. Overwrites any existing entry,
    /// including a previous tombstone.
    pub fn insert_tombstone(&mut self, key: Vec<u8>) {
        self.map.insert(key, Entry::Tombstone);
    }

    /// Point lookup. `Some(Entry::Tombstone)` means the key was deleted
    /// here and older segments must not be consulted.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.map.get(key)
    }

    /// Ordered traversal in ascending key order, tombstones included.
    /// This is the flush path's input.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Entry)> {
        self.map.iter().map(|(k, e)| (k.as_slice(), e))
    }

    /// Consumes the table, yielding owned entries in ascending key order.
    pub fn into_iter(self) -> impl Iterator<Item = (Vec<u8>, Entry)> {
        self.map.into_iter()
    }

    /// Number of entries, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
