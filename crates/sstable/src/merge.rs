//! Merge iterator over multiple segment streams.
//!
//! Produces `(key, Entry)` pairs in ascending key order. When the same key
//! appears in multiple inputs, only the entry from the **newest** source is
//! emitted: sources are supplied newest-first and ties break toward the
//! lower source index.
//!
//! This is the core primitive for compaction: walk N input segments in
//! sorted order, deduplicate per key group, and feed the survivors to a
//! segment writer.

use memtable::Entry;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::reader::SegmentIter;
use crate::SegmentError;

/// The head entry of one source stream, ordered for the merge heap.
struct HeapEntry {
    key: Vec<u8>,
    entry: Entry,
    /// Index into the source array; lower = newer segment.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key pops first.
        // On equal keys the lowest source index (newest segment) pops
        // first, which makes it the key group's winner.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// K-way merge across segment streams, newest source first.
pub struct MergeIterator {
    sources: Vec<SegmentIter>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIterator {
    /// Creates a merge over `sources`, which must be ordered newest first.
    /// The head entry of each source primes the heap.
    pub fn new(mut sources: Vec<SegmentIter>) -> Result<Self, SegmentError> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (i, source) in sources.iter_mut().enumerate() {
            if let Some((key, entry)) = source.next_entry()? {
                heap.push(HeapEntry {
                    key,
                    entry,
                    source: i,
                });
            }
        }
        Ok(Self { sources, heap })
    }

    /// Returns the next key group's winning entry, or `None` when every
    /// source is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Entry)>, SegmentError> {
        let winner = match self.heap.pop() {
            Some(e) => e,
            None => return Ok(None),
        };
        self.advance(winner.source)?;

        // Drain the rest of this key group; the winner already popped
        // first because it came from the newest contributing source.
        while let Some(peek) = self.heap.peek() {
            if peek.key != winner.key {
                break;
            }
            let shadowed = self.heap.pop().expect("peeked entry exists");
            self.advance(shadowed.source)?;
        }

        Ok(Some((winner.key, winner.entry)))
    }

    /// Collects all remaining entries. Test and inspection helper.
    pub fn collect_all(&mut self) -> Result<Vec<(Vec<u8>, Entry)>, SegmentError> {
        let mut result = Vec::new();
        while let Some(pair) = self.next_entry()? {
            result.push(pair);
        }
        Ok(result)
    }

    fn advance(&mut self, source: usize) -> Result<(), SegmentError> {
        if let Some((key, entry)) = self.sources[source].next_entry()? {
            self.heap.push(HeapEntry { key, entry, source });
        }
        Ok(())
    }
}
