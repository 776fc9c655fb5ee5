//! The registry of live segments, ordered newest to oldest.
//!
//! Flush inserts at the head; compaction replaces the newest-n prefix with
//! its outputs in one step, so a reader walking the list always sees a
//! consistent snapshot. Segment files encode their creation order in the
//! filename, which is how the same ordering is rebuilt on open.

use sstable::Segment;

/// Builds the on-disk name for a segment id: `segment-<20-digit id>.sst`.
/// Zero padding keeps lexicographic and numeric order identical.
pub(crate) fn segment_file_name(id: u64) -> String {
    format!("segment-{:020}.sst", id)
}

/// Extracts the id from a segment file name, or `None` for foreign files.
pub(crate) fn parse_segment_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("segment-")?
        .strip_suffix(".sst")?
        .parse()
        .ok()
}

#[derive(Debug, Default)]
pub(crate) struct SegmentRegistry {
    /// Newest first. Invariant: ids are strictly descending.
    segments: Vec<Segment>,
}

impl SegmentRegistry {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        debug_assert!(segments.windows(2).all(|w| w[0].id() > w[1].id()));
        Self { segments }
    }

    /// Registers a freshly flushed segment as the newest.
    pub fn register(&mut self, segment: Segment) {
        debug_assert!(self
            .segments
            .first()
            .map(|s| s.id() < segment.id())
            .unwrap_or(true));
        self.segments.insert(0, segment);
    }

    /// Replaces the `n` newest segments with `outputs` (already ordered
    /// newest first) in a single step, returning the replaced segments so
    /// the caller can delete their files.
    pub fn replace_newest(&mut self, n: usize, outputs: Vec<Segment>) -> Vec<Segment> {
        self.segments.splice(0..n, outputs).collect()
    }

    /// Drops every segment from the registry, returning them.
    pub fn clear(&mut self) -> Vec<Segment> {
        std::mem::take(&mut self.segments)
    }

    /// Walks segments newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}
