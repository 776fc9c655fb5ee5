mod writer_tests;

use crate::{Segment, SegmentError, SegmentWriter};
use memtable::Entry;
use std::path::Path;

/// Writes a segment from `(key, value-or-tombstone)` pairs (which must be
/// pre-sorted) and opens it.
pub fn build_segment(
    dir: &Path,
    name: &str,
    id: u64,
    stride: usize,
    entries: &[(&[u8], Option<&[u8]>)],
) -> Result<Segment, SegmentError> {
    let path = dir.join(name);
    let mut writer = SegmentWriter::create(&path, entries.len(), stride, 0.01)?;
    for (key, value) in entries {
        let entry = match value {
            Some(v) => Entry::Value(v.to_vec()),
            None => Entry::Tombstone,
        };
        writer.add(key, &entry)?;
    }
    writer.finish()?;
    Segment::open(&path, id)
}
