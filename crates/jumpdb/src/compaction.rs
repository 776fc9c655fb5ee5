/// Compaction: k-way merge of the newest `n` segments into fresh segments.
///
/// The merge walks all inputs in ascending key order, keeps only the entry
/// from the newest contributing segment per key group, and reconciles
/// tombstones: when the inputs include the oldest live segment there is
/// nothing left for a tombstone to shadow, so it is dropped; otherwise it
/// is retained. Outputs roll over at `max_segment_entries`, are written
/// atomically (tmp + rename), and replace the inputs in a single registry
/// step before the old files are deleted.
use sstable::{MergeIterator, Segment, SegmentWriter};
use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::registry::segment_file_name;
use crate::Engine;

impl Engine {
    /// Compacts all live segments.
    ///
    /// Since every segment participates, tombstones have nothing older to
    /// shadow and are garbage-collected. A registry with one segment or
    /// fewer is left untouched.
    pub fn compact(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.compact_segments(self.registry.len())
    }

    /// Compacts only the `n` newest segments (size-tiered selection).
    ///
    /// Tombstones survive unless `n` covers every live segment, because
    /// older segments may still hold values they must shadow. `n` is
    /// clamped to the live segment count.
    pub fn compact_newest(&mut self, n: usize) -> Result<()> {
        self.ensure_open()?;
        self.compact_segments(n.min(self.registry.len()))
    }

    pub(crate) fn compact_segments(&mut self, n: usize) -> Result<()> {
        if n <= 1 {
            return Ok(());
        }
        let includes_oldest = n == self.registry.len();

        let stride = self.config.sparse_stride;
        let fp_rate = self.config.bloom_fp_rate;
        let max_entries = self.config.max_segment_entries as u64;
        let dir = self.config.segment_dir.clone();

        let inputs = &self.registry.segments()[..n];
        // Upper bound on surviving entries; sizes the output bloom filters.
        let expected: u64 = inputs.iter().map(|s| s.entry_count()).sum();
        log::debug!(
            "compacting {} segments ({} entries, drop_tombstones={})",
            n,
            expected,
            includes_oldest
        );

        let mut sources = Vec::with_capacity(n);
        for segment in inputs {
            sources.push(segment.iter()?);
        }
        let mut merge = MergeIterator::new(sources)?;

        // Each output holds at most max_entries entries.
        let expected = expected.min(max_entries) as usize;
        let mut next_id = self.next_segment_id;
        let mut finished: Vec<(u64, PathBuf)> = Vec::new();
        let mut current: Option<(SegmentWriter, u64, PathBuf)> = None;

        let outcome = (|| -> Result<()> {
            while let Some((key, entry)) = merge.next_entry()? {
                if includes_oldest && entry.is_tombstone() {
                    continue;
                }

                if current.is_none() {
                    let id = next_id;
                    next_id += 1;
                    let path = dir.join(segment_file_name(id));
                    let writer = SegmentWriter::create(&path, expected, stride, fp_rate)?;
                    current = Some((writer, id, path));
                }

                let rolled = {
                    let (writer, _, _) = current.as_mut().expect("output writer exists");
                    writer.add(&key, &entry)?;
                    writer.entry_count() >= max_entries
                };

                if rolled {
                    if let Some((writer, id, path)) = current.take() {
                        writer.finish()?;
                        finished.push((id, path));
                    }
                }
            }

            if let Some((writer, id, path)) = current.take() {
                writer.finish()?;
                finished.push((id, path));
            }
            Ok(())
        })();

        if let Err(e) = outcome {
            // Unfinished writers clean their temp files up on drop; remove
            // anything already renamed into place. Nothing was registered
            // and no input was deleted, so the engine state is unchanged.
            for (_, path) in &finished {
                let _ = fs::remove_file(path);
            }
            return Err(e);
        }

        let mut outputs = Vec::with_capacity(finished.len());
        for (id, path) in &finished {
            match Segment::open(path, *id) {
                Ok(segment) => outputs.push(segment),
                Err(e) => {
                    for (_, path) in &finished {
                        let _ = fs::remove_file(path);
                    }
                    return Err(e.into());
                }
            }
        }

        // Registry order is newest first; outputs were created in
        // ascending id order.
        outputs.reverse();
        let output_count = outputs.len();
        let replaced = self.registry.replace_newest(n, outputs);
        self.next_segment_id = next_id;

        // Drop readers (releases file handles) before unlinking.
        let replaced_paths: Vec<PathBuf> =
            replaced.iter().map(|s| s.path().to_path_buf()).collect();
        drop(replaced);
        for path in &replaced_paths {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("failed to remove {}: {}", path.display(), e);
            }
        }

        log::debug!("compaction done: {} segments in, {} out", n, output_count);
        Ok(())
    }
}
