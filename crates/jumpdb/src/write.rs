/// Write path: `set()`, `delete()`, and the flush that turns a full
/// memtable into a new head segment.
///
/// All mutations land in the memtable. When an insert pushes the entry
/// count past `max_inmemory_size`, the memtable is frozen by swapping in a
/// fresh one, written out as a segment, and registered at the head of the
/// registry — all synchronously on the calling thread.
use sstable::{Segment, SegmentWriter};

use crate::error::Result;
use crate::registry::segment_file_name;
use crate::{Engine, EngineError, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Engine {
    /// Inserts or overwrites `key → value`.
    ///
    /// A subsequent [`get`](Engine::get) returns `value` until a later
    /// `set` or `delete` for the same key. May flush (and then compact)
    /// before returning.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        validate_key(&key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(EngineError::argument(format!(
                "value too large: {} bytes (max {})",
                value.len(),
                MAX_VALUE_SIZE
            )));
        }

        self.mem.insert(key, value);
        self.maybe_flush()
    }

    /// Deletes `key` by recording a tombstone.
    ///
    /// Deleting an absent key is not an error: older segments may hold the
    /// key, and the tombstone must shadow them either way.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        validate_key(&key)?;

        self.mem.insert_tombstone(key);
        self.maybe_flush()
    }

    /// Flushes the memtable to a new segment immediately. No-op when the
    /// memtable is empty.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_memtable()
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.mem.len() > self.config.max_inmemory_size {
            self.flush_memtable()?;
        }
        Ok(())
    }

    /// # Steps
    ///
    /// 1. Swap in a fresh memtable; the frozen one is now immutable.
    /// 2. Stream the frozen memtable through the segment writer
    ///    (tmp file + fsync + rename).
    /// 3. Open the new segment and register it at the head (newest).
    /// 4. Run compaction when the live segment count exceeds the trigger.
    ///
    /// On failure the frozen memtable is restored, so no acknowledged
    /// write is lost to a flush error.
    pub(crate) fn flush_memtable(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }

        let frozen = std::mem::take(&mut self.mem);
        let id = self.next_segment_id;
        let name = segment_file_name(id);
        let path = self.config.segment_dir.join(&name);
        log::debug!("flushing memtable ({} entries) to {}", frozen.len(), name);

        let segment = SegmentWriter::write_from_memtable(
            &path,
            &frozen,
            self.config.sparse_stride,
            self.config.bloom_fp_rate,
        )
        .and_then(|_| Segment::open(&path, id));

        let segment = match segment {
            Ok(segment) => segment,
            Err(e) => {
                self.mem = frozen;
                return Err(e.into());
            }
        };

        self.next_segment_id += 1;
        self.registry.register(segment);

        // Keeps read amplification bounded without the caller ever calling
        // compact() themselves.
        if self.config.compaction_threshold > 0
            && self.registry.len() > self.config.compaction_threshold
        {
            self.compact_segments(self.registry.len())?;
        }

        Ok(())
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(EngineError::argument("key must not be empty"));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(EngineError::argument(format!(
            "key too large: {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}
