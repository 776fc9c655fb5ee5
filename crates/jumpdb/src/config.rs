//! Configuration options for opening a JumpDB engine.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Options accepted by [`Engine::open`](crate::Engine::open).
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding segment files. Created if missing.
    pub segment_dir: PathBuf,

    /// Memtable entry bound; a flush runs when an insert pushes the entry
    /// count (tombstones included) past this.
    /// Default: 1024
    pub max_inmemory_size: usize,

    /// Keep segment files on disk across close/reopen. When `false`, all
    /// segment files are deleted on close.
    /// Default: true
    pub persist_segments: bool,

    /// Sparse-index sampling interval: one `(key, offset)` sample per this
    /// many entries (plus the final entry). A point lookup scans at most
    /// this many entries.
    /// Default: 100
    pub sparse_stride: usize,

    /// Target bloom filter false-positive rate, in `(0, 1)`.
    /// Default: 0.01 (1%)
    pub bloom_fp_rate: f64,

    /// Number of live segments that triggers automatic compaction after a
    /// flush. Set to 0 to disable auto-compaction.
    /// Default: 4
    pub compaction_threshold: usize,

    /// Maximum entries per compaction output segment; the merge rolls over
    /// to a fresh segment at this bound.
    /// Default: 100_000
    pub max_segment_entries: usize,
}

impl Config {
    /// Creates a configuration with the given segment directory and
    /// default values for everything else.
    pub fn new<P: AsRef<Path>>(segment_dir: P) -> Self {
        Self {
            segment_dir: segment_dir.as_ref().to_path_buf(),
            max_inmemory_size: 1024,
            persist_segments: true,
            sparse_stride: 100,
            bloom_fp_rate: 0.01,
            compaction_threshold: 4,
            max_segment_entries: 100_000,
        }
    }

    /// Sets the memtable entry bound.
    pub fn max_inmemory_size(mut self, entries: usize) -> Self {
        self.max_inmemory_size = entries;
        self
    }

    /// Sets whether segment files survive close.
    pub fn persist_segments(mut self, persist: bool) -> Self {
        self.persist_segments = persist;
        self
    }

    /// Sets the sparse-index sampling interval.
    pub fn sparse_stride(mut self, stride: usize) -> Self {
        self.sparse_stride = stride;
        self
    }

    /// Sets the bloom filter false-positive rate.
    pub fn bloom_fp_rate(mut self, rate: f64) -> Self {
        self.bloom_fp_rate = rate;
        self
    }

    /// Sets the auto-compaction segment-count trigger (0 disables).
    pub fn compaction_threshold(mut self, threshold: usize) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    /// Sets the per-segment entry bound for compaction outputs.
    pub fn max_segment_entries(mut self, entries: usize) -> Self {
        self.max_segment_entries = entries;
        self
    }

    /// Validates the options, rejecting zero bounds and out-of-range rates.
    pub fn validate(&self) -> Result<()> {
        if self.max_inmemory_size == 0 {
            return Err(EngineError::argument("max_inmemory_size must be > 0"));
        }
        if self.sparse_stride == 0 {
            return Err(EngineError::argument("sparse_stride must be >= 1"));
        }
        if !(self.bloom_fp_rate > 0.0 && self.bloom_fp_rate < 1.0) {
            return Err(EngineError::argument(
                "bloom_fp_rate must be between 0 and 1",
            ));
        }
        if self.max_segment_entries == 0 {
            return Err(EngineError::argument("max_segment_entries must be > 0"));
        }
        Ok(())
    }
}
