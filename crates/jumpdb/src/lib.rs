//! # JumpDB - Embedded LSM Key-Value Store
//!
//! A single-node, persistent key-value store over byte-string keys and
//! values, built as a log-structured merge tree.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → Memtable insert                    │
//! │              |                                │
//! │              |  (entry bound exceeded?)       │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new head segment          │
//! │              |                                │
//! │              |  (segment count > trigger?)    │
//! │              |            yes                 │
//! │              v                                │
//! │           compact() → merged segment(s)       │
//! │                                               │
//! │ read.rs → Memtable → segments newest-first    │
//! │            (first match wins; tombstones      │
//! │             hide older values)                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                             |
//! |----------------|-----------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, open/close, accessors, `Debug`, `Drop` |
//! | [`config`]     | `Config` builder with the documented defaults       |
//! | [`recovery`]   | Segment-dir scan, tmp cleanup, newest-first load    |
//! | [`write`]      | `set()`, `delete()`, `flush()`                      |
//! | [`read`]       | `get()`, `contains()`                               |
//! | [`compaction`] | `compact()` / `compact_newest()` with tombstone GC  |
//! | [`registry`]   | Newest-first list of live segments, id ↔ filename   |
//!
//! ## Durability
//!
//! There is no write-ahead log: a crash loses whatever sits in the
//! memtable. A clean [`close`](Engine::close) (also run best-effort on
//! `Drop`) flushes the memtable first, so closing and reopening preserves
//! every acknowledged write. Segment files are immutable once registered
//! and are written via temp file + fsync + atomic rename.
//!
//! ## Example
//!
//! ```rust,no_run
//! use jumpdb::{Config, Engine};
//!
//! let mut db = Engine::open(Config::new("./data"))?;
//! db.set(b"name".to_vec(), b"alice".to_vec())?;
//! assert_eq!(db.get(b"name")?, Some(b"alice".to_vec()));
//! db.delete(b"name".to_vec())?;
//! assert!(!db.contains(b"name")?);
//! db.close()?;
//! # Ok::<(), jumpdb::EngineError>(())
//! ```

mod compaction;
mod config;
mod error;
mod read;
mod recovery;
mod registry;
mod write;

use memtable::Memtable;
use registry::SegmentRegistry;
use std::fs;
use std::path::PathBuf;

pub use config::Config;
pub use error::{EngineError, Result};

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// The storage engine façade: memtable, segment registry, flush and
/// compaction scheduling.
///
/// # Write Path
///
/// 1. Validate the key and value.
/// 2. Insert into the memtable (a later write for the same key simply
///    overwrites; the API is serialized, so call order is write order).
/// 3. When the memtable entry count exceeds `max_inmemory_size`, flush it
///    to a new segment and register the segment as newest.
/// 4. When the live segment count exceeds `compaction_threshold`, compact.
///
/// # Read Path
///
/// 1. Check the memtable (freshest data, includes tombstones).
/// 2. Check segments newest to oldest: bloom filter, then sparse index,
///    then a bounded scan.
/// 3. First match wins; tombstones hide older values.
///
/// # Recovery
///
/// [`Engine::open`] scans `segment_dir`, removes leftover temp files, and
/// registers existing segments newest-first by their filename ids. The
/// memtable starts empty.
pub struct Engine {
    pub(crate) mem: Memtable,
    pub(crate) registry: SegmentRegistry,
    pub(crate) config: Config,
    /// Next id to assign; ids only grow, so newest-first order is
    /// reconstructible from filenames alone.
    pub(crate) next_segment_id: u64,
    pub(crate) closed: bool,
}

impl Engine {
    /// Opens an engine over `config.segment_dir`, creating the directory
    /// if needed and recovering any persisted segments.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Argument`] for an invalid configuration,
    /// [`EngineError::Corruption`] when an existing segment fails
    /// validation, and [`EngineError::Storage`] for I/O failures.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.segment_dir)?;
        recovery::cleanup_tmp_files(&config.segment_dir);
        let (segments, next_segment_id) = recovery::load_segments(&config.segment_dir)?;
        log::debug!(
            "opened engine at {} with {} segments",
            config.segment_dir.display(),
            segments.len()
        );

        Ok(Self {
            mem: Memtable::new(),
            registry: SegmentRegistry::from_segments(segments),
            config,
            next_segment_id,
            closed: false,
        })
    }

    /// Shuts the engine down. Idempotent.
    ///
    /// With `persist_segments` the memtable is flushed first, so every
    /// acknowledged write is on disk for the next open. Without it, all
    /// segment files are deleted and the memtable is discarded.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.config.persist_segments {
            self.flush_memtable()?;
        } else {
            let removed = self.registry.clear();
            let paths: Vec<PathBuf> = removed.iter().map(|s| s.path().to_path_buf()).collect();
            drop(removed);
            for path in &paths {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("failed to remove {}: {}", path.display(), e);
                }
            }
            self.mem = Memtable::new();
        }

        self.closed = true;
        Ok(())
    }

    /// Number of live segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of entries currently buffered in the memtable, tombstones
    /// included.
    #[must_use]
    pub fn memtable_entries(&self) -> usize {
        self.mem.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The configuration this engine was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("segment_dir", &self.config.segment_dir)
            .field("max_inmemory_size", &self.config.max_inmemory_size)
            .field("memtable_entries", &self.mem.len())
            .field("segment_count", &self.registry.len())
            .field("next_segment_id", &self.next_segment_id)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Best-effort close on drop.
///
/// Errors are ignored because `Drop` cannot propagate them; callers that
/// care about flush failures should invoke [`Engine::close`] explicitly.
impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests;
