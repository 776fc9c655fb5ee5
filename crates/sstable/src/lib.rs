//! # Segments - Sorted String Tables
//!
//! Immutable, on-disk storage files for the JumpDB storage engine.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its entry bound the
//! engine flushes it to disk as a segment. Segments are *write-once,
//! read-many* — once created they are never modified, only replaced during
//! compaction and then deleted.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA SECTION (key/value entries, strictly ascending keys)     │
//! │                                                               │
//! │ key_len (u32) | value_len (u32) | key | value                 │
//! │                                                               │
//! │ value_len = 0xFFFF_FFFF marks a tombstone; no value bytes     │
//! │ follow. ... repeated for each entry ...                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM SECTION (serialized BloomFilter)                        │
//! │                                                               │
//! │ num_bits (u64) | num_hashes (u32)                             │
//! │ words_len (u32) | words (u64 each)                            │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX SECTION (sparse: one sample per stride, plus the last)  │
//! │                                                               │
//! │ key_len (u32) | key | data_offset (u64)                       │
//! │                                                               │
//! │ ... repeated for each sampled entry ...                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 32 bytes)                                 │
//! │                                                               │
//! │ bloom_offset (u64) | index_offset (u64) | entry_count (u64)   │
//! │ trailer_crc (u32) | magic (u32) "JDB1"                        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. `bloom_offset` is also the end of the
//! data section; a lookup scan never crosses it. `trailer_crc` is a CRC32
//! over the bloom and index sections — the parts rebuilt into memory on
//! open — so a corrupt trailer is caught before it can misdirect reads.
//!
//! The index is **sparse**: one `(key, offset)` sample for every
//! `stride`-th entry, plus the final entry. A lookup binary-searches the
//! samples for the greatest key at or below the target, then scans forward
//! at most `stride` entries. Keys below the first sample are absent by
//! construction (the first entry is always sampled).

mod format;
mod index;
mod merge;
mod reader;
mod writer;

use std::io;
use thiserror::Error;

pub use format::{FOOTER_BYTES, SEGMENT_MAGIC, TOMBSTONE_VALUE_LEN};
pub use index::SparseIndex;
pub use merge::MergeIterator;
pub use reader::{Lookup, Segment, SegmentIter};
pub use writer::SegmentWriter;

/// Errors from writing or reading segment files.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file failed structural validation: bad magic, impossible
    /// offsets or lengths, or a trailer checksum mismatch.
    #[error("corrupt segment: {0}")]
    Corrupt(String),

    /// The writer was fed keys out of order.
    #[error("unsorted input: key {key:?} does not follow the previous key")]
    Unsorted {
        /// The offending key (lossily printable for diagnostics).
        key: String,
    },
}

impl SegmentError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        SegmentError::Corrupt(msg.into())
    }

    pub(crate) fn unsorted(key: &[u8]) -> Self {
        SegmentError::Unsorted {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests;
