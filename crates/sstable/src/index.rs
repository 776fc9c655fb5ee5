//! Sparse index over a segment's data section.
//!
//! One `(key, offset)` sample per `stride` entries, plus the final entry.
//! Because entries are sorted and the first entry is always sampled, the
//! greatest sample at or below a target key bounds a forward scan to at
//! most `stride` entries.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

use crate::format::MAX_KEY_BYTES;
use crate::SegmentError;

#[derive(Debug, Default)]
pub struct SparseIndex {
    /// Sorted ascending by key; offsets point into the data section.
    samples: Vec<(Vec<u8>, u64)>,
}

impl SparseIndex {
    pub(crate) fn from_samples(samples: Vec<(Vec<u8>, u64)>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].0 < w[1].0));
        Self { samples }
    }

    /// Position of the greatest sample with key ≤ `key`, or `None` when
    /// `key` sorts below every sample (the key cannot be in the segment).
    #[must_use]
    pub fn floor(&self, key: &[u8]) -> Option<usize> {
        let n = self.samples.partition_point(|(k, _)| k.as_slice() <= key);
        n.checked_sub(1)
    }

    /// Data-section offset of the sample at `pos`.
    #[must_use]
    pub fn offset(&self, pos: usize) -> u64 {
        self.samples[pos].1
    }

    /// Exclusive upper bound for a scan starting at sample `pos`: the next
    /// sample's offset, or `data_end` for the last sample.
    #[must_use]
    pub fn scan_bound(&self, pos: usize, data_end: u64) -> u64 {
        match self.samples.get(pos + 1) {
            Some((_, off)) => *off,
            None => data_end,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Serializes every sample as `key_len (u32) | key | offset (u64)`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for (key, offset) in &self.samples {
            w.write_u32::<LittleEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u64::<LittleEndian>(*offset)?;
        }
        Ok(())
    }

    /// Parses an index section, consuming `buf` entirely.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, SegmentError> {
        let mut cursor = std::io::Cursor::new(buf);
        let mut samples = Vec::new();

        while (cursor.position() as usize) < buf.len() {
            let key_len = cursor.read_u32::<LittleEndian>()? as usize;
            if key_len == 0 || key_len > MAX_KEY_BYTES {
                return Err(SegmentError::corrupt(format!(
                    "index key_len {} out of range",
                    key_len
                )));
            }
            let mut key = vec![0u8; key_len];
            std::io::Read::read_exact(&mut cursor, &mut key)?;
            let offset = cursor.read_u64::<LittleEndian>()?;

            if let Some((prev, _)) = samples.last() {
                if *prev >= key {
                    return Err(SegmentError::corrupt("index samples not ascending"));
                }
            }
            samples.push((key, offset));
        }

        Ok(Self { samples })
    }
}
