use bloom::BloomFilter;
use crc32fast::Hasher as Crc32;
use memtable::{Entry, Memtable};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{self, Footer};
use crate::index::SparseIndex;
use crate::SegmentError;

/// Streaming segment builder.
///
/// Entries are pushed one at a time in strictly ascending key order; the
/// bloom filter and sparse index are built on the fly. Output goes to
/// `<path>.tmp` and is fsynced and atomically renamed into place by
/// [`finish`](SegmentWriter::finish), so a half-written segment is never
/// visible under its final name.
///
/// A writer dropped before `finish` removes its temp file. A merge that
/// retains nothing finishes with zero entries and produces **no file**.
pub struct SegmentWriter {
    file: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    dest_path: PathBuf,
    bloom: BloomFilter,
    samples: Vec<(Vec<u8>, u64)>,
    stride: usize,
    /// Byte offset of the next entry (current data-section length).
    offset: u64,
    count: u64,
    prev_key: Option<Vec<u8>>,
    /// Offset of the most recent entry, so the final entry can be sampled.
    last_offset: u64,
    finished: bool,
}

impl SegmentWriter {
    /// Opens a writer targeting `path`.
    ///
    /// * `expected_entries` sizes the bloom filter; an upper bound is fine
    ///   (the realized false-positive rate only improves).
    /// * `stride` is the sparse-index sampling interval (≥ 1).
    /// * `fp_rate` is the bloom filter's target false-positive rate.
    ///
    /// # Panics
    ///
    /// Panics if `stride` is 0 or `fp_rate` is not in `(0, 1)`; both are
    /// validated at engine configuration time.
    pub fn create<P: AsRef<Path>>(
        path: P,
        expected_entries: usize,
        stride: usize,
        fp_rate: f64,
    ) -> Result<Self, SegmentError> {
        assert!(stride >= 1, "stride must be >= 1");

        let dest_path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&dest_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        Ok(Self {
            file: Some(BufWriter::new(file)),
            tmp_path,
            dest_path,
            bloom: BloomFilter::new(expected_entries.max(1), fp_rate),
            samples: Vec::new(),
            stride,
            offset: 0,
            count: 0,
            prev_key: None,
            last_offset: 0,
            finished: false,
        })
    }

    /// Appends one entry. Keys must arrive in strictly ascending order;
    /// duplicates are rejected along with regressions.
    pub fn add(&mut self, key: &[u8], entry: &Entry) -> Result<(), SegmentError> {
        if let Some(prev) = &self.prev_key {
            if prev.as_slice() >= key {
                return Err(SegmentError::unsorted(key));
            }
        }

        let file = self.file.as_mut().expect("writer already finished");
        format::write_entry(file, key, entry)?;

        self.bloom.insert(key);
        if self.count as usize % self.stride == 0 {
            self.samples.push((key.to_vec(), self.offset));
        }

        self.last_offset = self.offset;
        self.offset += format::encoded_len(key, entry);
        self.count += 1;
        self.prev_key = Some(key.to_vec());
        Ok(())
    }

    /// Number of entries appended so far.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.count
    }

    /// Writes the trailer and footer, fsyncs, and renames the file into
    /// place. Returns the number of entries written.
    ///
    /// With zero entries the temp file is removed and no segment is
    /// created.
    pub fn finish(mut self) -> Result<u64, SegmentError> {
        let mut file = self.file.take().expect("writer already finished");

        if self.count == 0 {
            drop(file);
            let _ = fs::remove_file(&self.tmp_path);
            self.finished = true;
            return Ok(0);
        }

        // The final entry is always sampled so scans near the tail stay
        // bounded; skip when the stride already caught it.
        if (self.count - 1) % self.stride as u64 != 0 {
            let last_key = self.prev_key.take().expect("count > 0 implies a key");
            self.samples.push((last_key, self.last_offset));
        }

        // Bloom and index sections are buffered so the footer can carry a
        // CRC32 of the exact bytes rebuilt into memory on open.
        let bloom_offset = self.offset;
        let mut trailer = Vec::with_capacity(self.bloom.serialized_size());
        self.bloom.write_to(&mut trailer)?;
        let index_offset = bloom_offset + trailer.len() as u64;
        let index = SparseIndex::from_samples(std::mem::take(&mut self.samples));
        index.write_to(&mut trailer)?;

        let mut hasher = Crc32::new();
        hasher.update(&trailer);
        let footer = Footer {
            bloom_offset,
            index_offset,
            entry_count: self.count,
            trailer_crc: hasher.finalize(),
        };

        file.write_all(&trailer)?;
        format::write_footer(&mut file, &footer)?;
        file.flush()?;
        file.get_ref().sync_all()?;
        drop(file);

        fs::rename(&self.tmp_path, &self.dest_path)?;
        self.finished = true;
        Ok(self.count)
    }

    /// Convenience wrapper for the flush path: streams a whole memtable
    /// (tombstones included) into a segment at `path`.
    pub fn write_from_memtable<P: AsRef<Path>>(
        path: P,
        mem: &Memtable,
        stride: usize,
        fp_rate: f64,
    ) -> Result<u64, SegmentError> {
        let mut writer = Self::create(path, mem.len(), stride, fp_rate)?;
        for (key, entry) in mem.iter() {
            writer.add(key, entry)?;
        }
        writer.finish()
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.file.take();
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// `segment-x.sst` → `segment-x.sst.tmp`, in the same directory so the
/// final rename is atomic.
fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}
