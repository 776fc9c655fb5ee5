use bloom::BloomFilter;
use crc32fast::Hasher as Crc32;
use memtable::Entry;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::{self, Footer, FOOTER_BYTES};
use crate::index::SparseIndex;
use crate::SegmentError;

/// Result of a single-segment point lookup.
///
/// `Tombstone` is authoritative: the key was deleted at this segment's
/// point in history and older segments must not be consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<u8>),
    Tombstone,
    NotFound,
}

/// An open, immutable segment: bloom filter and sparse index in memory,
/// data on disk behind a persistent file handle.
///
/// [`open`](Segment::open) validates the footer, checks the trailer CRC,
/// and loads the bloom and index sections. Lookups then cost a bloom
/// probe, an index binary search, and a scan of at most `stride` entries.
///
/// The file handle is wrapped in a `Mutex` so `get` works through `&self`;
/// the file itself is never written after open.
pub struct Segment {
    /// Monotonic creation id; larger ids are newer.
    id: u64,
    path: PathBuf,
    bloom: BloomFilter,
    index: SparseIndex,
    entry_count: u64,
    /// End of the data section (= bloom section start).
    data_end: u64,
    file: Mutex<BufReader<File>>,
}

impl Segment {
    /// Opens the segment file at `path` and loads its in-memory metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Corrupt`] when the footer magic or offsets
    /// are invalid or the trailer CRC does not match, and
    /// [`SegmentError::Io`] for plain I/O failures.
    pub fn open<P: AsRef<Path>>(path: P, id: u64) -> Result<Self, SegmentError> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;

        let (footer, filesize) = format::read_footer(&mut f)?;
        let Footer {
            bloom_offset,
            index_offset,
            entry_count,
            trailer_crc,
        } = footer;

        // Read the whole trailer at once and verify it before parsing.
        let trailer_len = (filesize - FOOTER_BYTES - bloom_offset) as usize;
        f.seek(SeekFrom::Start(bloom_offset))?;
        let mut trailer = vec![0u8; trailer_len];
        f.read_exact(&mut trailer)?;

        let mut hasher = Crc32::new();
        hasher.update(&trailer);
        let actual_crc = hasher.finalize();
        if actual_crc != trailer_crc {
            return Err(SegmentError::corrupt(format!(
                "trailer CRC mismatch: expected {:#010x}, got {:#010x}",
                trailer_crc, actual_crc
            )));
        }

        let bloom_len = (index_offset - bloom_offset) as usize;
        let bloom = BloomFilter::read_from(&mut &trailer[..bloom_len])?;
        let index = SparseIndex::from_bytes(&trailer[bloom_len..])?;

        if entry_count > 0 && index.is_empty() {
            return Err(SegmentError::corrupt("non-empty segment without index"));
        }

        f.seek(SeekFrom::Start(0))?;
        Ok(Self {
            id,
            path,
            bloom,
            index,
            entry_count,
            data_end: bloom_offset,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Point lookup.
    ///
    /// 1. Bloom filter: a negative answer is definitive, no I/O happens.
    /// 2. Sparse index: greatest sample ≤ key. A key below the first
    ///    sample cannot be present (the first entry is always sampled).
    /// 3. Forward scan from the sample offset, ending on an exact match, a
    ///    strictly greater key, the next sample's offset, or the end of
    ///    the data section.
    pub fn get(&self, key: &[u8]) -> Result<Lookup, SegmentError> {
        if !self.bloom.may_contain(key) {
            return Ok(Lookup::NotFound);
        }

        let pos = match self.index.floor(key) {
            Some(pos) => pos,
            None => return Ok(Lookup::NotFound),
        };
        let start = self.index.offset(pos);
        let bound = self.index.scan_bound(pos, self.data_end);

        let mut file = self
            .file
            .lock()
            .map_err(|_| SegmentError::corrupt("segment file lock poisoned"))?;
        file.seek(SeekFrom::Start(start))?;

        let mut at = start;
        while at < bound {
            let (entry_key, entry) = format::read_entry(&mut *file)?;
            at += format::encoded_len(&entry_key, &entry);

            match entry_key.as_slice().cmp(key) {
                Ordering::Equal => {
                    return Ok(match entry {
                        Entry::Value(v) => Lookup::Found(v),
                        Entry::Tombstone => Lookup::Tombstone,
                    });
                }
                Ordering::Greater => return Ok(Lookup::NotFound),
                Ordering::Less => {}
            }
        }

        Ok(Lookup::NotFound)
    }

    /// Streams the data section in key order on a fresh file handle, so a
    /// long merge never contends with point lookups.
    pub fn iter(&self) -> Result<SegmentIter, SegmentError> {
        let file = File::open(&self.path)?;
        Ok(SegmentIter {
            file: BufReader::new(file),
            pos: 0,
            data_end: self.data_end,
        })
    }

    /// Monotonic creation id (larger = newer).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the data section, tombstones included.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Number of sparse-index samples held in memory.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("entries", &self.entry_count)
            .field("index_samples", &self.index.len())
            .finish()
    }
}

/// Cursor over one segment's data section, yielding entries in ascending
/// key order. Used by the compaction merge.
pub struct SegmentIter {
    file: BufReader<File>,
    pos: u64,
    data_end: u64,
}

impl SegmentIter {
    /// Returns the next entry, or `None` at the end of the data section.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Entry)>, SegmentError> {
        if self.pos >= self.data_end {
            return Ok(None);
        }
        let (key, entry) = format::read_entry(&mut self.file)?;
        self.pos += format::encoded_len(&key, &entry);
        if self.pos > self.data_end {
            return Err(SegmentError::corrupt(
                "entry extends past the data section",
            ));
        }
        Ok(Some((key, entry)))
    }
}
