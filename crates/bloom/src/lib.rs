//! # Bloom Filter
//!
//! A space-efficient probabilistic membership test used by JumpDB segments.
//!
//! A bloom filter answers "is this key in the set?" with either a definitive
//! **no** or a probabilistic **maybe**. There are no false negatives, so a
//! negative answer lets the engine skip a segment without touching its sparse
//! index or the data file. False positives are resolved by the segment's
//! bounded scan.
//!
//! ## Usage in JumpDB
//!
//! The segment writer inserts every key it emits — including tombstones,
//! which must stay discoverable so they can shadow older segments — and
//! serializes the filter into the segment trailer. The reader deserializes it
//! on segment open and consults it before every lookup.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01);
//! bf.insert(b"hello");
//! assert!(bf.may_contain(b"hello"));
//! ```

use std::io::{self, Read, Write};

/// Upper bound on a deserialized filter (128 MiB of bit words). Guards
/// against allocating absurd buffers when a segment trailer is corrupt.
const MAX_FILTER_BYTES: usize = 128 * 1024 * 1024;

/// A bloom filter over a `u64` word array with `k` derived hash positions.
///
/// Bit positions use double hashing: `pos(i) = h1 + i * h2 (mod m)`, with
/// `h1` an FNV-1a hash of the key and `h2` obtained by remixing `h1`
/// (forced odd so the probe sequence never collapses onto one bit).
pub struct BloomFilter {
    words: Vec<u64>,
    /// Number of addressable bits (`m`). At most `64 * words.len()`.
    num_bits: u64,
    /// Number of probe positions per key (`k`).
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` at the target
    /// `false_positive_rate`, using the standard formulas
    /// `m = -n ln(p) / ln(2)^2` and `k = (m/n) ln(2)`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in
    /// `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / (std::f64::consts::LN_2 * std::f64::consts::LN_2))
            .ceil() as u64;
        let m = m.max(64);

        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;
        let k = k.max(1);

        let word_len = ((m + 63) / 64) as usize;

        Self {
            words: vec![0u64; word_len],
            num_bits: m,
            num_hashes: k,
        }
    }

    /// Inserts a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = self.probe(h1, h2, i);
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// Returns `false` if the key is **definitely not** in the set, `true`
    /// if it **might** be.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = self.probe(h1, h2, i);
            if self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Returns the number of addressable bits (`m`).
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Returns the number of probe positions per key (`k`).
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the exact byte length produced by [`write_to`](Self::write_to).
    ///
    /// Layout: `num_bits(u64) + num_hashes(u32) + words_len(u32) + words`.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 4 + 4 + self.words.len() * 8
    }

    /// Serializes the filter.
    ///
    /// Wire format (all little-endian):
    /// ```text
    /// [num_bits: u64][num_hashes: u32][words_len: u32][words: u64 each]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.num_bits.to_le_bytes())?;
        w.write_all(&self.num_hashes.to_le_bytes())?;
        w.write_all(&(self.words.len() as u32).to_le_bytes())?;
        for word in &self.words {
            w.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Deserializes a filter previously written with
    /// [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];
        let mut buf4 = [0u8; 4];

        r.read_exact(&mut buf8)?;
        let num_bits = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let num_hashes = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let words_len = u32::from_le_bytes(buf4) as usize;

        if words_len.saturating_mul(8) > MAX_FILTER_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} words", words_len),
            ));
        }
        if num_bits == 0 || num_bits > (words_len as u64) * 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter num_bits {} exceeds word capacity", num_bits),
            ));
        }

        let mut words = vec![0u64; words_len];
        for word in &mut words {
            r.read_exact(&mut buf8)?;
            *word = u64::from_le_bytes(buf8);
        }

        Ok(Self {
            words,
            num_bits,
            num_hashes,
        })
    }

    fn probe(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("words", &self.words.len())
            .finish()
    }
}

/// Derives the two base hashes for double hashing: FNV-1a for `h1`, a
/// splitmix64 remix of it for `h2`. `h2` is forced odd so that repeated
/// probes always advance.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    let h1 = fnv1a_64(key);
    let h2 = splitmix64(h1) | 1;
    (h1, h2)
}

fn fnv1a_64(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x00000100000001b3;
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}
