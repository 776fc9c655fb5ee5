/// Read path: `get()` and `contains()`.
///
/// Lookup order is memtable first, then segments newest to oldest. The
/// first authoritative answer wins: a value resolves the lookup, and a
/// tombstone resolves it to not-found without probing older segments.
use sstable::Lookup;

use crate::error::Result;
use crate::Engine;

impl Engine {
    /// Returns the current value for `key`, or `None` when the key has no
    /// live value. Absence is not an error.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        if let Some(entry) = self.mem.get(key) {
            return Ok(entry.value().map(|v| v.to_vec()));
        }

        for segment in self.registry.iter() {
            match segment.get(key)? {
                Lookup::Found(value) => return Ok(Some(value)),
                Lookup::Tombstone => return Ok(None),
                Lookup::NotFound => continue,
            }
        }

        Ok(None)
    }

    /// Whether `key` has a live value.
    ///
    /// Stops at the first hit: a value in some layer means `true` without
    /// reading the value's older history, a tombstone means `false`
    /// without probing older segments at all.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;

        if let Some(entry) = self.mem.get(key) {
            return Ok(!entry.is_tombstone());
        }

        for segment in self.registry.iter() {
            match segment.get(key)? {
                Lookup::Found(_) => return Ok(true),
                Lookup::Tombstone => return Ok(false),
                Lookup::NotFound => continue,
            }
        }

        Ok(false)
    }
}
