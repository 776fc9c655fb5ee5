//! Cold-start path: rebuilding the segment registry from `segment_dir`.
//!
//! Every segment's bloom filter and sparse index live in its file trailer,
//! so open is a footer read plus a trailer read per segment — no data-section
//! scan. The memtable always starts empty (there is no write-ahead log;
//! unflushed writes do not survive a crash, by design of the format).

use sstable::Segment;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::registry::parse_segment_file_name;

/// Removes leftover `.sst.tmp` files from an interrupted flush or
/// compaction. Those files were never renamed into place, so they hold no
/// registered data.
pub(crate) fn cleanup_tmp_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(".sst.tmp") {
                    log::debug!("removing leftover temp file {}", name);
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }
}

/// Scans `dir` for `segment-<id>.sst` files and opens them newest first.
/// Returns the segments and the next free segment id.
///
/// Files that do not match the naming scheme are skipped with a warning;
/// a matching file that fails to open is an error (the caller cannot know
/// which keys it holds, so serving without it would silently lose data).
pub(crate) fn load_segments(dir: &Path) -> Result<(Vec<Segment>, u64)> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if !name.ends_with(".sst") {
            continue;
        }
        match parse_segment_file_name(name) {
            Some(id) => found.push((id, path)),
            None => log::warn!("skipping unrecognized file {} in segment dir", name),
        }
    }

    // Newest first; descending id is the registry's invariant.
    found.sort_by(|a, b| b.0.cmp(&a.0));
    let next_id = found.first().map(|(id, _)| id + 1).unwrap_or(1);

    let mut segments = Vec::with_capacity(found.len());
    for (id, path) in found {
        let segment = Segment::open(&path, id)?;
        log::trace!("recovered segment {} ({} entries)", id, segment.entry_count());
        segments.push(segment);
    }

    Ok((segments, next_id))
}
