use super::build_segment;
use crate::format::FOOTER_BYTES;
use crate::{SegmentError, SegmentWriter, SEGMENT_MAGIC, TOMBSTONE_VALUE_LEN};
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use memtable::{Entry, Memtable};
use std::io::{Read, Seek, SeekFrom};
use tempfile::tempdir;

fn sample_memtable() -> Memtable {
    let mut m = Memtable::new();
    m.insert(b"a".to_vec(), b"apple".to_vec());
    m.insert(b"b".to_vec(), b"banana".to_vec());
    m.insert(b"c".to_vec(), Vec::new()); // present but empty value
    m.insert_tombstone(b"d".to_vec());
    m
}

// -------------------- File layout --------------------

#[test]
fn footer_carries_magic_and_offsets() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");

    let written = SegmentWriter::write_from_memtable(&path, &sample_memtable(), 2, 0.01)?;
    assert_eq!(written, 4);

    let mut f = std::fs::File::open(&path)?;
    let filesize = f.metadata()?.len();
    assert!(filesize > FOOTER_BYTES);

    f.seek(SeekFrom::Start(filesize - FOOTER_BYTES))?;
    let bloom_offset = f.read_u64::<LittleEndian>()?;
    let index_offset = f.read_u64::<LittleEndian>()?;
    let entry_count = f.read_u64::<LittleEndian>()?;
    let _crc = f.read_u32::<LittleEndian>()?;
    let magic = f.read_u32::<LittleEndian>()?;

    assert_eq!(magic, SEGMENT_MAGIC);
    assert_eq!(entry_count, 4);
    assert!(bloom_offset < index_offset);
    assert!(index_offset < filesize - FOOTER_BYTES);
    Ok(())
}

#[test]
fn data_section_is_bit_exact() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");

    let mut writer = SegmentWriter::create(&path, 2, 100, 0.01)?;
    writer.add(b"hi", &Entry::Value(b"you".to_vec()))?;
    writer.add(b"zz", &Entry::Tombstone)?;
    writer.finish()?;

    let mut f = std::fs::File::open(&path)?;

    // entry 0: key_len=2 | value_len=3 | "hi" | "you"
    assert_eq!(f.read_u32::<LittleEndian>()?, 2);
    assert_eq!(f.read_u32::<LittleEndian>()?, 3);
    let mut buf = [0u8; 5];
    f.read_exact(&mut buf)?;
    assert_eq!(&buf, b"hiyou");

    // entry 1: key_len=2 | value_len=sentinel | "zz", no value bytes
    assert_eq!(f.read_u32::<LittleEndian>()?, 2);
    assert_eq!(f.read_u32::<LittleEndian>()?, TOMBSTONE_VALUE_LEN);
    let mut key = [0u8; 2];
    f.read_exact(&mut key)?;
    assert_eq!(&key, b"zz");
    Ok(())
}

#[test]
fn no_tmp_file_left_behind() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");
    SegmentWriter::write_from_memtable(&path, &sample_memtable(), 2, 0.01)?;

    let names: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["test.sst".to_string()]);
    Ok(())
}

#[test]
fn dropped_writer_removes_tmp_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");

    {
        let mut writer = SegmentWriter::create(&path, 4, 2, 0.01)?;
        writer.add(b"a", &Entry::Value(b"1".to_vec()))?;
        // dropped without finish()
    }

    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

// -------------------- Empty output --------------------

#[test]
fn finish_with_no_entries_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("empty.sst");

    let writer = SegmentWriter::create(&path, 1, 100, 0.01)?;
    assert_eq!(writer.finish()?, 0);

    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

// -------------------- Input ordering --------------------

#[test]
fn rejects_unsorted_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut writer = SegmentWriter::create(dir.path().join("x.sst"), 2, 100, 0.01)?;
    writer.add(b"m", &Entry::Value(b"1".to_vec()))?;

    let err = writer.add(b"a", &Entry::Value(b"2".to_vec())).unwrap_err();
    assert!(matches!(err, SegmentError::Unsorted { .. }));
    Ok(())
}

#[test]
fn rejects_duplicate_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut writer = SegmentWriter::create(dir.path().join("x.sst"), 2, 100, 0.01)?;
    writer.add(b"m", &Entry::Value(b"1".to_vec()))?;

    let err = writer.add(b"m", &Entry::Value(b"2".to_vec())).unwrap_err();
    assert!(matches!(err, SegmentError::Unsorted { .. }));
    Ok(())
}

// -------------------- Sparse sampling --------------------

#[test]
fn samples_every_stride_plus_last() -> Result<()> {
    let dir = tempdir()?;
    let entries: Vec<(Vec<u8>, Option<Vec<u8>>)> = (0..10u32)
        .map(|i| (format!("k{:02}", i).into_bytes(), Some(b"v".to_vec())))
        .collect();
    let borrowed: Vec<(&[u8], Option<&[u8]>)> = entries
        .iter()
        .map(|(k, v)| (k.as_slice(), v.as_deref()))
        .collect();

    // 10 entries, stride 4: samples at ordinals 0, 4, 8, plus the last (9).
    let seg = build_segment(dir.path(), "s.sst", 1, 4, &borrowed)?;
    assert_eq!(seg.index_len(), 4);

    // 9 entries, stride 4: ordinals 0, 4, 8 — the last is already sampled.
    let seg = build_segment(dir.path(), "s2.sst", 2, 4, &borrowed[..9])?;
    assert_eq!(seg.index_len(), 3);

    // stride 1 samples everything.
    let seg = build_segment(dir.path(), "s3.sst", 3, 1, &borrowed)?;
    assert_eq!(seg.index_len(), 10);
    Ok(())
}

#[test]
fn single_entry_segment_has_one_sample() -> Result<()> {
    let dir = tempdir()?;
    let seg = build_segment(dir.path(), "one.sst", 1, 100, &[(b"k", Some(b"v"))])?;
    assert_eq!(seg.index_len(), 1);
    assert_eq!(seg.entry_count(), 1);
    Ok(())
}
