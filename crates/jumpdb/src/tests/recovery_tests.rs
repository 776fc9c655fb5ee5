use super::helpers::count_segment_files;
use crate::{Config, Engine, EngineError};
use anyhow::Result;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use tempfile::tempdir;

// --------------------- Close / reopen ---------------------

#[test]
fn reopen_preserves_all_writes() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        for i in 0..1000u32 {
            db.set(
                format!("key{:04}", i).into_bytes(),
                format!("val{:04}", i).into_bytes(),
            )?;
        }
        db.close()?;
    }

    let db = Engine::open(Config::new(dir.path()))?;
    for i in 0..1000u32 {
        let key = format!("key{:04}", i).into_bytes();
        let expect = format!("val{:04}", i).into_bytes();
        assert_eq!(db.get(&key)?, Some(expect), "key {}", i);
    }
    Ok(())
}

#[test]
fn reopen_preserves_deletes() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        for i in 0..1000u32 {
            db.set(format!("key{:04}", i).into_bytes(), b"v".to_vec())?;
        }
        db.close()?;
    }

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        for i in (0..1000u32).step_by(2) {
            db.delete(format!("key{:04}", i).into_bytes())?;
        }
        db.close()?;
    }

    let db = Engine::open(Config::new(dir.path()))?;
    for i in 0..1000u32 {
        let key = format!("key{:04}", i).into_bytes();
        if i % 2 == 0 {
            assert_eq!(db.get(&key)?, None, "key {} should stay deleted", i);
            assert!(!db.contains(&key)?);
        } else {
            assert_eq!(db.get(&key)?, Some(b"v".to_vec()), "key {}", i);
        }
    }
    Ok(())
}

#[test]
fn drop_flushes_memtable() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        db.set(b"drop_key".to_vec(), b"drop_val".to_vec())?;
        // Engine drops here without an explicit close.
    }

    let db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.get(b"drop_key")?, Some(b"drop_val".to_vec()));
    Ok(())
}

#[test]
fn reopen_preserves_newest_wins_across_segments() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        db.set(b"k".to_vec(), b"old".to_vec())?;
        db.flush()?;
        db.set(b"k".to_vec(), b"new".to_vec())?;
        db.flush()?;
        db.close()?;
    }

    let db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.segment_count(), 2);
    assert_eq!(db.get(b"k")?, Some(b"new".to_vec()));
    Ok(())
}

#[test]
fn reopen_after_compaction() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()).compaction_threshold(0))?;
        for i in 0..30u32 {
            db.set(format!("k{:04}", i).into_bytes(), b"val".to_vec())?;
            if i % 10 == 9 {
                db.flush()?;
            }
        }
        db.compact()?;
        assert_eq!(db.segment_count(), 1);
        db.close()?;
    }

    let db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.segment_count(), 1);
    for i in 0..30u32 {
        let key = format!("k{:04}", i).into_bytes();
        assert_eq!(db.get(&key)?, Some(b"val".to_vec()), "key {}", i);
    }
    Ok(())
}

#[test]
fn new_segments_after_reopen_continue_the_id_sequence() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        db.set(b"a".to_vec(), b"1".to_vec())?;
        db.close()?; // flushes segment 1
    }

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        db.set(b"a".to_vec(), b"2".to_vec())?;
        db.close()?; // must flush a segment newer than the existing one
    }

    let db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.segment_count(), 2);
    assert_eq!(db.get(b"a")?, Some(b"2".to_vec()));
    Ok(())
}

// --------------------- persist_segments = false ---------------------

#[test]
fn close_without_persistence_deletes_segment_files() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()).persist_segments(false))?;
        for i in 0..10u32 {
            db.set(format!("k{}", i).into_bytes(), b"v".to_vec())?;
        }
        db.flush()?;
        assert!(count_segment_files(dir.path()) >= 1);
        db.close()?;
    }

    assert_eq!(count_segment_files(dir.path()), 0);

    let db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.get(b"k0")?, None);
    Ok(())
}

#[test]
fn dropping_without_persistence_deletes_segment_files() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()).persist_segments(false))?;
        db.set(b"k".to_vec(), b"v".to_vec())?;
        db.flush()?;
    }

    assert_eq!(count_segment_files(dir.path()), 0);
    Ok(())
}

// --------------------- Directory hygiene ---------------------

#[test]
fn open_removes_leftover_tmp_files() -> Result<()> {
    let dir = tempdir()?;
    let stray = dir.path().join("segment-00000000000000000099.sst.tmp");
    std::fs::write(&stray, b"half-written")?;

    let _db = Engine::open(Config::new(dir.path()))?;
    assert!(!stray.exists());
    Ok(())
}

#[test]
fn open_ignores_foreign_files() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("notes.txt"), b"hello")?;
    std::fs::write(dir.path().join("weird.sst"), b"not-a-segment")?;

    let mut db = Engine::open(Config::new(dir.path()))?;
    assert_eq!(db.segment_count(), 0);

    db.set(b"k".to_vec(), b"v".to_vec())?;
    db.flush()?;
    assert_eq!(db.get(b"k")?, Some(b"v".to_vec()));
    Ok(())
}

#[test]
fn open_creates_missing_segment_dir() -> Result<()> {
    let dir = tempdir()?;
    let nested = dir.path().join("a").join("b");

    let mut db = Engine::open(Config::new(&nested))?;
    db.set(b"k".to_vec(), b"v".to_vec())?;
    db.flush()?;
    assert!(nested.is_dir());
    Ok(())
}

// --------------------- Corruption ---------------------

#[test]
fn open_fails_on_corrupt_segment() -> Result<()> {
    let dir = tempdir()?;

    {
        let mut db = Engine::open(Config::new(dir.path()))?;
        for i in 0..100u32 {
            db.set(format!("k{:04}", i).into_bytes(), b"v".to_vec())?;
        }
        db.close()?;
    }

    // Flip a byte inside the segment trailer.
    let path = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().map(|x| x == "sst").unwrap_or(false))
        .expect("one segment file");
    let len = std::fs::metadata(&path)?.len();
    let mut f = OpenOptions::new().read(true).write(true).open(&path)?;
    f.seek(SeekFrom::Start(len - 40))?;
    let mut byte = [0u8; 1];
    std::io::Read::read_exact(&mut f, &mut byte)?;
    f.seek(SeekFrom::Start(len - 40))?;
    f.write_all(&[byte[0] ^ 0xFF])?;
    drop(f);

    let err = Engine::open(Config::new(dir.path())).unwrap_err();
    assert!(matches!(err, EngineError::Corruption(_)));
    Ok(())
}
