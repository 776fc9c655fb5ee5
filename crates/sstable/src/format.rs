use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memtable::Entry;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::SegmentError;

/// Magic identifying a JumpDB segment, "JDB1".
pub const SEGMENT_MAGIC: u32 = 0x4A44_4231;

/// `value_len` sentinel marking a tombstone entry. No value bytes follow.
pub const TOMBSTONE_VALUE_LEN: u32 = 0xFFFF_FFFF;

/// Footer size: bloom_offset + index_offset + entry_count + crc + magic.
pub const FOOTER_BYTES: u64 = 8 + 8 + 8 + 4 + 4;

/// Maximum key size accepted when decoding (64 KiB). Prevents OOM on
/// corrupt files.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size accepted when decoding (10 MiB).
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Parsed segment footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    /// Start of the bloom section; also the end of the data section.
    pub bloom_offset: u64,
    /// Start of the sparse index section.
    pub index_offset: u64,
    /// Number of entries in the data section.
    pub entry_count: u64,
    /// CRC32 over the bloom and index sections.
    pub trailer_crc: u32,
}

/// Appends the footer to `w`.
pub fn write_footer<W: Write>(w: &mut W, footer: &Footer) -> io::Result<()> {
    w.write_u64::<LittleEndian>(footer.bloom_offset)?;
    w.write_u64::<LittleEndian>(footer.index_offset)?;
    w.write_u64::<LittleEndian>(footer.entry_count)?;
    w.write_u32::<LittleEndian>(footer.trailer_crc)?;
    w.write_u32::<LittleEndian>(SEGMENT_MAGIC)?;
    Ok(())
}

/// Reads and validates the footer from the end of `r`, returning it along
/// with the total file size.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> Result<(Footer, u64), SegmentError> {
    let filesize = r.seek(SeekFrom::End(0))?;
    if filesize < FOOTER_BYTES {
        return Err(SegmentError::corrupt("file too small to hold a footer"));
    }

    r.seek(SeekFrom::Start(filesize - FOOTER_BYTES))?;
    let bloom_offset = r.read_u64::<LittleEndian>()?;
    let index_offset = r.read_u64::<LittleEndian>()?;
    let entry_count = r.read_u64::<LittleEndian>()?;
    let trailer_crc = r.read_u32::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;

    if magic != SEGMENT_MAGIC {
        return Err(SegmentError::corrupt(format!(
            "bad magic {:#010x} (expected {:#010x})",
            magic, SEGMENT_MAGIC
        )));
    }
    if bloom_offset > index_offset || index_offset > filesize - FOOTER_BYTES {
        return Err(SegmentError::corrupt(format!(
            "inconsistent section offsets: bloom {} index {} file {}",
            bloom_offset, index_offset, filesize
        )));
    }

    Ok((
        Footer {
            bloom_offset,
            index_offset,
            entry_count,
            trailer_crc,
        },
        filesize,
    ))
}

/// Encodes one entry: `key_len | value_len | key | value`, with
/// [`TOMBSTONE_VALUE_LEN`] signalling a tombstone (no value bytes).
pub fn write_entry<W: Write>(w: &mut W, key: &[u8], entry: &Entry) -> io::Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("key length {} out of range", key.len()),
        ));
    }

    w.write_u32::<LittleEndian>(key.len() as u32)?;
    match entry {
        Entry::Value(v) => {
            if v.len() > MAX_VALUE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("value length {} out of range", v.len()),
                ));
            }
            w.write_u32::<LittleEndian>(v.len() as u32)?;
            w.write_all(key)?;
            w.write_all(v)?;
        }
        Entry::Tombstone => {
            w.write_u32::<LittleEndian>(TOMBSTONE_VALUE_LEN)?;
            w.write_all(key)?;
        }
    }
    Ok(())
}

/// Number of bytes [`write_entry`] produces for this entry.
pub fn encoded_len(key: &[u8], entry: &Entry) -> u64 {
    let value_len = match entry {
        Entry::Value(v) => v.len() as u64,
        Entry::Tombstone => 0,
    };
    4 + 4 + key.len() as u64 + value_len
}

/// Decodes one entry from the data section.
pub fn read_entry<R: Read>(r: &mut R) -> Result<(Vec<u8>, Entry), SegmentError> {
    let key_len = r.read_u32::<LittleEndian>()? as usize;
    if key_len == 0 || key_len > MAX_KEY_BYTES {
        return Err(SegmentError::corrupt(format!(
            "entry key_len {} out of range",
            key_len
        )));
    }
    let value_len = r.read_u32::<LittleEndian>()?;

    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;

    if value_len == TOMBSTONE_VALUE_LEN {
        return Ok((key, Entry::Tombstone));
    }

    let value_len = value_len as usize;
    if value_len > MAX_VALUE_BYTES {
        return Err(SegmentError::corrupt(format!(
            "entry value_len {} out of range",
            value_len
        )));
    }
    let mut value = vec![0u8; value_len];
    r.read_exact(&mut value)?;
    Ok((key, Entry::Value(value)))
}
