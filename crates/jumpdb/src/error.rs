use sstable::SegmentError;
use std::io;
use thiserror::Error;

/// Errors surfaced by the engine façade.
///
/// A missing key is **not** an error: `get` returns `Ok(None)` and
/// `contains` returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller passed a malformed key or value (empty key, size cap
    /// exceeded, invalid configuration).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// An I/O or file-system failure while writing or reading segments.
    #[error("storage error: {0}")]
    Storage(#[source] io::Error),

    /// A segment file failed validation: bad magic, impossible offsets, or
    /// a checksum mismatch. Only the affected operation fails; other
    /// segments keep serving.
    #[error("corrupt segment: {0}")]
    Corruption(String),

    /// The engine was used after `close`.
    #[error("engine is closed")]
    Closed,
}

impl EngineError {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        EngineError::Argument(msg.into())
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Storage(e)
    }
}

impl From<SegmentError> for EngineError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::Io(io) => EngineError::Storage(io),
            SegmentError::Corrupt(msg) => EngineError::Corruption(msg),
            // The flush and compaction paths feed the writer from ordered
            // iterators, so unsorted input means a broken invariant, not a
            // caller mistake.
            SegmentError::Unsorted { key } => {
                EngineError::Corruption(format!("unsorted segment input at key {:?}", key))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
