//! Storage collaborators
//!
//! A recording is a handful of append-only byte streams named after the
//! session (see [`StreamKind`]). The driver only talks to storage through
//! [`ReplayStorage`], so recordings can live in memory, on disk or behind
//! any other byte store.
//!
//! # Implementations
//!
//! - [`MemoryStorage`]: shared in-process buffers; readers see appends live
//! - [`DirectoryStorage`]: one file per stream under a root directory

mod directory;
mod memory;
mod stream;

pub use directory::DirectoryStorage;
pub use memory::MemoryStorage;
pub use stream::{
    CheckpointStream, EventStream, ExternalStream, FrameStream, LocatedCheckpoint, StreamRead,
    UnitStream,
};

use crate::error::StorageError;

/// Append side of one stream
pub trait StreamWriter: Send {
    /// Append bytes at the end of the stream
    fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Push buffered bytes to the backing store
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Bytes written so far
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random-access read side of one stream
pub trait StreamReader: Send {
    /// Read up to `len` bytes at `offset`; returns fewer at the end of the stream
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, StorageError>;

    /// Current stream length. May grow while the stream is being recorded.
    fn len(&mut self) -> Result<u64, StorageError>;

    /// Read the whole stream
    fn read_all(&mut self) -> Result<Vec<u8>, StorageError> {
        let len = self.len()?;
        self.read_at(0, len as usize)
    }
}

/// Byte store holding named streams
pub trait ReplayStorage: Send {
    /// Create (or truncate) a stream for writing
    fn open_for_write(&mut self, name: &str) -> Result<Box<dyn StreamWriter>, StorageError>;

    /// Open an existing stream for reading
    fn open_for_read(&mut self, name: &str) -> Result<Box<dyn StreamReader>, StorageError>;

    /// Whether a stream with this name exists
    fn exists(&self, name: &str) -> bool;
}

/// The streams that make up one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Header,
    Frames,
    External,
    Checkpoints,
    Events,
    Metadata,
}

impl StreamKind {
    pub const ALL: [StreamKind; 6] = [
        StreamKind::Header,
        StreamKind::Frames,
        StreamKind::External,
        StreamKind::Checkpoints,
        StreamKind::Events,
        StreamKind::Metadata,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            StreamKind::Header => "header",
            StreamKind::Frames => "frames",
            StreamKind::External => "external",
            StreamKind::Checkpoints => "checkpoints",
            StreamKind::Events => "events",
            StreamKind::Metadata => "meta",
        }
    }

    /// Full stream name for a session, e.g. `match_01.frames`
    pub fn stream_name(&self, session: &str) -> String {
        format!("{}.{}", session, self.suffix())
    }
}
