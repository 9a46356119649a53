//! Error handling for netdemo-rs
//!
//! Errors are grouped by the layer that raises them:
//!
//! - [`FormatError`]: the byte-level codec rejected a header, frame or record
//! - [`CheckpointError`]: a checkpoint could not be selected or restored
//! - [`StorageError`]: the storage collaborator failed to open, read or write
//! - [`StateError`]: an operation was issued in the wrong driver state
//!
//! [`DemoError`] wraps all of them so driver-level calls can use `?` freely.

use thiserror::Error;

/// Byte-level decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Stream did not start with the expected magic number
    #[error("Bad magic: expected 0x{expected:08X}, found 0x{found:08X}")]
    BadMagic { expected: u32, found: u32 },

    /// Stream was written with an unsupported format version
    #[error("Unsupported format version {found} (expected {expected})")]
    BadVersion { expected: u32, found: u32 },

    /// Contents are structurally invalid
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Not enough bytes yet; the caller may retry once more data arrives
    #[error("Truncated data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Header is valid but does not match the running build
    #[error("Incompatible recording: {0}")]
    Incompatible(String),

    /// Refused to write something the decoder would reject
    #[error("{what} is {len} bytes, limit is {limit}")]
    Oversized {
        what: String,
        len: usize,
        limit: usize,
    },
}

impl FormatError {
    /// Whether more data could turn this failure into a success
    pub fn is_truncated(&self) -> bool {
        matches!(self, FormatError::Truncated { .. })
    }
}

/// Checkpoint selection and restore failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckpointError {
    /// The checkpoint was still being written when a load was attempted
    #[error("Checkpoint taken at {taken_at:.3}s is not complete")]
    IncompleteAtLoad { taken_at: f64 },

    /// The consumer (or the record) refused the restore
    #[error("Checkpoint restore failed: {0}")]
    RestoreFailed(String),

    /// No checkpoint matched the request
    #[error("No checkpoint available for {0}")]
    NotFound(String),
}

/// Storage collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Stream does not exist
    #[error("Stream not found: {0}")]
    NotFound(String),

    /// Append or flush failed
    #[error("Write to stream '{stream}' failed: {message}")]
    WriteFailed { stream: String, message: String },

    /// Read failed
    #[error("Read from stream '{stream}' failed: {message}")]
    ReadFailed { stream: String, message: String },
}

impl StorageError {
    pub(crate) fn write(stream: &str, err: impl std::fmt::Display) -> Self {
        StorageError::WriteFailed {
            stream: stream.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn read(stream: &str, err: impl std::fmt::Display) -> Self {
        StorageError::ReadFailed {
            stream: stream.to_string(),
            message: err.to_string(),
        }
    }
}

/// Operations issued in the wrong driver state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Requires an open recording or playback session
    #[error("No active session")]
    NoActiveSession,

    /// Conflicts with work that is already running
    #[error("Task conflict: {0}")]
    TaskConflict(String),

    /// A session is already open
    #[error("A {0} session is already active")]
    AlreadyActive(&'static str),
}

/// Main error type for netdemo-rs operations
#[derive(Error, Debug)]
pub enum DemoError {
    /// Codec errors
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Driver state errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DemoError>,
    },
}

impl DemoError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DemoError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any context layers
    pub fn root(&self) -> &DemoError {
        match self {
            DemoError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the root cause is a truncated (possibly still growing) stream
    pub fn is_truncated(&self) -> bool {
        matches!(self.root(), DemoError::Format(e) if e.is_truncated())
    }
}

/// Result type alias for netdemo-rs operations
pub type Result<T> = std::result::Result<T, DemoError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DemoError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
