//! In-memory storage

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{ReplayStorage, StreamReader, StreamWriter};
use crate::error::StorageError;

type SharedBuffer = Arc<RwLock<Vec<u8>>>;

/// Streams kept in shared memory buffers.
///
/// Cloning yields another handle to the same streams, so a recorder and a
/// player can share one store and the player sees frames as they are written.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    streams: Arc<Mutex<HashMap<String, SharedBuffer>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self, name: &str) -> Option<SharedBuffer> {
        self.streams.lock().ok()?.get(name).cloned()
    }

    /// Names of every stored stream, sorted
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .streams
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Copy of a stream's contents
    pub fn snapshot(&self, name: &str) -> Option<Vec<u8>> {
        let buffer = self.buffer(name)?;
        let data = buffer.read().ok()?;
        Some(data.clone())
    }

    /// Replace a stream's contents, creating it if needed
    pub fn put(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let mut streams = self
            .streams
            .lock()
            .map_err(|e| StorageError::write(name, e))?;
        streams.insert(name.to_string(), Arc::new(RwLock::new(bytes)));
        Ok(())
    }

    /// Delete a stream
    pub fn remove(&self, name: &str) -> bool {
        self.streams
            .lock()
            .map(|mut s| s.remove(name).is_some())
            .unwrap_or(false)
    }
}

impl ReplayStorage for MemoryStorage {
    fn open_for_write(&mut self, name: &str) -> Result<Box<dyn StreamWriter>, StorageError> {
        let buffer: SharedBuffer = Arc::new(RwLock::new(Vec::new()));
        let mut streams = self
            .streams
            .lock()
            .map_err(|e| StorageError::write(name, e))?;
        streams.insert(name.to_string(), buffer.clone());
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            buffer,
            written: 0,
        }))
    }

    fn open_for_read(&mut self, name: &str) -> Result<Box<dyn StreamReader>, StorageError> {
        let buffer = self
            .buffer(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(Box::new(MemoryReader {
            name: name.to_string(),
            buffer,
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.buffer(name).is_some()
    }
}

struct MemoryWriter {
    name: String,
    buffer: SharedBuffer,
    written: u64,
}

impl StreamWriter for MemoryWriter {
    fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut data = self
            .buffer
            .write()
            .map_err(|e| StorageError::write(&self.name, e))?;
        data.extend_from_slice(bytes);
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.written
    }
}

struct MemoryReader {
    name: String,
    buffer: SharedBuffer,
}

impl StreamReader for MemoryReader {
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, StorageError> {
        let data = self
            .buffer
            .read()
            .map_err(|e| StorageError::read(&self.name, e))?;
        let start = (offset as usize).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn len(&mut self) -> Result<u64, StorageError> {
        let data = self
            .buffer
            .read()
            .map_err(|e| StorageError::read(&self.name, e))?;
        Ok(data.len() as u64)
    }
}
