//! File-backed storage

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{ReplayStorage, StreamReader, StreamWriter};
use crate::config::default_recordings_dir;
use crate::error::{DemoError, Result, StorageError};

/// One file per stream under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    /// Use `root`, creating it if it doesn't exist
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                DemoError::from(e).with_context(format!("Failed to create {:?}", root))
            })?;
        }
        Ok(Self { root })
    }

    /// Use the platform recordings directory
    pub fn open_default() -> Result<Self> {
        let root = default_recordings_dir().ok_or_else(|| {
            DemoError::Config("Could not determine recordings directory".to_string())
        })?;
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Session names that have a header stream, sorted
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("header") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    sessions.push(stem.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}

impl ReplayStorage for DirectoryStorage {
    fn open_for_write(&mut self, name: &str) -> std::result::Result<Box<dyn StreamWriter>, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path_for(name))
            .map_err(|e| StorageError::write(name, e))?;
        Ok(Box::new(FileWriter {
            name: name.to_string(),
            file,
            written: 0,
        }))
    }

    fn open_for_read(&mut self, name: &str) -> std::result::Result<Box<dyn StreamReader>, StorageError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let file = File::open(&path).map_err(|e| StorageError::read(name, e))?;
        Ok(Box::new(FileReader {
            name: name.to_string(),
            file,
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }
}

/// Unbuffered so a concurrent reader sees every completed append.
struct FileWriter {
    name: String,
    file: File,
    written: u64,
}

impl StreamWriter for FileWriter {
    fn append(&mut self, bytes: &[u8]) -> std::result::Result<(), StorageError> {
        self.file
            .write_all(bytes)
            .map_err(|e| StorageError::write(&self.name, e))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), StorageError> {
        self.file
            .sync_data()
            .map_err(|e| StorageError::write(&self.name, e))
    }

    fn len(&self) -> u64 {
        self.written
    }
}

struct FileReader {
    name: String,
    file: File,
}

impl StreamReader for FileReader {
    fn read_at(&mut self, offset: u64, len: usize) -> std::result::Result<Vec<u8>, StorageError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::read(&self.name, e))?;
        let mut out = Vec::with_capacity(len.min(1 << 20));
        (&mut self.file)
            .take(len as u64)
            .read_to_end(&mut out)
            .map_err(|e| StorageError::read(&self.name, e))?;
        Ok(out)
    }

    fn len(&mut self) -> std::result::Result<u64, StorageError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| StorageError::read(&self.name, e))
    }
}
