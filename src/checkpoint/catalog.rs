//! Index of stored checkpoints

use std::collections::BTreeSet;

use super::{AckState, Checkpoint};
use crate::codec::CheckpointRecord;
use crate::error::{CheckpointError, DemoError, Result};
use crate::storage::{CheckpointStream, LocatedCheckpoint, StreamRead};

/// One catalogued checkpoint and where to resume from it
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub checkpoint: Checkpoint,
    pub frame_offset: u64,
    pub external_offset: u64,
    /// Byte offset of the record in the checkpoint stream
    pub record_offset: u64,
    pub record_len: u64,
}

impl CatalogEntry {
    /// Entry for a record that was fully written
    pub fn from_record(record: &CheckpointRecord, record_offset: u64, record_len: u64) -> Self {
        Self {
            checkpoint: Checkpoint {
                taken_at_seconds: record.taken_at_seconds,
                ack_state: AckState::Complete,
                saved_object_set: record.objects.keys().copied().collect::<BTreeSet<_>>(),
            },
            frame_offset: record.frame_offset,
            external_offset: record.external_offset,
            record_offset,
            record_len,
        }
    }

    #[inline]
    pub fn taken_at(&self) -> f64 {
        self.checkpoint.taken_at_seconds
    }
}

impl From<LocatedCheckpoint> for CatalogEntry {
    fn from(located: LocatedCheckpoint) -> Self {
        Self::from_record(&located.record, located.offset, located.len)
    }
}

/// Checkpoints ordered by time
#[derive(Debug, Clone, Default)]
pub struct CheckpointCatalog {
    entries: Vec<CatalogEntry>,
}

impl CheckpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Time of the newest complete checkpoint
    pub fn latest_time(&self) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.checkpoint.is_complete())
            .map(CatalogEntry::taken_at)
    }

    /// Add an entry, keeping time order (ties stay in insertion order)
    pub fn insert(&mut self, entry: CatalogEntry) {
        let t = entry.taken_at();
        let index = self.entries.partition_point(|e| e.taken_at() <= t);
        self.entries.insert(index, entry);
    }

    /// Latest complete checkpoint taken at or before `seconds`
    pub fn select_checkpoint(&self, seconds: f64) -> Option<&CatalogEntry> {
        let end = self.entries.partition_point(|e| e.taken_at() <= seconds);
        self.entries[..end]
            .iter()
            .rev()
            .find(|e| e.checkpoint.is_complete())
    }

    /// Pick up records appended since the last scan.
    ///
    /// Stops at a partially written record; corrupt records are logged and skipped.
    pub fn refresh(&mut self, stream: &mut CheckpointStream) -> Result<usize> {
        let mut added = 0;
        loop {
            let before = stream.offset();
            match stream.next_checkpoint() {
                Ok(StreamRead::Item(located)) => {
                    self.insert(located.into());
                    added += 1;
                }
                Ok(StreamRead::End) | Ok(StreamRead::Incomplete) => break,
                Err(e) if matches!(e.root(), DemoError::Storage(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable checkpoint: {}", e);
                    if stream.offset() == before {
                        break;
                    }
                }
            }
        }
        if added > 0 {
            tracing::debug!("Catalogued {} new checkpoints ({} total)", added, self.len());
        }
        Ok(added)
    }

    /// Read back the full record for `entry`
    pub fn load(&self, entry: &CatalogEntry, stream: &mut CheckpointStream) -> Result<CheckpointRecord> {
        if !entry.checkpoint.is_complete() {
            return Err(CheckpointError::IncompleteAtLoad {
                taken_at: entry.taken_at(),
            }
            .into());
        }
        stream.read_at(entry.record_offset).map_err(|e| {
            CheckpointError::RestoreFailed(format!(
                "checkpoint at {:.3}s is unreadable: {}",
                entry.taken_at(),
                e
            ))
            .into()
        })
    }
}
