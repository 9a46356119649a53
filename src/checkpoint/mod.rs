//! Checkpoints
//!
//! A checkpoint is a full snapshot of replicated object state plus the stream
//! positions to resume from. Seeking restores the closest checkpoint at or
//! before the target and fast-forwards the remaining frames.
//!
//! # Components
//!
//! - [`CheckpointManager`]: saves checkpoints across several recorder ticks
//! - [`CheckpointCatalog`]: index of stored checkpoints used to pick a restore point

mod catalog;
mod manager;

pub use catalog::{CatalogEntry, CheckpointCatalog};
pub use manager::{CheckpointManager, CheckpointPhase};

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::CheckpointRecord;
use crate::types::ObjectId;

/// Save progress of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    /// Objects are still being saved
    InProgress { outstanding: usize },
    /// Every object has been saved; the checkpoint may be loaded
    Complete,
}

/// A checkpoint as seen by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub taken_at_seconds: f64,
    pub ack_state: AckState,
    pub saved_object_set: BTreeSet<ObjectId>,
}

impl Checkpoint {
    pub fn is_complete(&self) -> bool {
        self.ack_state == AckState::Complete
    }
}

/// Object state handed to the playback sink on restore
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckpointSnapshot {
    pub taken_at_seconds: f64,
    pub objects: BTreeMap<ObjectId, Vec<u8>>,
}

impl CheckpointSnapshot {
    /// Snapshot meaning "start of the recording"
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn is_initial(&self) -> bool {
        self.taken_at_seconds == 0.0 && self.objects.is_empty()
    }
}

impl From<CheckpointRecord> for CheckpointSnapshot {
    fn from(record: CheckpointRecord) -> Self {
        Self {
            taken_at_seconds: record.taken_at_seconds,
            objects: record.objects,
        }
    }
}
