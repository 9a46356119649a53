//! Multi-tick checkpoint saving

use std::collections::BTreeMap;
use std::time::Instant;

use super::{AckState, Checkpoint};
use crate::codec::CheckpointRecord;
use crate::connection::RecordSource;
use crate::error::StateError;
use crate::session::ObjectTables;
use crate::types::ObjectId;

/// Where the current checkpoint cycle stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointPhase {
    #[default]
    Idle,
    /// Pending set captured, nothing saved yet
    Collecting,
    /// Some objects saved, more outstanding
    Saving,
    /// Last cycle finished and produced a record
    Complete,
    /// Last cycle was abandoned
    Aborted,
}

impl CheckpointPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, CheckpointPhase::Collecting | CheckpointPhase::Saving)
    }
}

#[derive(Debug)]
struct InProgress {
    started_at: f64,
    saved: BTreeMap<ObjectId, Vec<u8>>,
    outstanding: usize,
}

/// Saves object state a few objects at a time so a large world never stalls a tick.
#[derive(Debug, Default)]
pub struct CheckpointManager {
    phase: CheckpointPhase,
    current: Option<InProgress>,
    budget_ms: Option<f64>,
    completed: u32,
}

impl CheckpointManager {
    /// `budget_ms` limits save time per tick; `None` saves everything in one tick
    pub fn new(budget_ms: Option<f64>) -> Self {
        Self {
            budget_ms: budget_ms.filter(|ms| *ms >= 0.0),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> CheckpointPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    /// Checkpoints completed so far
    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    /// The checkpoint being saved, if any
    pub fn current_checkpoint(&self) -> Option<Checkpoint> {
        self.current.as_ref().map(|cp| Checkpoint {
            taken_at_seconds: cp.started_at,
            ack_state: AckState::InProgress {
                outstanding: cp.outstanding,
            },
            saved_object_set: cp.saved.keys().copied().collect(),
        })
    }

    /// Start a cycle: every awake live object is owed a save
    pub fn begin_checkpoint(&mut self, tables: &mut ObjectTables, now: f64) -> Result<usize, StateError> {
        if self.is_active() {
            return Err(StateError::TaskConflict(
                "a checkpoint is already being saved".to_string(),
            ));
        }
        let outstanding = tables.begin_pending();
        self.current = Some(InProgress {
            started_at: now,
            saved: BTreeMap::new(),
            outstanding,
        });
        self.phase = CheckpointPhase::Collecting;
        tracing::debug!("Checkpoint started at {:.3}s with {} objects", now, outstanding);
        Ok(outstanding)
    }

    /// Save pending objects within the time budget.
    ///
    /// At least one object is saved per call. Returns the finished record once
    /// nothing is pending; `taken_at` is the time of completion and the
    /// offsets are the stream positions playback resumes from.
    pub fn tick_checkpoint(
        &mut self,
        tables: &mut ObjectTables,
        source: &mut dyn RecordSource,
        now: f64,
        frame_offset: u64,
        external_offset: u64,
    ) -> Option<CheckpointRecord> {
        if !self.is_active() {
            return None;
        }
        let current = self.current.as_mut()?;

        let started = Instant::now();
        while let Some(id) = tables.next_pending() {
            match source.save_object(id) {
                Some(state) => {
                    current.saved.insert(id, state);
                }
                None => tracing::trace!("No checkpoint state for {}", id),
            }
            if let Some(budget) = self.budget_ms {
                if started.elapsed().as_secs_f64() * 1000.0 >= budget {
                    break;
                }
            }
        }

        current.outstanding = tables.pending_count();
        if current.outstanding > 0 {
            self.phase = CheckpointPhase::Saving;
            return None;
        }

        let finished = self.current.take()?;
        self.phase = CheckpointPhase::Complete;
        self.completed += 1;
        tracing::info!(
            "Checkpoint complete at {:.3}s ({} objects, started {:.3}s)",
            now,
            finished.saved.len(),
            finished.started_at
        );
        Some(CheckpointRecord {
            taken_at_seconds: now,
            frame_offset,
            external_offset,
            objects: finished.saved,
        })
    }

    /// Drop the in-progress cycle; nothing from it is kept
    pub fn abort(&mut self, tables: &mut ObjectTables) {
        if self.is_active() {
            tracing::debug!("Checkpoint aborted");
            self.phase = CheckpointPhase::Aborted;
        }
        self.current = None;
        tables.clear_pending();
    }

    /// Mark the last produced record as lost (e.g. it could not be written)
    pub fn discard_completed(&mut self) {
        if self.phase == CheckpointPhase::Complete {
            self.phase = CheckpointPhase::Aborted;
            self.completed = self.completed.saturating_sub(1);
        }
    }
}
