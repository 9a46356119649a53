//! Driver-owned object tables

use std::collections::BTreeSet;

use crate::types::ObjectId;

/// Objects known to the recorder.
///
/// `dormant` is always a subset of `live`. `pending_checkpoint` only ever
/// holds awake objects: going dormant or being destroyed drops an object
/// from the current checkpoint cycle.
#[derive(Debug, Clone, Default)]
pub struct ObjectTables {
    live: BTreeSet<ObjectId>,
    dormant: BTreeSet<ObjectId>,
    pending_checkpoint: BTreeSet<ObjectId>,
}

impl ObjectTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly spawned object. Returns false if it was already live.
    pub fn spawn(&mut self, id: ObjectId) -> bool {
        self.dormant.remove(&id);
        self.live.insert(id)
    }

    /// Remove a destroyed object from every table
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        self.dormant.remove(&id);
        self.pending_checkpoint.remove(&id);
        self.live.remove(&id)
    }

    /// Mark an object dormant or awake. Returns true if the flag changed.
    ///
    /// A reactivated object is not added back to an in-progress checkpoint.
    pub fn set_dormant(&mut self, id: ObjectId, dormant: bool) -> bool {
        if !self.live.contains(&id) {
            return false;
        }
        if dormant {
            self.pending_checkpoint.remove(&id);
            self.dormant.insert(id)
        } else {
            self.dormant.remove(&id)
        }
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.live.contains(&id)
    }

    pub fn is_dormant(&self, id: ObjectId) -> bool {
        self.dormant.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn dormant_count(&self) -> usize {
        self.dormant.len()
    }

    /// Live objects that are not dormant
    pub fn working_set(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.live.difference(&self.dormant).copied()
    }

    /// Seed a checkpoint cycle with the current working set
    pub fn begin_pending(&mut self) -> usize {
        self.pending_checkpoint = self.working_set().collect();
        self.pending_checkpoint.len()
    }

    /// Take the next object owed a checkpoint save
    pub fn next_pending(&mut self) -> Option<ObjectId> {
        self.pending_checkpoint.pop_first()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_checkpoint.len()
    }

    pub fn clear_pending(&mut self) {
        self.pending_checkpoint.clear();
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.dormant.clear();
        self.pending_checkpoint.clear();
    }
}
