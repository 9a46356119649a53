//! Collaborator traits for the live connection
//!
//! The recorder pulls traffic from a [`RecordSource`]; the player pushes
//! traffic into a [`PlaybackSink`]. Both are implemented by the host
//! application, which owns the actual replication model.

use crate::checkpoint::CheckpointSnapshot;
use crate::types::{DispatchMode, ExternalDataRecord, Frame, ObjectId};

/// Traffic source while recording
#[cfg_attr(test, mockall::automock)]
pub trait RecordSource: Send {
    /// Next outbound payload for this tick, or `None` once drained
    fn poll_outbound(&mut self) -> Option<Vec<u8>>;

    /// Serialized state of one object for a checkpoint.
    ///
    /// `None` skips the object for this checkpoint.
    fn save_object(&mut self, id: ObjectId) -> Option<Vec<u8>>;
}

/// Traffic consumer during playback
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackSink: Send {
    /// Apply one recorded frame. The payload is only borrowed for the call.
    fn deliver(&mut self, frame: &Frame, mode: DispatchMode);

    /// Apply one external data record
    fn deliver_external(&mut self, record: &ExternalDataRecord, mode: DispatchMode);

    /// Replace all replicated state with a checkpoint.
    ///
    /// An initial snapshot (no objects, time zero) means "reset to the start
    /// of the recording".
    fn restore_checkpoint(&mut self, snapshot: &CheckpointSnapshot) -> Result<(), String>;

    /// Called once a fast-forward has caught up, so deferred notifications can be flushed
    fn fast_forward_finished(&mut self);
}
