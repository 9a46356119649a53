//! Fake connections for driving recordings and playback in tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use netdemo_rs::checkpoint::CheckpointSnapshot;
use netdemo_rs::{DispatchMode, ExternalDataRecord, Frame, ObjectId, PlaybackSink, RecordSource};

/// Handle for feeding a [`SharedSource`] from the test body
#[derive(Clone, Default)]
pub struct SourceHandle {
    outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
    objects: Arc<Mutex<BTreeMap<ObjectId, Vec<u8>>>>,
}

impl SourceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload for the next recorder tick
    pub fn send(&self, payload: &[u8]) {
        self.outbox.lock().unwrap().push_back(payload.to_vec());
    }

    /// Set the state saved for `id` in later checkpoints
    pub fn set_object_state(&self, id: ObjectId, state: &[u8]) {
        self.objects.lock().unwrap().insert(id, state.to_vec());
    }

    pub fn source(&self) -> Box<SharedSource> {
        Box::new(SharedSource {
            handle: self.clone(),
        })
    }
}

/// [`RecordSource`] backed by a [`SourceHandle`]
pub struct SharedSource {
    handle: SourceHandle,
}

impl RecordSource for SharedSource {
    fn poll_outbound(&mut self) -> Option<Vec<u8>> {
        self.handle.outbox.lock().unwrap().pop_front()
    }

    fn save_object(&mut self, id: ObjectId) -> Option<Vec<u8>> {
        self.handle.objects.lock().unwrap().get(&id).cloned()
    }
}

/// Everything a [`RecordingSink`] saw
#[derive(Debug, Default, Clone)]
pub struct SinkLog {
    pub deliveries: Vec<(Vec<u8>, f32, DispatchMode)>,
    pub externals: Vec<(ObjectId, Vec<u8>, DispatchMode)>,
    pub restores: Vec<f64>,
    pub fast_forward_finished: usize,
    /// Timestamps of frames and external records in the order they arrived
    pub arrivals: Vec<f32>,
    /// Replicated state: restored objects plus payloads applied since
    pub objects: BTreeMap<ObjectId, Vec<u8>>,
    pub applied: Vec<Vec<u8>>,
}

impl SinkLog {
    pub fn live_payloads(&self) -> Vec<Vec<u8>> {
        self.deliveries
            .iter()
            .filter(|(_, _, mode)| *mode == DispatchMode::Live)
            .map(|(p, _, _)| p.clone())
            .collect()
    }

    pub fn fast_forward_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, _, mode)| mode.is_fast_forward())
            .count()
    }

    /// State a client would have built up
    pub fn state(&self) -> (BTreeMap<ObjectId, Vec<u8>>, Vec<Vec<u8>>) {
        (self.objects.clone(), self.applied.clone())
    }
}

/// [`PlaybackSink`] that records every call into a shared [`SinkLog`]
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    fail_restore: Arc<Mutex<bool>>,
    restore_plan: Arc<Mutex<VecDeque<bool>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<RecordingSink> {
        Box::new(self.clone())
    }

    pub fn log(&self) -> SinkLog {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        let mut log = self.log.lock().unwrap();
        log.deliveries.clear();
        log.externals.clear();
        log.restores.clear();
        log.fast_forward_finished = 0;
        log.arrivals.clear();
    }

    /// Make the next restores fail
    pub fn fail_restores(&self, fail: bool) {
        *self.fail_restore.lock().unwrap() = fail;
    }

    /// Accept (true) or refuse (false) the next restores in turn, then fall
    /// back to [`fail_restores`](Self::fail_restores)
    pub fn plan_restores(&self, plan: &[bool]) {
        *self.restore_plan.lock().unwrap() = plan.iter().copied().collect();
    }
}

impl PlaybackSink for RecordingSink {
    fn deliver(&mut self, frame: &Frame, mode: DispatchMode) {
        let mut log = self.log.lock().unwrap();
        log.deliveries
            .push((frame.payload.clone(), frame.playback_time_seconds, mode));
        log.arrivals.push(frame.playback_time_seconds);
        log.applied.push(frame.payload.clone());
    }

    fn deliver_external(&mut self, record: &ExternalDataRecord, mode: DispatchMode) {
        let mut log = self.log.lock().unwrap();
        log.externals
            .push((record.object_key, record.payload.clone(), mode));
        log.arrivals.push(record.timestamp_seconds);
    }

    fn restore_checkpoint(&mut self, snapshot: &CheckpointSnapshot) -> Result<(), String> {
        let accept = match self.restore_plan.lock().unwrap().pop_front() {
            Some(accept) => accept,
            None => !*self.fail_restore.lock().unwrap(),
        };
        if !accept {
            return Err("restore refused".to_string());
        }
        let mut log = self.log.lock().unwrap();
        log.restores.push(snapshot.taken_at_seconds);
        log.objects = snapshot.objects.clone();
        log.applied.clear();
        Ok(())
    }

    fn fast_forward_finished(&mut self) {
        self.log.lock().unwrap().fast_forward_finished += 1;
    }
}
