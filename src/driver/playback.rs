//! Playback core: clock, read-ahead and dispatch
//!
//! [`PlaybackCore`] owns everything a seek needs to touch, so the task queue
//! can borrow it mutably while the driver keeps the queue itself.

use std::time::Instant;

use crate::checkpoint::{CatalogEntry, CheckpointCatalog, CheckpointSnapshot};
use crate::config::DemoConfig;
use crate::connection::PlaybackSink;
use crate::error::{CheckpointError, DemoError, Result};
use crate::playback::{ExternalDataChannel, PlaybackQueue};
use crate::session::{SessionClock, SessionMetadata};
use crate::storage::{CheckpointStream, ExternalStream, FrameStream, StreamRead};
use crate::types::DispatchMode;

/// What one normal playback tick did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdvanceOutcome {
    /// The whole-second clock value changed
    pub coarse_changed: bool,
    /// Frames delivered live this tick
    pub dispatched: usize,
    /// Finalized recording fully played
    pub ended: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct PumpOutcome {
    dispatched: usize,
    last_time: Option<f64>,
    caught_up: bool,
}

/// Streams and buffers of an open playback session
pub struct PlaybackCore {
    clock: SessionClock,
    queue: PlaybackQueue,
    external: ExternalDataChannel,
    frames: FrameStream,
    external_stream: Option<ExternalStream>,
    checkpoints: Option<CheckpointStream>,
    catalog: CheckpointCatalog,
    sink: Box<dyn PlaybackSink>,
    fast_forward_batch: usize,
    metadata: Option<SessionMetadata>,
    newest_frame_time: f64,
    at_end: bool,
    pending_skip: f64,
    scrub_complete: Option<f64>,
    /// Clock value before the first scrub of an uninterrupted run of scrubs
    scrub_origin: Option<f64>,
    /// A restore reached the sink since `scrub_origin` was taken
    scrub_moved: bool,
    /// The sink could not be brought back after a failed scrub
    lost_sync: Option<DemoError>,
    /// Frame read error held back until the frames before it are delivered
    deferred_error: Option<DemoError>,
    frames_delivered: u64,
    frames_fast_forwarded: u64,
}

impl PlaybackCore {
    pub(crate) fn new(
        config: &DemoConfig,
        frames: FrameStream,
        external_stream: Option<ExternalStream>,
        checkpoints: Option<CheckpointStream>,
        metadata: Option<SessionMetadata>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        Self {
            clock: SessionClock::new(),
            queue: PlaybackQueue::new(config.read_ahead_frames),
            external: ExternalDataChannel::new(),
            frames,
            external_stream,
            checkpoints,
            catalog: CheckpointCatalog::new(),
            sink,
            fast_forward_batch: config.fast_forward_frames_per_tick,
            metadata,
            newest_frame_time: 0.0,
            at_end: false,
            pending_skip: 0.0,
            scrub_complete: None,
            scrub_origin: None,
            scrub_moved: false,
            lost_sync: None,
            deferred_error: None,
            frames_delivered: 0,
            frames_fast_forwarded: 0,
        }
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn current_time(&self) -> f64 {
        self.clock.current_seconds()
    }

    pub fn coarse_time(&self) -> f32 {
        self.clock.coarse_seconds()
    }

    /// Whether the metadata footer was found
    pub fn is_finalized(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    /// Recording length: from metadata when finalized, otherwise the newest data seen
    pub fn total_time(&self) -> f64 {
        match &self.metadata {
            Some(meta) => meta.total_time_seconds as f64,
            None => self
                .newest_frame_time
                .max(self.catalog.latest_time().unwrap_or(0.0)),
        }
    }

    pub fn catalog(&self) -> &CheckpointCatalog {
        &self.catalog
    }

    /// Whether the frame stream had nothing more to give on the last read
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn frames_fast_forwarded(&self) -> u64 {
        self.frames_fast_forwarded
    }

    /// Frames per fast-forward step (0 = no limit)
    pub fn fast_forward_batch(&self) -> usize {
        self.fast_forward_batch
    }

    // ── Seek support ────────────────────────────────────────────

    pub fn set_time(&mut self, seconds: f64) {
        self.clock.set(seconds);
    }

    /// Clamp a requested seek time to what the recording can reach
    pub fn resolve_seek_target(&self, seconds: f64) -> f64 {
        let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        if self.is_finalized() {
            seconds.min(self.total_time())
        } else {
            seconds
        }
    }

    /// Catalogue checkpoints written since the last scan
    pub fn refresh_catalog(&mut self) -> Result<usize> {
        match self.checkpoints.as_mut() {
            Some(stream) => self.catalog.refresh(stream),
            None => Ok(0),
        }
    }

    pub fn select_checkpoint(&self, seconds: f64) -> Option<CatalogEntry> {
        self.catalog.select_checkpoint(seconds).cloned()
    }

    pub fn checkpoint_entry(&self, index: usize) -> Option<CatalogEntry> {
        self.catalog.get(index).cloned()
    }

    /// Reset to a checkpoint, or to the start of the recording when `entry` is `None`.
    ///
    /// Nothing in the core changes unless the sink accepted the snapshot.
    /// Returns the checkpoint time.
    pub fn restore(&mut self, entry: Option<&CatalogEntry>) -> Result<f64> {
        let (snapshot, frame_offset, external_offset) = match entry {
            Some(entry) => {
                let stream = self.checkpoints.as_mut().ok_or_else(|| {
                    CheckpointError::NotFound("recording has no checkpoint stream".into())
                })?;
                let record = self.catalog.load(entry, stream)?;
                let offsets = (record.frame_offset, record.external_offset);
                (CheckpointSnapshot::from(record), offsets.0, offsets.1)
            }
            None => (CheckpointSnapshot::initial(), 0, 0),
        };

        self.sink
            .restore_checkpoint(&snapshot)
            .map_err(CheckpointError::RestoreFailed)?;

        self.queue.clear();
        self.external.clear();
        self.deferred_error = None;
        self.scrub_moved = true;
        self.frames.seek(frame_offset);
        if let Some(stream) = self.external_stream.as_mut() {
            stream.seek(external_offset);
        }
        self.at_end = false;
        self.pending_skip = 0.0;
        self.clock.set(snapshot.taken_at_seconds);
        tracing::debug!(
            "Restored checkpoint at {:.3}s ({} objects)",
            snapshot.taken_at_seconds,
            snapshot.objects.len()
        );
        Ok(snapshot.taken_at_seconds)
    }

    /// Replay frames up to `target` flagged as fast-forward.
    ///
    /// Delivers at most `limit` frames (0 = no limit). Returns true once
    /// everything due at `target` has been delivered, leaving the clock at
    /// `target` (or at the newest frame for an unbounded target).
    pub fn fast_forward_step(&mut self, target: f64, limit: usize) -> Result<bool> {
        let outcome = self.pump(target, DispatchMode::FastForward, limit)?;
        self.frames_fast_forwarded += outcome.dispatched as u64;
        if outcome.caught_up {
            let end = if target.is_finite() {
                target
            } else {
                outcome
                    .last_time
                    .unwrap_or(self.clock.current_seconds())
                    .max(self.clock.current_seconds())
            };
            self.clock.set(end);
            Ok(true)
        } else {
            if let Some(t) = outcome.last_time {
                self.clock.set(t);
            }
            Ok(false)
        }
    }

    /// Let the sink flush anything it deferred while fast-forwarding
    pub fn finish_fast_forward(&mut self) {
        self.sink.fast_forward_finished();
    }

    /// Note the start of a scrub. Returns the clock value from before the
    /// first scrub still in effect, so a scrub that replaced an unfinished
    /// one still knows where playback really was.
    pub(crate) fn begin_scrub(&mut self) -> f64 {
        *self
            .scrub_origin
            .get_or_insert(self.clock.current_seconds())
    }

    pub(crate) fn end_scrub(&mut self) {
        self.scrub_origin = None;
        self.scrub_moved = false;
    }

    /// Put playback back at `seconds` after a failed scrub.
    ///
    /// If no restore reached the sink since the scrubs began only the clock
    /// moves. Otherwise the sink is rebuilt from the latest checkpoint at or
    /// before `seconds` and fast-forwarded to it.
    pub(crate) fn rewind_to(&mut self, seconds: f64) -> Result<()> {
        if !self.scrub_moved {
            self.clock.set(seconds);
            return Ok(());
        }
        let entry = self.select_checkpoint(seconds);
        self.restore(entry.as_ref())?;
        self.fast_forward_step(seconds, 0)?;
        self.sink.fast_forward_finished();
        tracing::debug!("Rewound to {:.3}s after a failed seek", seconds);
        Ok(())
    }

    pub(crate) fn mark_lost_sync(&mut self, err: DemoError) {
        self.lost_sync = Some(err);
    }

    /// Error that left the sink out of step with the clock, if any
    pub(crate) fn take_lost_sync(&mut self) -> Option<DemoError> {
        self.lost_sync.take()
    }

    pub(crate) fn mark_scrub_complete(&mut self, seconds: f64) {
        self.scrub_complete = Some(seconds);
    }

    pub(crate) fn take_scrub_complete(&mut self) -> Option<f64> {
        self.scrub_complete.take()
    }

    // ── Normal playback ─────────────────────────────────────────

    pub(crate) fn request_skip(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.pending_skip += seconds;
        }
    }

    pub(crate) fn finalize(&mut self, metadata: SessionMetadata) {
        tracing::info!(
            "Recording finalized: {} frames, {:.3}s",
            metadata.num_frames,
            metadata.total_time_seconds
        );
        self.metadata = Some(metadata);
    }

    /// Advance by an already clamped and dilated `delta` and deliver due data
    pub(crate) fn advance(&mut self, delta: f64) -> Result<AdvanceOutcome> {
        let mut outcome = AdvanceOutcome::default();

        if self.pending_skip > 0.0 {
            let target = self.resolve_seek_target(self.clock.current_seconds() + self.pending_skip);
            self.pending_skip = 0.0;
            let started = Instant::now();
            self.fast_forward_step(target, 0)?;
            self.sink.fast_forward_finished();
            tracing::debug!(
                "Skipped ahead to {:.3}s in {:.2}ms",
                target,
                started.elapsed().as_secs_f64() * 1000.0
            );
            outcome.coarse_changed = true;
        }

        let mut next = self.clock.current_seconds() + delta.max(0.0);
        if self.is_finalized() {
            next = next.min(self.total_time().max(self.clock.current_seconds()));
        }
        outcome.coarse_changed |= self.clock.set(next);

        let pumped = self.pump(next, DispatchMode::Live, 0)?;
        outcome.dispatched = pumped.dispatched;
        self.frames_delivered += pumped.dispatched as u64;

        outcome.ended = self.is_finalized()
            && self.at_end
            && !self.queue.has_pending()
            && self.clock.current_seconds() >= self.total_time();
        Ok(outcome)
    }

    // ── Internals ───────────────────────────────────────────────

    /// Fill the queue from storage until it is full or the stream runs dry.
    ///
    /// A read error is only returned once every frame queued before it has
    /// been dispatched.
    fn read_ahead(&mut self) -> Result<()> {
        if self.deferred_error.is_some() {
            if self.queue.has_pending() {
                return Ok(());
            }
            if let Some(e) = self.deferred_error.take() {
                return Err(e);
            }
        }
        while !self.queue.is_full() {
            let read = match self.frames.next_frame() {
                Ok(read) => read,
                Err(e) if self.queue.has_pending() => {
                    tracing::debug!("Holding back frame error until the queue drains: {}", e);
                    self.deferred_error = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            match read {
                StreamRead::Item(frame) => {
                    self.newest_frame_time = self.newest_frame_time.max(frame.time());
                    self.queue.push_decoded(frame);
                    self.at_end = false;
                }
                StreamRead::End => {
                    self.at_end = true;
                    break;
                }
                StreamRead::Incomplete => {
                    if self.is_finalized() && !self.at_end {
                        tracing::warn!("Finalized recording ends with a partial frame");
                    }
                    self.at_end = true;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Deliver frames and external data due at `until`
    fn pump(&mut self, until: f64, mode: DispatchMode, limit: usize) -> Result<PumpOutcome> {
        let mut outcome = PumpOutcome::default();
        loop {
            self.read_ahead()?;

            let budget = if limit == 0 {
                usize::MAX
            } else {
                limit - outcome.dispatched
            };
            let mut count = 0;
            for frame in self.queue.pop_due(until).take(budget) {
                self.sink.deliver(&frame, mode);
                outcome.last_time = Some(frame.time());
                count += 1;
            }
            outcome.dispatched += count;

            if limit != 0 && outcome.dispatched >= limit {
                break;
            }
            if self.queue.has_pending() || count == 0 {
                outcome.caught_up = true;
                break;
            }
        }

        // External data must not run ahead of the frames delivered so far
        let external_until = if outcome.caught_up {
            until
        } else {
            outcome.last_time.unwrap_or(until)
        };
        self.pump_external(external_until, mode)?;
        Ok(outcome)
    }

    fn pump_external(&mut self, until: f64, mode: DispatchMode) -> Result<()> {
        if let Some(stream) = self.external_stream.as_mut() {
            while self.external.newest_time().map_or(true, |t| t <= until) {
                match stream.next_record()? {
                    StreamRead::Item(record) => self.external.push(record),
                    StreamRead::End | StreamRead::Incomplete => break,
                }
            }
        }
        for record in self.external.drain_due(until) {
            self.sink.deliver_external(&record, mode);
        }
        Ok(())
    }
}
