//! Demo driver
//!
//! [`DemoDriver`] is the single entry point the host talks to. It owns the
//! storage backend, the object tables and whichever session is active, and
//! is advanced by calling [`DemoDriver::tick`] once per host frame.
//!
//! # States
//!
//! ```text
//! Idle ──start_recording──▶ Recording ──stop──▶ Idle
//! Idle ──start_playback──▶ Opening ──▶ Playing ◀──▶ Paused
//!                                        │  ▲
//!                               seek_to  ▼  │ task done
//!                                  ScrubbingToTime
//! Playing ──end of finalized recording──▶ Finished
//! ```

mod events;
mod playback;
mod record;

pub use events::{DriverEvent, Listener, ListenerId};
pub use playback::{AdvanceOutcome, PlaybackCore};

use std::fmt;

use events::Listeners;
use record::{RecordSession, RecordStreams};

use crate::checkpoint::CheckpointPhase;
use crate::codec::{decode_header, decode_metadata, encode_header};
use crate::config::DemoConfig;
use crate::connection::{PlaybackSink, RecordSource};
use crate::error::{DemoError, FormatError, Result, ResultExt, StateError};
use crate::session::{BuildInfo, ObjectTables, ReplayEvent, SessionHeader, SessionMetadata};
use crate::storage::{
    CheckpointStream, EventStream, ExternalStream, FrameStream, ReplayStorage, StreamKind,
    StreamRead, StreamReader,
};
use crate::tasks::{DoneCallback, ReplayTask, TaskDiscriminator, TaskQueue};
use crate::types::ObjectId;

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DriverState {
    #[default]
    Idle,
    Recording,
    /// Reading the header of a recording
    Opening,
    Playing,
    Paused,
    /// A seek is running
    ScrubbingToTime { target: f64 },
    /// A finalized recording played to the end
    Finished,
}

impl DriverState {
    pub fn display_name(&self) -> &'static str {
        match self {
            DriverState::Idle => "Idle",
            DriverState::Recording => "Recording",
            DriverState::Opening => "Opening",
            DriverState::Playing => "Playing",
            DriverState::Paused => "Paused",
            DriverState::ScrubbingToTime { .. } => "Scrubbing",
            DriverState::Finished => "Finished",
        }
    }

    /// Any playback state, including seeking and finished
    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            DriverState::Playing
                | DriverState::Paused
                | DriverState::ScrubbingToTime { .. }
                | DriverState::Finished
        )
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::ScrubbingToTime { target } => write!(f, "Scrubbing to {:.3}s", target),
            other => f.write_str(other.display_name()),
        }
    }
}

/// An open recording being played back
struct PlaybackSession {
    core: PlaybackCore,
    tasks: TaskQueue,
    header: SessionHeader,
    events: Option<EventStream>,
    metadata_stream: String,
}

/// Records and replays sessions against a [`ReplayStorage`]
pub struct DemoDriver {
    config: DemoConfig,
    storage: Box<dyn ReplayStorage>,
    build: BuildInfo,
    state: DriverState,
    session_name: Option<String>,
    recording: Option<RecordSession>,
    playback: Option<PlaybackSession>,
    objects: ObjectTables,
    events: Vec<ReplayEvent>,
    listeners: Listeners,
    paused: bool,
    time_dilation: f64,
    ended_notified: bool,
}

impl DemoDriver {
    pub fn new(config: DemoConfig, storage: impl ReplayStorage + 'static) -> Self {
        Self::with_storage(config, Box::new(storage))
    }

    pub fn with_storage(config: DemoConfig, storage: Box<dyn ReplayStorage>) -> Self {
        let time_dilation = config.time_dilation;
        Self {
            config,
            storage,
            build: BuildInfo::default(),
            state: DriverState::Idle,
            session_name: None,
            recording: None,
            playback: None,
            objects: ObjectTables::new(),
            events: Vec::new(),
            listeners: Listeners::default(),
            paused: false,
            time_dilation,
            ended_notified: false,
        }
    }

    /// Build identity stamped into new recordings and checked on playback
    pub fn with_build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn session_name(&self) -> Option<&str> {
        self.session_name.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.state == DriverState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playback()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current session time in seconds
    pub fn current_time(&self) -> f64 {
        if let Some(session) = &self.recording {
            session.current_time()
        } else if let Some(session) = &self.playback {
            session.core.current_time()
        } else {
            0.0
        }
    }

    /// Length of the session so far
    pub fn total_time(&self) -> f64 {
        if let Some(session) = &self.recording {
            session.current_time()
        } else if let Some(session) = &self.playback {
            session.core.total_time()
        } else {
            0.0
        }
    }

    /// Frames written so far, or the recording's frame count when finalized
    pub fn total_frames(&self) -> u32 {
        if let Some(session) = &self.recording {
            session.frame_count()
        } else if let Some(session) = &self.playback {
            session.core.metadata().map_or(0, |m| m.num_frames)
        } else {
            0
        }
    }

    /// Header of the recording being played
    pub fn header(&self) -> Option<&SessionHeader> {
        self.playback.as_ref().map(|s| &s.header)
    }

    pub fn playback_core(&self) -> Option<&PlaybackCore> {
        self.playback.as_ref().map(|s| &s.core)
    }

    pub fn checkpoint_count(&self) -> usize {
        if let Some(session) = &self.recording {
            session.catalog().len()
        } else if let Some(session) = &self.playback {
            session.core.catalog().len()
        } else {
            0
        }
    }

    /// Progress of the recorder's current checkpoint
    pub fn checkpoint_phase(&self) -> Option<CheckpointPhase> {
        self.recording.as_ref().map(|s| s.checkpoint_phase())
    }

    pub fn objects(&self) -> &ObjectTables {
        &self.objects
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_task_queued(&self, discriminator: TaskDiscriminator) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|s| s.tasks.is_task_queued(discriminator))
    }

    // ── Listeners ───────────────────────────────────────────────

    pub fn add_listener(&mut self, listener: impl FnMut(&DriverEvent) + Send + 'static) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ── Recording ───────────────────────────────────────────────

    /// Start recording `name`, truncating any earlier recording with that name
    pub fn start_recording(
        &mut self,
        name: &str,
        scene_name: &str,
        source: Box<dyn RecordSource>,
    ) -> Result<()> {
        self.ensure_idle()?;

        let header = SessionHeader::new(&self.build, scene_name);
        let streams = self
            .open_record_streams(name, &header)
            .with_context(|| format!("Failed to start recording '{}'", name))?;

        self.recording = Some(RecordSession::new(name, source, streams, &self.config));
        self.session_name = Some(name.to_string());
        self.paused = false;
        self.state = DriverState::Recording;
        tracing::info!("Recording {} started (scene {})", name, scene_name);
        Ok(())
    }

    fn open_record_streams(&mut self, name: &str, header: &SessionHeader) -> Result<RecordStreams> {
        let header_bytes = encode_header(header)?;
        let mut header_stream = self
            .storage
            .open_for_write(&StreamKind::Header.stream_name(name))?;
        header_stream.append(&header_bytes)?;
        header_stream.flush()?;

        // Opening the footer truncates it, so the recording reads as live until stop
        Ok(RecordStreams {
            metadata: self
                .storage
                .open_for_write(&StreamKind::Metadata.stream_name(name))?,
            frames: self
                .storage
                .open_for_write(&StreamKind::Frames.stream_name(name))?,
            external: self
                .storage
                .open_for_write(&StreamKind::External.stream_name(name))?,
            checkpoints: self
                .storage
                .open_for_write(&StreamKind::Checkpoints.stream_name(name))?,
            events: self
                .storage
                .open_for_write(&StreamKind::Events.stream_name(name))?,
        })
    }

    fn recording_mut(&mut self) -> Result<&mut RecordSession> {
        self.recording
            .as_mut()
            .ok_or_else(|| StateError::NoActiveSession.into())
    }

    /// Queue data keyed by an object, written with the next recorded frame.
    ///
    /// Payloads larger than `max_frame_size` are refused.
    pub fn record_external_data(&mut self, key: ObjectId, payload: Vec<u8>) -> Result<()> {
        self.recording_mut()?.queue_external(key, payload)
    }

    /// Ask for a checkpoint on the next recorder tick
    pub fn request_checkpoint(&mut self) -> Result<()> {
        self.recording_mut()?.request_checkpoint();
        Ok(())
    }

    /// Store a side-channel event at the current recording time. Returns its id.
    pub fn add_side_channel_event(&mut self, group: &str, meta: &str, payload: &[u8]) -> Result<String> {
        let event = self.recording_mut()?.add_event(group, meta, payload)?;
        let id = event.id.clone();
        self.events.push(event);
        Ok(id)
    }

    /// Side-channel events of `group` in the active session
    pub fn enumerate_events(&self, group: &str) -> Vec<ReplayEvent> {
        self.events
            .iter()
            .filter(|e| e.group == group)
            .cloned()
            .collect()
    }

    pub fn object_spawned(&mut self, id: ObjectId) {
        self.objects.spawn(id);
    }

    pub fn object_destroyed(&mut self, id: ObjectId) {
        self.objects.destroy(id);
    }

    pub fn set_dormant(&mut self, id: ObjectId, dormant: bool) {
        self.objects.set_dormant(id, dormant);
    }

    // ── Playback ────────────────────────────────────────────────

    /// Open `name` for playback and start at time zero
    pub fn start_playback(&mut self, name: &str, sink: Box<dyn PlaybackSink>) -> Result<SessionHeader> {
        self.ensure_idle()?;
        self.state = DriverState::Opening;

        let session = match self.open_playback(name, sink) {
            Ok(session) => session,
            Err(e) => {
                self.state = DriverState::Idle;
                tracing::error!("Failed to open recording {}: {}", name, e);
                return Err(e.with_context(format!("Failed to open recording '{}'", name)));
            }
        };

        let header = session.header.clone();
        tracing::info!(
            "Playing {} (scene {}, {}, {} checkpoints)",
            name,
            header.scene_name,
            if session.core.is_finalized() {
                format!("{:.3}s", session.core.total_time())
            } else {
                "live".to_string()
            },
            session.core.catalog().len()
        );
        self.playback = Some(session);
        self.session_name = Some(name.to_string());
        self.paused = false;
        self.ended_notified = false;
        self.state = DriverState::Playing;
        Ok(header)
    }

    fn open_playback(&mut self, name: &str, sink: Box<dyn PlaybackSink>) -> Result<PlaybackSession> {
        let header_bytes = self
            .storage
            .open_for_read(&StreamKind::Header.stream_name(name))?
            .read_all()?;
        let header = decode_header(&header_bytes)?;
        header.check_compatibility(&self.build, self.config.header_policy)?;

        let metadata_stream = StreamKind::Metadata.stream_name(name);
        let metadata = read_metadata(self.storage.as_mut(), &metadata_stream)?;

        let max_frame = self.config.max_frame_size;
        let max_record = self.config.max_checkpoint_size;
        let frames_name = StreamKind::Frames.stream_name(name);
        let frames = FrameStream::new(
            self.storage.open_for_read(&frames_name)?,
            frames_name,
            max_frame,
            self.config.lossy_playback,
        );
        let external = self
            .open_optional(StreamKind::External, name)?
            .map(|(reader, stream)| ExternalStream::new(reader, stream, max_frame));
        let checkpoints = self
            .open_optional(StreamKind::Checkpoints, name)?
            .map(|(reader, stream)| CheckpointStream::new(reader, stream, max_record));
        let mut events = self
            .open_optional(StreamKind::Events, name)?
            .map(|(reader, stream)| EventStream::new(reader, stream, max_record));

        self.events = match events.as_mut() {
            Some(stream) => stream.read_all_lenient()?,
            None => Vec::new(),
        };

        let mut core = PlaybackCore::new(&self.config, frames, external, checkpoints, metadata, sink);
        if let Err(e) = core.refresh_catalog() {
            tracing::warn!("Could not read checkpoints of {}: {}", name, e);
        }

        Ok(PlaybackSession {
            core,
            tasks: TaskQueue::new(),
            header,
            events,
            metadata_stream,
        })
    }

    fn open_optional(
        &mut self,
        kind: StreamKind,
        name: &str,
    ) -> Result<Option<(Box<dyn StreamReader>, String)>> {
        let stream = kind.stream_name(name);
        if !self.storage.exists(&stream) {
            tracing::debug!("Recording {} has no {} stream", name, kind.suffix());
            return Ok(None);
        }
        Ok(Some((self.storage.open_for_read(&stream)?, stream)))
    }

    fn playback_mut(&mut self) -> Result<&mut PlaybackSession> {
        self.playback
            .as_mut()
            .ok_or_else(|| StateError::NoActiveSession.into())
    }

    /// Queue a task against the open recording
    pub fn enqueue_task(&mut self, task: ReplayTask) -> Result<()> {
        self.playback_mut()?.tasks.enqueue(task);
        Ok(())
    }

    /// Seek to `seconds`. Any seek already in flight is cancelled.
    ///
    /// `on_done` fires exactly once, after the seek completed, failed or was
    /// superseded.
    pub fn seek_to(&mut self, seconds: f64, on_done: Option<DoneCallback>) -> Result<()> {
        let mut task = ReplayTask::seek(seconds);
        if let Some(callback) = on_done {
            task = task.on_done(callback);
        }
        self.enqueue_task(task)?;
        self.state = DriverState::ScrubbingToTime { target: seconds };
        Ok(())
    }

    /// Restore catalog entry `index` and play `skip_extra_seconds` past it
    pub fn load_checkpoint(
        &mut self,
        index: usize,
        skip_extra_seconds: f64,
        on_done: Option<DoneCallback>,
    ) -> Result<()> {
        let mut task = ReplayTask::load_checkpoint(index, skip_extra_seconds);
        if let Some(callback) = on_done {
            task = task.on_done(callback);
        }
        self.enqueue_task(task)?;
        let target = self
            .playback
            .as_ref()
            .and_then(|s| s.core.catalog().get(index))
            .map_or(0.0, |e| e.taken_at() + skip_extra_seconds.max(0.0));
        self.state = DriverState::ScrubbingToTime { target };
        Ok(())
    }

    /// Seek to the newest data in the recording
    pub fn jump_to_end(&mut self, on_done: Option<DoneCallback>) -> Result<()> {
        self.seek_to(f64::INFINITY, on_done)
    }

    /// Fast-forward `seconds` on the next tick without restoring a checkpoint
    pub fn skip_time(&mut self, seconds: f64) -> Result<()> {
        self.playback_mut()?.core.request_skip(seconds);
        Ok(())
    }

    /// Scale applied to playback deltas
    pub fn set_time_dilation(&mut self, dilation: f64) {
        if dilation.is_finite() && dilation >= 0.0 {
            self.time_dilation = dilation;
        } else {
            tracing::warn!("Ignoring time dilation {}", dilation);
        }
    }

    pub fn time_dilation(&self) -> f64 {
        self.time_dilation
    }

    /// Freeze or resume the active session
    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
        match self.state {
            DriverState::Recording => {
                if let Some(session) = self.recording.as_mut() {
                    session.set_paused(paused);
                }
            }
            DriverState::Playing if paused => self.state = DriverState::Paused,
            DriverState::Paused if !paused => self.state = DriverState::Playing,
            _ => {}
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<()> {
        if self.state == DriverState::Idle {
            Ok(())
        } else {
            Err(StateError::AlreadyActive(self.state.display_name()).into())
        }
    }

    /// End the active session. Recordings get their metadata footer written.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == DriverState::Idle {
            return Err(StateError::NoActiveSession.into());
        }

        let mut result = Ok(());
        if let Some(session) = self.recording.take() {
            result = session.finish(&mut self.objects).map(|_| ());
        }
        if let Some(mut session) = self.playback.take() {
            session.tasks.cancel_all();
            tracing::info!(
                "Playback stopped at {:.3}s ({} frames delivered)",
                session.core.current_time(),
                session.core.frames_delivered()
            );
        }

        self.objects.clear();
        self.events.clear();
        self.session_name = None;
        self.paused = false;
        self.ended_notified = false;
        self.state = DriverState::Idle;
        result
    }

    /// Advance the active session by `delta` seconds of host time
    pub fn tick(&mut self, delta: f64) -> Result<()> {
        match self.state {
            DriverState::Idle | DriverState::Opening => Ok(()),
            DriverState::Recording => {
                let Some(session) = self.recording.as_mut() else {
                    return Ok(());
                };
                let events = session
                    .tick(delta, &mut self.objects)
                    .context("Recording tick failed")?;
                self.listeners.emit_all(events);
                Ok(())
            }
            _ => self.tick_playback(delta),
        }
    }

    fn tick_playback(&mut self, delta: f64) -> Result<()> {
        let Some(session) = self.playback.as_mut() else {
            return Ok(());
        };
        let mut events = Vec::new();

        if session.tasks.has_work() {
            if let Some(target) = session.tasks.active_seek_target() {
                self.state = DriverState::ScrubbingToTime { target };
            }
            session.tasks.tick(&mut session.core);
            if let Some(e) = session.core.take_lost_sync() {
                tracing::error!("Playback stopped: {}", e);
                let _ = self.stop();
                return Err(e.with_context("Playback failed"));
            }
            if let Some(seconds) = session.core.take_scrub_complete() {
                events.push(DriverEvent::ScrubComplete { seconds });
            }
            if !session.tasks.has_work() {
                self.state = if self.paused {
                    DriverState::Paused
                } else {
                    DriverState::Playing
                };
            }
            self.listeners.emit_all(events);
            return Ok(());
        }

        if self.paused || self.state == DriverState::Finished {
            return Ok(());
        }

        let delta = clamp_delta(delta, self.config.max_delta_seconds) * self.time_dilation;
        let outcome = match session.core.advance(delta) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Playback stopped: {}", e);
                let _ = self.stop();
                return Err(e.with_context("Playback failed"));
            }
        };
        if outcome.coarse_changed {
            events.push(DriverEvent::TimeUpdated {
                seconds: session.core.coarse_time(),
            });
        }

        if !session.core.is_finalized() {
            poll_live_session(self.storage.as_mut(), session, &mut self.events);
        }

        if outcome.ended {
            self.state = DriverState::Finished;
            if !self.ended_notified {
                self.ended_notified = true;
                tracing::info!("Playback reached the end at {:.3}s", session.core.current_time());
                events.push(DriverEvent::PlaybackEnded);
            }
        }

        self.listeners.emit_all(events);
        Ok(())
    }
}

impl fmt::Debug for DemoDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoDriver")
            .field("state", &self.state)
            .field("session", &self.session_name)
            .field("paused", &self.paused)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Playback deltas are kept within `[0, max]`
fn clamp_delta(delta: f64, max: f64) -> f64 {
    if delta.is_nan() {
        0.0
    } else {
        delta.clamp(0.0, max.max(0.0))
    }
}

/// Read the metadata footer; `None` while the recording is still being written
fn read_metadata(storage: &mut dyn ReplayStorage, stream: &str) -> Result<Option<SessionMetadata>> {
    if !storage.exists(stream) {
        return Ok(None);
    }
    let bytes = storage.open_for_read(stream)?.read_all()?;
    if bytes.is_empty() {
        return Ok(None);
    }
    match decode_metadata(&bytes) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.is_truncated() => Ok(None),
        Err(e) => Err(DemoError::from(e).with_context(format!("Bad metadata in {}", stream))),
    }
}

/// Pick up what a live recording wrote since the last tick
fn poll_live_session(
    storage: &mut dyn ReplayStorage,
    session: &mut PlaybackSession,
    events: &mut Vec<ReplayEvent>,
) {
    if let Some(stream) = session.events.as_mut() {
        loop {
            match stream.next_event() {
                Ok(StreamRead::Item(event)) => events.push(event),
                Ok(StreamRead::End | StreamRead::Incomplete) => break,
                // Corrupt events were already stepped over
                Err(e) if matches!(e.root(), DemoError::Format(FormatError::Corrupt(_))) => {
                    tracing::warn!("Skipping unreadable event: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Could not read events: {}", e);
                    break;
                }
            }
        }
    }

    if !session.core.at_end() {
        return;
    }
    match read_metadata(storage, &session.metadata_stream) {
        Ok(Some(meta)) => session.core.finalize(meta),
        Ok(None) => {}
        Err(e) => {
            let corrupt = matches!(e.root(), DemoError::Format(FormatError::Corrupt(_)));
            tracing::warn!("Ignoring metadata footer (corrupt: {}): {}", corrupt, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{MockPlaybackSink, MockRecordSource};
    use crate::storage::MemoryStorage;

    fn quiet_source() -> Box<MockRecordSource> {
        let mut source = MockRecordSource::new();
        source.expect_poll_outbound().returning(|| None);
        source.expect_save_object().returning(|_| Some(Vec::new()));
        Box::new(source)
    }

    fn permissive_sink() -> Box<MockPlaybackSink> {
        let mut sink = MockPlaybackSink::new();
        sink.expect_deliver().returning(|_, _| ());
        sink.expect_deliver_external().returning(|_, _| ());
        sink.expect_restore_checkpoint().returning(|_| Ok(()));
        sink.expect_fast_forward_finished().returning(|| ());
        Box::new(sink)
    }

    #[test]
    fn test_clamp_delta() {
        assert_eq!(clamp_delta(0.1, 0.5), 0.1);
        assert_eq!(clamp_delta(2.0, 0.5), 0.5);
        assert_eq!(clamp_delta(-1.0, 0.5), 0.0);
        assert_eq!(clamp_delta(f64::NAN, 0.5), 0.0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DriverState::Idle.to_string(), "Idle");
        assert_eq!(
            DriverState::ScrubbingToTime { target: 1.5 }.to_string(),
            "Scrubbing to 1.500s"
        );
        assert!(DriverState::Finished.is_playback());
        assert!(!DriverState::Recording.is_playback());
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut driver = DemoDriver::new(DemoConfig::default(), MemoryStorage::new());
        driver.start_recording("a", "arena", quiet_source()).unwrap();
        let err = driver.start_recording("b", "arena", quiet_source()).unwrap_err();
        assert!(matches!(err, DemoError::State(StateError::AlreadyActive("Recording"))));
        assert!(driver.is_recording());
    }

    #[test]
    fn test_stop_when_idle_is_an_error() {
        let mut driver = DemoDriver::new(DemoConfig::default(), MemoryStorage::new());
        assert!(matches!(
            driver.stop().unwrap_err(),
            DemoError::State(StateError::NoActiveSession)
        ));
    }

    #[test]
    fn test_recording_inputs_need_a_recording() {
        let mut driver = DemoDriver::new(DemoConfig::default(), MemoryStorage::new());
        assert!(driver.record_external_data(ObjectId(1), vec![1]).is_err());
        assert!(driver.request_checkpoint().is_err());
        assert!(driver.add_side_channel_event("kills", "", b"x").is_err());
        assert!(driver.skip_time(1.0).is_err());
        assert!(driver.seek_to(1.0, None).is_err());
    }

    #[test]
    fn test_missing_recording_returns_to_idle() {
        let mut driver = DemoDriver::new(DemoConfig::default(), MemoryStorage::new());
        let err = driver.start_playback("nope", permissive_sink()).unwrap_err();
        assert!(matches!(err.root(), DemoError::Storage(_)));
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn test_events_are_numbered_per_session() {
        let storage = MemoryStorage::new();
        let mut driver = DemoDriver::new(DemoConfig::default(), storage.clone());
        driver.start_recording("match", "arena", quiet_source()).unwrap();
        driver.tick(0.25).unwrap();
        let first = driver.add_side_channel_event("kills", "red", b"1").unwrap();
        let second = driver.add_side_channel_event("chat", "", b"gg").unwrap();
        assert_eq!(first, "match_0");
        assert_eq!(second, "match_1");
        assert_eq!(driver.enumerate_events("kills").len(), 1);
        driver.stop().unwrap();
        assert!(driver.enumerate_events("kills").is_empty());

        driver.start_playback("match", permissive_sink()).unwrap();
        let kills = driver.enumerate_events("kills");
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].time_seconds, 0.25);
        assert_eq!(kills[0].payload, b"1");
    }

    #[test]
    fn test_pause_moves_between_playing_and_paused() {
        let storage = MemoryStorage::new();
        let mut driver = DemoDriver::new(DemoConfig::default(), storage.clone());
        driver.start_recording("p", "arena", quiet_source()).unwrap();
        driver.tick(1.0).unwrap();
        driver.stop().unwrap();

        driver.start_playback("p", permissive_sink()).unwrap();
        driver.pause(true);
        assert_eq!(driver.state(), DriverState::Paused);
        driver.tick(0.1).unwrap();
        assert_eq!(driver.current_time(), 0.0);
        driver.pause(false);
        assert_eq!(driver.state(), DriverState::Playing);
        driver.tick(0.1).unwrap();
        assert!((driver.current_time() - 0.1).abs() < 1e-9);
    }
}
