//! Recording side of the driver

use std::time::{Duration, Instant};

use super::DriverEvent;
use crate::checkpoint::{CatalogEntry, CheckpointCatalog, CheckpointManager, CheckpointPhase};
use crate::codec::{
    check_len, encode_checkpoint, encode_event_into, encode_external_into, encode_frame_into,
    encode_metadata, MAX_STRING_LEN, RECORD_PREFIX,
};
use crate::config::DemoConfig;
use crate::connection::RecordSource;
use crate::error::{Result, ResultExt};
use crate::session::{ObjectTables, ReplayEvent, SessionClock, SessionMetadata};
use crate::storage::StreamWriter;
use crate::types::{ExternalDataRecord, ObjectId};

/// How often slow recording ticks are reported
const SLOW_TICK_WINDOW: Duration = Duration::from_secs(2);
const SLOW_TICK_AVG_MS: f64 = 3.0;
const SLOW_TICK_MAX_MS: f64 = 6.0;

/// Rolling recorder tick timings
#[derive(Debug)]
struct TickStats {
    window_start: Instant,
    total: Duration,
    max: Duration,
    count: u32,
}

impl TickStats {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            total: Duration::ZERO,
            max: Duration::ZERO,
            count: 0,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        self.count += 1;

        if self.window_start.elapsed() < SLOW_TICK_WINDOW {
            return;
        }
        let avg_ms = self.total.as_secs_f64() * 1000.0 / self.count as f64;
        let max_ms = self.max.as_secs_f64() * 1000.0;
        if avg_ms > SLOW_TICK_AVG_MS || max_ms > SLOW_TICK_MAX_MS {
            tracing::warn!(
                "Slow recording ticks: avg {:.2}ms, max {:.2}ms over {} ticks",
                avg_ms,
                max_ms,
                self.count
            );
        }
        *self = Self::new();
    }
}

/// Open output streams of one recording
pub(crate) struct RecordStreams {
    pub frames: Box<dyn StreamWriter>,
    pub external: Box<dyn StreamWriter>,
    pub checkpoints: Box<dyn StreamWriter>,
    pub events: Box<dyn StreamWriter>,
    pub metadata: Box<dyn StreamWriter>,
}

/// State of an active recording
pub(crate) struct RecordSession {
    name: String,
    source: Box<dyn RecordSource>,
    streams: RecordStreams,
    clock: SessionClock,
    manager: CheckpointManager,
    catalog: CheckpointCatalog,
    pending_external: Vec<(ObjectId, Vec<u8>)>,
    frame_buffer: Vec<u8>,
    frame_count: u32,
    dropped_frames: u32,
    event_count: u64,
    last_frame_time: Option<f64>,
    last_checkpoint_time: f64,
    checkpoint_requested: bool,
    paused: bool,
    stats: TickStats,
    max_frame_size: usize,
    max_record_size: usize,
    record_interval: Option<f64>,
    enable_checkpoints: bool,
    checkpoint_interval: f64,
}

impl RecordSession {
    pub fn new(
        name: &str,
        source: Box<dyn RecordSource>,
        streams: RecordStreams,
        config: &DemoConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            source,
            streams,
            clock: SessionClock::new(),
            manager: CheckpointManager::new(config.checkpoint_budget_ms()),
            catalog: CheckpointCatalog::new(),
            pending_external: Vec::new(),
            frame_buffer: Vec::with_capacity(config.max_frame_size * 4),
            frame_count: 0,
            dropped_frames: 0,
            event_count: 0,
            last_frame_time: None,
            last_checkpoint_time: 0.0,
            checkpoint_requested: false,
            paused: false,
            stats: TickStats::new(),
            max_frame_size: config.max_frame_size,
            max_record_size: config.max_checkpoint_size,
            record_interval: config.record_interval_seconds(),
            enable_checkpoints: config.enable_checkpoints,
            checkpoint_interval: config.checkpoint_interval_seconds,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_seconds()
    }

    /// Session time as it is stamped into the streams
    fn stamp(&self) -> f64 {
        self.clock.current_seconds() as f32 as f64
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn catalog(&self) -> &CheckpointCatalog {
        &self.catalog
    }

    pub fn checkpoint_phase(&self) -> CheckpointPhase {
        self.manager.phase()
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            tracing::info!(
                "Recording {} {}",
                self.name,
                if paused { "paused" } else { "resumed" }
            );
        }
        self.paused = paused;
    }

    pub fn request_checkpoint(&mut self) {
        self.checkpoint_requested = true;
    }

    /// Queue external data for the next recorded tick.
    ///
    /// Payloads are held to the same size limit as frames.
    pub fn queue_external(&mut self, key: ObjectId, payload: Vec<u8>) -> Result<()> {
        check_len("external data payload", payload.len(), self.max_frame_size)?;
        self.pending_external.push((key, payload));
        Ok(())
    }

    /// Append a side-channel event stamped with the current time
    pub fn add_event(&mut self, group: &str, meta: &str, payload: &[u8]) -> Result<ReplayEvent> {
        let event = ReplayEvent {
            id: format!("{}_{}", self.name, self.event_count),
            group: group.to_string(),
            time_seconds: self.stamp(),
            meta: meta.to_string(),
            payload: payload.to_vec(),
        };
        check_len("event id", event.id.len(), MAX_STRING_LEN)?;
        check_len("event group", event.group.len(), MAX_STRING_LEN)?;
        check_len("event meta", event.meta.len(), MAX_STRING_LEN)?;

        let mut bytes = Vec::new();
        encode_event_into(&mut bytes, &event);
        check_len("event record", bytes.len() - RECORD_PREFIX, self.max_record_size)?;
        self.streams
            .events
            .append(&bytes)
            .context("Failed to write event")?;
        self.event_count += 1;
        Ok(event)
    }

    /// One recorder tick
    pub fn tick(&mut self, delta: f64, tables: &mut ObjectTables) -> Result<Vec<DriverEvent>> {
        let mut events = Vec::new();
        if self.paused {
            return Ok(events);
        }

        let started = Instant::now();
        if self.clock.advance(delta) {
            events.push(DriverEvent::TimeUpdated {
                seconds: self.clock.coarse_seconds(),
            });
        }

        let now = self.stamp();
        if let (Some(interval), Some(last)) = (self.record_interval, self.last_frame_time) {
            if now - last < interval {
                return Ok(events);
            }
        }
        self.last_frame_time = Some(now);

        self.write_frames(now)?;
        self.write_external(now)?;
        if let Some(seconds) = self.run_checkpoints(now, tables)? {
            events.push(DriverEvent::CheckpointSaved { seconds });
        }

        self.stats.record(started.elapsed());
        Ok(events)
    }

    fn write_frames(&mut self, now: f64) -> Result<()> {
        self.frame_buffer.clear();
        while let Some(payload) = self.source.poll_outbound() {
            if payload.len() > self.max_frame_size {
                self.dropped_frames += 1;
                tracing::error!(
                    "Dropping {}-byte payload larger than max frame size {}",
                    payload.len(),
                    self.max_frame_size
                );
                continue;
            }
            encode_frame_into(&mut self.frame_buffer, &payload, now as f32);
            self.frame_count += 1;
        }
        if !self.frame_buffer.is_empty() {
            self.streams
                .frames
                .append(&self.frame_buffer)
                .context("Failed to write frames")?;
        }
        Ok(())
    }

    fn write_external(&mut self, now: f64) -> Result<()> {
        if self.pending_external.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::new();
        for (key, payload) in self.pending_external.drain(..) {
            encode_external_into(&mut bytes, &ExternalDataRecord::new(key, payload, now as f32));
        }
        self.streams
            .external
            .append(&bytes)
            .context("Failed to write external data")
    }

    fn run_checkpoints(&mut self, now: f64, tables: &mut ObjectTables) -> Result<Option<f64>> {
        if !self.manager.is_active() {
            let due = self.enable_checkpoints
                && now - self.last_checkpoint_time >= self.checkpoint_interval;
            if !(due || self.checkpoint_requested) {
                return Ok(None);
            }
            self.checkpoint_requested = false;
            self.last_checkpoint_time = now;
            self.manager.begin_checkpoint(tables, now)?;
        }

        let record = match self.manager.tick_checkpoint(
            tables,
            self.source.as_mut(),
            now,
            self.streams.frames.len(),
            self.streams.external.len(),
        ) {
            Some(record) => record,
            None => return Ok(None),
        };

        let bytes = encode_checkpoint(&record);
        let offset = self.streams.checkpoints.len();
        if let Err(e) = self.streams.checkpoints.append(&bytes) {
            tracing::warn!("Discarding checkpoint at {:.3}s: {}", now, e);
            self.manager.discard_completed();
            return Ok(None);
        }
        self.catalog
            .insert(CatalogEntry::from_record(&record, offset, bytes.len() as u64));
        Ok(Some(record.taken_at_seconds))
    }

    /// Close the recording and write its metadata footer
    pub fn finish(mut self, tables: &mut ObjectTables) -> Result<SessionMetadata> {
        self.manager.abort(tables);
        let metadata = SessionMetadata::now(
            self.frame_count,
            self.stamp() as f32,
            self.catalog.len() as u32,
        );
        for stream in [
            &mut self.streams.frames,
            &mut self.streams.external,
            &mut self.streams.checkpoints,
            &mut self.streams.events,
        ] {
            stream.flush().context("Failed to flush recording")?;
        }
        self.streams
            .metadata
            .append(&encode_metadata(&metadata))
            .context("Failed to write metadata")?;
        self.streams.metadata.flush()?;

        tracing::info!(
            "Recording {} stopped: {} frames ({} dropped), {:.3}s, {} checkpoints",
            self.name,
            metadata.num_frames,
            self.dropped_frames,
            metadata.total_time_seconds,
            metadata.checkpoint_count
        );
        Ok(metadata)
    }
}
