//! Offline inspection of stored recordings
//!
//! Used by the `netdemo` command line tool. Everything here reads the
//! streams directly and never touches a [`DemoDriver`](crate::DemoDriver).

use serde::Serialize;

use crate::checkpoint::CheckpointCatalog;
use crate::codec::{decode_header, decode_metadata, FRAME_OVERHEAD};
use crate::config::DemoConfig;
use crate::error::{Result, ResultExt};
use crate::session::{ReplayEvent, SessionHeader, SessionMetadata};
use crate::storage::{
    CheckpointStream, EventStream, ExternalStream, FrameStream, ReplayStorage, StreamKind,
    StreamRead,
};

/// One frame as stored
#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub index: usize,
    pub offset: u64,
    pub time_seconds: f32,
    pub payload_len: usize,
}

/// One catalogued checkpoint
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub index: usize,
    pub taken_at_seconds: f64,
    pub frame_offset: u64,
    pub external_offset: u64,
    pub record_bytes: u64,
    pub objects: usize,
}

/// Overview of a recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    pub name: String,
    pub header: SessionHeader,
    pub metadata: Option<SessionMetadata>,
    pub frames: usize,
    pub frame_bytes: u64,
    pub first_frame_seconds: Option<f32>,
    pub last_frame_seconds: Option<f32>,
    pub external_records: usize,
    pub checkpoints: usize,
    pub events: usize,
    /// Frame stream ends in a partially written frame
    pub truncated: bool,
}

impl RecordingSummary {
    pub fn is_finalized(&self) -> bool {
        self.metadata.is_some()
    }
}

/// Read-only view of one recording
pub struct Inspector<'a> {
    storage: &'a mut dyn ReplayStorage,
    config: &'a DemoConfig,
    name: String,
}

impl<'a> Inspector<'a> {
    pub fn new(storage: &'a mut dyn ReplayStorage, config: &'a DemoConfig, name: &str) -> Self {
        Self {
            storage,
            config,
            name: name.to_string(),
        }
    }

    fn stream(&self, kind: StreamKind) -> String {
        kind.stream_name(&self.name)
    }

    pub fn header(&mut self) -> Result<SessionHeader> {
        let stream = self.stream(StreamKind::Header);
        let bytes = self.storage.open_for_read(&stream)?.read_all()?;
        decode_header(&bytes).with_context(|| format!("Bad header in {}", stream))
    }

    pub fn metadata(&mut self) -> Result<Option<SessionMetadata>> {
        let stream = self.stream(StreamKind::Metadata);
        if !self.storage.exists(&stream) {
            return Ok(None);
        }
        let bytes = self.storage.open_for_read(&stream)?.read_all()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            decode_metadata(&bytes).with_context(|| format!("Bad metadata in {}", stream))?,
        ))
    }

    /// Every complete frame, plus whether the stream ends mid-frame
    pub fn frames(&mut self) -> Result<(Vec<FrameSummary>, bool)> {
        let stream = self.stream(StreamKind::Frames);
        let reader = self.storage.open_for_read(&stream)?;
        let mut frames = FrameStream::new(
            reader,
            stream,
            self.config.max_frame_size,
            self.config.lossy_playback,
        );

        let mut out = Vec::new();
        loop {
            let offset = frames.offset();
            match frames.next_frame()? {
                StreamRead::Item(frame) => out.push(FrameSummary {
                    index: out.len(),
                    offset,
                    time_seconds: frame.playback_time_seconds,
                    payload_len: frame.payload.len(),
                }),
                StreamRead::End => return Ok((out, false)),
                StreamRead::Incomplete => return Ok((out, true)),
            }
        }
    }

    pub fn external_record_count(&mut self) -> Result<usize> {
        let stream = self.stream(StreamKind::External);
        if !self.storage.exists(&stream) {
            return Ok(0);
        }
        let reader = self.storage.open_for_read(&stream)?;
        let mut records = ExternalStream::new(reader, stream, self.config.max_frame_size);
        let mut count = 0;
        while let StreamRead::Item(_) = records.next_record()? {
            count += 1;
        }
        Ok(count)
    }

    pub fn checkpoints(&mut self) -> Result<Vec<CheckpointSummary>> {
        let stream = self.stream(StreamKind::Checkpoints);
        if !self.storage.exists(&stream) {
            return Ok(Vec::new());
        }
        let reader = self.storage.open_for_read(&stream)?;
        let mut records = CheckpointStream::new(reader, stream, self.config.max_checkpoint_size);
        let mut catalog = CheckpointCatalog::new();
        catalog.refresh(&mut records)?;

        let mut out = Vec::with_capacity(catalog.len());
        for (index, entry) in catalog.entries().iter().enumerate() {
            out.push(CheckpointSummary {
                index,
                taken_at_seconds: entry.taken_at(),
                frame_offset: entry.frame_offset,
                external_offset: entry.external_offset,
                record_bytes: entry.record_len,
                objects: entry.checkpoint.saved_object_set.len(),
            });
        }
        Ok(out)
    }

    /// Side-channel events, optionally limited to one group
    pub fn events(&mut self, group: Option<&str>) -> Result<Vec<ReplayEvent>> {
        let stream = self.stream(StreamKind::Events);
        if !self.storage.exists(&stream) {
            return Ok(Vec::new());
        }
        let reader = self.storage.open_for_read(&stream)?;
        let mut events = EventStream::new(reader, stream, self.config.max_checkpoint_size).read_all()?;
        if let Some(group) = group {
            events.retain(|e| e.group == group);
        }
        Ok(events)
    }

    pub fn summary(&mut self) -> Result<RecordingSummary> {
        let header = self.header()?;
        let metadata = self.metadata()?;
        let (frames, truncated) = self.frames()?;
        let frame_bytes: u64 = frames
            .iter()
            .map(|f| f.payload_len as u64 + FRAME_OVERHEAD as u64)
            .sum();

        Ok(RecordingSummary {
            name: self.name.clone(),
            header,
            metadata,
            frames: frames.len(),
            frame_bytes,
            first_frame_seconds: frames.first().map(|f| f.time_seconds),
            last_frame_seconds: frames.last().map(|f| f.time_seconds),
            external_records: self.external_record_count()?,
            checkpoints: self.checkpoints()?.len(),
            events: self.events(None)?.len(),
            truncated,
        })
    }
}
