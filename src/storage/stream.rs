//! Sequential decoders over stored streams
//!
//! Each stream is a run of length-prefixed units. [`UnitStream`] fetches one
//! complete unit at a time from a [`StreamReader`] and only moves past it once
//! every byte is present, so a stream that is still being recorded can be
//! polled again later from the same position.

use super::StreamReader;
use crate::codec::{
    decode_checkpoint, decode_event, decode_external, decode_frame, ByteCursor,
    CheckpointRecord, RECORD_PREFIX,
};
use crate::error::{DemoError, FormatError, Result};
use crate::session::ReplayEvent;
use crate::types::{ExternalDataRecord, Frame};

/// Outcome of polling a stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRead<T> {
    /// A complete unit was decoded
    Item(T),
    /// No bytes past the current position
    End,
    /// A unit has started but is not fully written yet
    Incomplete,
}

impl<T> StreamRead<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            StreamRead::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// Reader for `size u32 | body[size] | trailer` units
pub struct UnitStream {
    reader: Box<dyn StreamReader>,
    name: String,
    offset: u64,
    trailer: usize,
    max_size: usize,
}

impl UnitStream {
    pub fn new(
        reader: Box<dyn StreamReader>,
        name: impl Into<String>,
        trailer: usize,
        max_size: usize,
    ) -> Self {
        Self {
            reader,
            name: name.into(),
            offset: 0,
            trailer,
            max_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset of the next unit
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Continue reading from `offset` (must be a unit boundary)
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn stream_len(&mut self) -> Result<u64> {
        Ok(self.reader.len()?)
    }

    /// Total length of the unit at the current offset, if its prefix is present
    fn peek_unit_len(&mut self) -> Result<StreamRead<u64>> {
        let prefix = self.reader.read_at(self.offset, RECORD_PREFIX)?;
        if prefix.is_empty() {
            return Ok(StreamRead::End);
        }
        if prefix.len() < RECORD_PREFIX {
            return Ok(StreamRead::Incomplete);
        }
        let mut cursor = ByteCursor::new(&prefix);
        let size = cursor.read_u32()? as usize;
        Ok(StreamRead::Item(
            (RECORD_PREFIX + size + self.trailer) as u64,
        ))
    }

    /// Decode the next complete unit with `decode`
    pub fn next_with<T>(
        &mut self,
        decode: impl FnOnce(&mut ByteCursor<'_>) -> std::result::Result<T, FormatError>,
    ) -> Result<StreamRead<T>> {
        let start = self.offset;
        let total = match self.peek_unit_len()? {
            StreamRead::Item(total) => total,
            StreamRead::End => return Ok(StreamRead::End),
            StreamRead::Incomplete => return Ok(StreamRead::Incomplete),
        };
        let size = total as usize - RECORD_PREFIX - self.trailer;
        if size > self.max_size {
            return Err(FormatError::Corrupt(format!(
                "{} unit at offset {} claims {} bytes (limit {})",
                self.name, start, size, self.max_size
            ))
            .into());
        }

        let bytes = self.reader.read_at(start, total as usize)?;
        if (bytes.len() as u64) < total {
            return Ok(StreamRead::Incomplete);
        }

        self.offset = start + total;
        let mut cursor = ByteCursor::new(&bytes);
        let item = decode(&mut cursor).map_err(|e| {
            DemoError::from(e).with_context(format!("{} at offset {}", self.name, start))
        })?;
        Ok(StreamRead::Item(item))
    }

    /// Step over the unit at the current offset without decoding it.
    ///
    /// Returns false if the unit is not fully written yet.
    pub fn skip_unit(&mut self) -> Result<bool> {
        let total = match self.peek_unit_len()? {
            StreamRead::Item(total) => total,
            _ => return Ok(false),
        };
        if self.reader.len()? < self.offset + total {
            return Ok(false);
        }
        self.offset += total;
        Ok(true)
    }
}

fn is_corrupt(err: &DemoError) -> bool {
    matches!(err.root(), DemoError::Format(FormatError::Corrupt(_)))
}

/// Frames in recording order
pub struct FrameStream {
    units: UnitStream,
    max_frame_size: usize,
    lossy: bool,
    skipped: u64,
}

impl FrameStream {
    pub fn new(reader: Box<dyn StreamReader>, name: impl Into<String>, max_frame_size: usize, lossy: bool) -> Self {
        Self {
            units: UnitStream::new(reader, name, 4, max_frame_size),
            max_frame_size,
            lossy,
            skipped: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.units.offset()
    }

    pub fn seek(&mut self, offset: u64) {
        self.units.seek(offset);
    }

    /// Frames dropped by lossy playback so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn next_frame(&mut self) -> Result<StreamRead<Frame>> {
        loop {
            let max = self.max_frame_size;
            let start = self.units.offset();
            match self.units.next_with(|c| decode_frame(c, max)) {
                Err(e) if self.lossy && is_corrupt(&e) => {
                    // Oversized units are rejected before the offset moves
                    if self.units.offset() == start && !self.units.skip_unit()? {
                        return Ok(StreamRead::Incomplete);
                    }
                    self.skipped += 1;
                    tracing::warn!("Skipping unreadable frame: {}", e);
                }
                other => return other,
            }
        }
    }
}

/// External data records in recording order
pub struct ExternalStream {
    units: UnitStream,
    max_size: usize,
}

impl ExternalStream {
    pub fn new(reader: Box<dyn StreamReader>, name: impl Into<String>, max_size: usize) -> Self {
        Self {
            units: UnitStream::new(reader, name, 8, max_size),
            max_size,
        }
    }

    pub fn offset(&self) -> u64 {
        self.units.offset()
    }

    pub fn seek(&mut self, offset: u64) {
        self.units.seek(offset);
    }

    pub fn next_record(&mut self) -> Result<StreamRead<ExternalDataRecord>> {
        let max = self.max_size;
        self.units.next_with(|c| decode_external(c, max))
    }
}

/// Stored checkpoint together with where it lives in the stream
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedCheckpoint {
    pub record: CheckpointRecord,
    pub offset: u64,
    pub len: u64,
}

/// Checkpoint records in write order
pub struct CheckpointStream {
    units: UnitStream,
    max_size: usize,
}

impl CheckpointStream {
    pub fn new(reader: Box<dyn StreamReader>, name: impl Into<String>, max_size: usize) -> Self {
        Self {
            units: UnitStream::new(reader, name, 0, max_size),
            max_size,
        }
    }

    pub fn offset(&self) -> u64 {
        self.units.offset()
    }

    /// Next record. A corrupt record is stepped over and reported as an error.
    pub fn next_checkpoint(&mut self) -> Result<StreamRead<LocatedCheckpoint>> {
        let max = self.max_size;
        let start = self.units.offset();
        match self.units.next_with(|c| decode_checkpoint(c, max)) {
            Ok(StreamRead::Item(record)) => {
                let len = self.units.offset() - start;
                Ok(StreamRead::Item(LocatedCheckpoint {
                    record,
                    offset: start,
                    len,
                }))
            }
            Ok(StreamRead::End) => Ok(StreamRead::End),
            Ok(StreamRead::Incomplete) => Ok(StreamRead::Incomplete),
            Err(e) => {
                // next_with already moved past a unit whose body failed to decode
                if self.units.offset() == start {
                    self.units.skip_unit()?;
                }
                Err(e)
            }
        }
    }

    /// Re-read the record stored at `offset`
    pub fn read_at(&mut self, offset: u64) -> Result<CheckpointRecord> {
        let saved = self.units.offset();
        self.units.seek(offset);
        let max = self.max_size;
        let result = self.units.next_with(|c| decode_checkpoint(c, max));
        self.units.seek(saved);
        match result? {
            StreamRead::Item(record) => Ok(record),
            _ => Err(FormatError::Truncated {
                needed: RECORD_PREFIX,
                available: 0,
            }
            .into()),
        }
    }
}

/// Side-channel events in write order
pub struct EventStream {
    units: UnitStream,
}

impl EventStream {
    pub fn new(reader: Box<dyn StreamReader>, name: impl Into<String>, max_size: usize) -> Self {
        Self {
            units: UnitStream::new(reader, name, 0, max_size),
        }
    }

    /// Next event. A corrupt event is stepped over and reported as an error.
    pub fn next_event(&mut self) -> Result<StreamRead<ReplayEvent>> {
        let start = self.units.offset();
        // Size was already bounded by the unit reader
        match self.units.next_with(|c| decode_event(c, usize::MAX)) {
            Err(e) if is_corrupt(&e) => {
                if self.units.offset() == start && !self.units.skip_unit()? {
                    return Ok(StreamRead::Incomplete);
                }
                Err(e)
            }
            other => other,
        }
    }

    /// Every complete event, stopping quietly at a partial tail
    pub fn read_all(&mut self) -> Result<Vec<ReplayEvent>> {
        let mut events = Vec::new();
        while let StreamRead::Item(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Like [`read_all`](Self::read_all), but corrupt events are logged and skipped
    pub fn read_all_lenient(&mut self) -> Result<Vec<ReplayEvent>> {
        let mut events = Vec::new();
        loop {
            match self.next_event() {
                Ok(StreamRead::Item(event)) => events.push(event),
                Ok(StreamRead::End | StreamRead::Incomplete) => return Ok(events),
                Err(e) if is_corrupt(&e) => {
                    tracing::warn!("Skipping unreadable event: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
