//! Length-prefixed record envelopes for checkpoints and events
//!
//! ```text
//! checkpoint: size u32 | taken_at f64 | frame_offset u64 | external_offset u64 |
//!             count u32 | (object u32 | len u32 | bytes)* | xxh32 u32
//! event:      size u32 | time f64 | id str | group str | meta str | data bytes
//! ```
//!
//! `size` counts everything after the prefix. The checkpoint checksum covers
//! the body between the prefix and the checksum itself.

use std::collections::BTreeMap;

use xxhash_rust::xxh32::xxh32;

use super::cursor::{parse_unit, put_bytes, put_f64, put_str, put_u32, put_u64, ByteCursor};
use crate::error::FormatError;
use crate::session::ReplayEvent;
use crate::types::ObjectId;

/// Bytes of the size prefix in front of every record
pub const RECORD_PREFIX: usize = 4;

/// Seed for checkpoint checksums
const CHECKSUM_SEED: u32 = 0;

/// A checkpoint as stored: resume positions plus per-object state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckpointRecord {
    pub taken_at_seconds: f64,
    /// Byte offset into the frame stream of the first frame after the checkpoint
    pub frame_offset: u64,
    /// Byte offset into the external stream of the first record after the checkpoint
    pub external_offset: u64,
    pub objects: BTreeMap<ObjectId, Vec<u8>>,
}

fn read_unit<'a>(
    cursor: &mut ByteCursor<'a>,
    max_size: usize,
    what: &str,
) -> Result<&'a [u8], FormatError> {
    let size = cursor.read_u32()? as usize;
    if size > max_size {
        return Err(FormatError::Corrupt(format!(
            "{} size {} exceeds maximum {}",
            what, size, max_size
        )));
    }
    cursor.take(size)
}

fn finish_unit(out: &mut Vec<u8>, start: usize) {
    let size = (out.len() - start - RECORD_PREFIX) as u32;
    out[start..start + RECORD_PREFIX].copy_from_slice(&size.to_le_bytes());
}

/// Append an encoded checkpoint record to `out`
pub fn encode_checkpoint_into(out: &mut Vec<u8>, record: &CheckpointRecord) {
    let start = out.len();
    put_u32(out, 0);
    let body_start = out.len();

    put_f64(out, record.taken_at_seconds);
    put_u64(out, record.frame_offset);
    put_u64(out, record.external_offset);
    put_u32(out, record.objects.len() as u32);
    for (id, state) in &record.objects {
        put_u32(out, id.0);
        put_bytes(out, state);
    }

    let checksum = xxh32(&out[body_start..], CHECKSUM_SEED);
    put_u32(out, checksum);
    finish_unit(out, start);
}

/// Encode a checkpoint record
pub fn encode_checkpoint(record: &CheckpointRecord) -> Vec<u8> {
    let mut out = Vec::new();
    encode_checkpoint_into(&mut out, record);
    out
}

/// Decode a checkpoint record and verify its checksum.
///
/// Restartable: a partially written record yields `Truncated` with the
/// cursor left at the record start.
pub fn decode_checkpoint(
    cursor: &mut ByteCursor<'_>,
    max_size: usize,
) -> Result<CheckpointRecord, FormatError> {
    cursor.restartable(|c| {
        let unit = read_unit(c, max_size, "checkpoint")?;
        if unit.len() < 4 {
            return Err(FormatError::Corrupt(
                "checkpoint record too short for checksum".into(),
            ));
        }
        let (body, trailer) = unit.split_at(unit.len() - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(trailer);
        let stored = u32::from_le_bytes(stored);
        let actual = xxh32(body, CHECKSUM_SEED);
        if stored != actual {
            return Err(FormatError::Corrupt(format!(
                "checkpoint checksum mismatch: stored 0x{:08X}, computed 0x{:08X}",
                stored, actual
            )));
        }

        parse_unit(body, "checkpoint", |b| {
            let taken_at_seconds = b.read_f64()?;
            if !taken_at_seconds.is_finite() || taken_at_seconds < 0.0 {
                return Err(FormatError::Corrupt(format!(
                    "checkpoint time {} is invalid",
                    taken_at_seconds
                )));
            }
            let frame_offset = b.read_u64()?;
            let external_offset = b.read_u64()?;
            let count = b.read_u32()? as usize;
            let mut objects = BTreeMap::new();
            for _ in 0..count {
                let id = ObjectId(b.read_u32()?);
                let state = b.read_bytes(body.len())?;
                if objects.insert(id, state).is_some() {
                    return Err(FormatError::Corrupt(format!(
                        "checkpoint saves {} twice",
                        id
                    )));
                }
            }
            Ok(CheckpointRecord {
                taken_at_seconds,
                frame_offset,
                external_offset,
                objects,
            })
        })
    })
}

/// Append an encoded event record to `out`
pub fn encode_event_into(out: &mut Vec<u8>, event: &ReplayEvent) {
    let start = out.len();
    put_u32(out, 0);
    put_f64(out, event.time_seconds);
    put_str(out, &event.id);
    put_str(out, &event.group);
    put_str(out, &event.meta);
    put_bytes(out, &event.payload);
    finish_unit(out, start);
}

/// Encode an event record
pub fn encode_event(event: &ReplayEvent) -> Vec<u8> {
    let mut out = Vec::new();
    encode_event_into(&mut out, event);
    out
}

/// Decode an event record, with the same restart contract as [`decode_checkpoint`]
pub fn decode_event(cursor: &mut ByteCursor<'_>, max_size: usize) -> Result<ReplayEvent, FormatError> {
    cursor.restartable(|c| {
        let unit = read_unit(c, max_size, "event")?;
        parse_unit(unit, "event", |b| {
            Ok(ReplayEvent {
                time_seconds: b.read_f64()?,
                id: b.read_str()?,
                group: b.read_str()?,
                meta: b.read_str()?,
                payload: b.read_bytes(unit.len())?,
            })
        })
    })
}
