//! Frame and external-record envelopes
//!
//! ```text
//! frame:    size u32 | payload[size] | time f32
//! external: size u32 | payload[size] | time f32 | object_key u32
//! ```

use super::cursor::{put_f32, put_u32, ByteCursor};
use crate::error::FormatError;
use crate::types::{ExternalDataRecord, Frame, ObjectId};

/// Bytes a frame envelope adds around its payload
pub const FRAME_OVERHEAD: usize = 8;

/// Bytes an external-record envelope adds around its payload
pub const EXTERNAL_OVERHEAD: usize = 12;

/// Append one encoded frame to `out`
pub fn encode_frame_into(out: &mut Vec<u8>, payload: &[u8], time: f32) {
    put_u32(out, payload.len() as u32);
    out.extend_from_slice(payload);
    put_f32(out, time);
}

/// Encode one frame
pub fn encode_frame(payload: &[u8], time: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    encode_frame_into(&mut out, payload, time);
    out
}

fn check_time(time: f32) -> Result<f32, FormatError> {
    if time.is_finite() && time >= 0.0 {
        Ok(time)
    } else {
        Err(FormatError::Corrupt(format!("invalid timestamp {}", time)))
    }
}

fn read_sized_payload(
    cursor: &mut ByteCursor<'_>,
    max_size: usize,
) -> Result<Vec<u8>, FormatError> {
    let size = cursor.read_u32()? as usize;
    if size > max_size {
        return Err(FormatError::Corrupt(format!(
            "frame size {} exceeds maximum {}",
            size, max_size
        )));
    }
    Ok(cursor.take(size)?.to_vec())
}

/// Decode one frame.
///
/// On any error the cursor is left at the start of the frame, so a
/// `Truncated` result can be retried once more bytes are available.
pub fn decode_frame(cursor: &mut ByteCursor<'_>, max_frame_size: usize) -> Result<Frame, FormatError> {
    cursor.restartable(|c| {
        let payload = read_sized_payload(c, max_frame_size)?;
        let time = check_time(c.read_f32()?)?;
        Ok(Frame::new(payload, time))
    })
}

/// Append one encoded external record to `out`
pub fn encode_external_into(out: &mut Vec<u8>, record: &ExternalDataRecord) {
    put_u32(out, record.payload.len() as u32);
    out.extend_from_slice(&record.payload);
    put_f32(out, record.timestamp_seconds);
    put_u32(out, record.object_key.0);
}

/// Encode one external record
pub fn encode_external(record: &ExternalDataRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(record.payload.len() + EXTERNAL_OVERHEAD);
    encode_external_into(&mut out, record);
    out
}

/// Decode one external record, with the same restart contract as [`decode_frame`]
pub fn decode_external(
    cursor: &mut ByteCursor<'_>,
    max_size: usize,
) -> Result<ExternalDataRecord, FormatError> {
    cursor.restartable(|c| {
        let payload = read_sized_payload(c, max_size)?;
        let time = check_time(c.read_f32()?)?;
        let key = ObjectId(c.read_u32()?);
        Ok(ExternalDataRecord::new(key, payload, time))
    })
}
