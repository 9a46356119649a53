//! Session header and metadata footer envelopes

use super::cursor::{check_len, put_f32, put_str, put_u32, put_u64, ByteCursor, MAX_STRING_LEN};
use crate::error::FormatError;
use crate::session::{
    SessionHeader, SessionMetadata, DEMO_FORMAT_VERSION, DEMO_MAGIC, METADATA_MAGIC,
    METADATA_VERSION,
};

/// Most extension fields a header may carry
pub const MAX_EXTENSION_FIELDS: usize = 1024;

/// Encoded size of the metadata footer
pub const METADATA_LEN: usize = 28;

/// Encode a session header.
///
/// Fails if a string or the extension list is larger than [`decode_header`]
/// accepts.
pub fn encode_header(header: &SessionHeader) -> Result<Vec<u8>, FormatError> {
    check_len("scene name", header.scene_name.len(), MAX_STRING_LEN)?;
    if header.extension_fields.len() > MAX_EXTENSION_FIELDS {
        return Err(FormatError::Oversized {
            what: "extension field list".to_string(),
            len: header.extension_fields.len(),
            limit: MAX_EXTENSION_FIELDS,
        });
    }
    for field in &header.extension_fields {
        check_len("extension field", field.len(), MAX_STRING_LEN)?;
    }

    let mut out = Vec::with_capacity(32 + header.scene_name.len());
    put_u32(&mut out, header.magic);
    put_u32(&mut out, header.format_version);
    put_u32(&mut out, header.content_checksum);
    put_u32(&mut out, header.protocol_version_a);
    put_u32(&mut out, header.protocol_version_b);
    put_u32(&mut out, header.build_id);
    put_str(&mut out, &header.scene_name);
    put_u32(&mut out, header.extension_fields.len() as u32);
    for field in &header.extension_fields {
        put_str(&mut out, field);
    }
    Ok(out)
}

/// Decode a session header, checking magic then version
pub fn decode_header(bytes: &[u8]) -> Result<SessionHeader, FormatError> {
    let mut cursor = ByteCursor::new(bytes);

    let magic = cursor.read_u32()?;
    if magic != DEMO_MAGIC {
        return Err(FormatError::BadMagic {
            expected: DEMO_MAGIC,
            found: magic,
        });
    }

    let format_version = cursor.read_u32()?;
    if format_version != DEMO_FORMAT_VERSION {
        return Err(FormatError::BadVersion {
            expected: DEMO_FORMAT_VERSION,
            found: format_version,
        });
    }

    let content_checksum = cursor.read_u32()?;
    let protocol_version_a = cursor.read_u32()?;
    let protocol_version_b = cursor.read_u32()?;
    let build_id = cursor.read_u32()?;
    let scene_name = cursor.read_str()?;

    let count = cursor.read_u32()? as usize;
    if count > MAX_EXTENSION_FIELDS {
        return Err(FormatError::Corrupt(format!(
            "header claims {} extension fields",
            count
        )));
    }
    let mut extension_fields = Vec::with_capacity(count);
    for _ in 0..count {
        extension_fields.push(cursor.read_str()?);
    }

    Ok(SessionHeader {
        magic,
        format_version,
        content_checksum,
        protocol_version_a,
        protocol_version_b,
        build_id,
        scene_name,
        extension_fields,
    })
}

/// Encode the metadata footer written when a recording stops
pub fn encode_metadata(meta: &SessionMetadata) -> Vec<u8> {
    let mut out = Vec::with_capacity(METADATA_LEN);
    put_u32(&mut out, METADATA_MAGIC);
    put_u32(&mut out, METADATA_VERSION);
    put_u32(&mut out, meta.num_frames);
    put_f32(&mut out, meta.total_time_seconds);
    put_u64(&mut out, meta.recorded_at_unix);
    put_u32(&mut out, meta.checkpoint_count);
    out
}

/// Decode the metadata footer
pub fn decode_metadata(bytes: &[u8]) -> Result<SessionMetadata, FormatError> {
    let mut cursor = ByteCursor::new(bytes);

    let magic = cursor.read_u32()?;
    if magic != METADATA_MAGIC {
        return Err(FormatError::BadMagic {
            expected: METADATA_MAGIC,
            found: magic,
        });
    }
    let version = cursor.read_u32()?;
    if version != METADATA_VERSION {
        return Err(FormatError::BadVersion {
            expected: METADATA_VERSION,
            found: version,
        });
    }

    let num_frames = cursor.read_u32()?;
    let total_time_seconds = cursor.read_f32()?;
    if !total_time_seconds.is_finite() || total_time_seconds < 0.0 {
        return Err(FormatError::Corrupt(format!(
            "metadata total time {} is not a valid duration",
            total_time_seconds
        )));
    }

    Ok(SessionMetadata {
        num_frames,
        total_time_seconds,
        recorded_at_unix: cursor.read_u64()?,
        checkpoint_count: cursor.read_u32()?,
    })
}
