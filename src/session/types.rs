//! Session data types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HeaderPolicy;
use crate::error::FormatError;

/// Magic number at the start of every header stream
pub const DEMO_MAGIC: u32 = 0x2CF5_A13D;

/// Current header/frame format version
pub const DEMO_FORMAT_VERSION: u32 = 4;

/// Magic number of the metadata footer
pub const METADATA_MAGIC: u32 = 0x3D06_B24E;

/// Current metadata footer version
pub const METADATA_VERSION: u32 = 0;

/// Build identity stamped into recordings and compared on playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub content_checksum: u32,
    pub protocol_version_a: u32,
    pub protocol_version_b: u32,
    pub build_id: u32,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            content_checksum: 0,
            protocol_version_a: 1,
            protocol_version_b: 1,
            build_id: 0,
        }
    }
}

/// Header written once at the start of a recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub magic: u32,
    pub format_version: u32,
    pub content_checksum: u32,
    pub protocol_version_a: u32,
    pub protocol_version_b: u32,
    pub build_id: u32,
    pub scene_name: String,
    pub extension_fields: Vec<String>,
}

impl SessionHeader {
    /// Create a header for a new recording made by `build`
    pub fn new(build: &BuildInfo, scene_name: impl Into<String>) -> Self {
        Self {
            magic: DEMO_MAGIC,
            format_version: DEMO_FORMAT_VERSION,
            content_checksum: build.content_checksum,
            protocol_version_a: build.protocol_version_a,
            protocol_version_b: build.protocol_version_b,
            build_id: build.build_id,
            scene_name: scene_name.into(),
            extension_fields: Vec::new(),
        }
    }

    /// Attach an extension field
    pub fn with_extension(mut self, field: impl Into<String>) -> Self {
        self.extension_fields.push(field.into());
        self
    }

    /// The build that made this recording
    pub fn build_info(&self) -> BuildInfo {
        BuildInfo {
            content_checksum: self.content_checksum,
            protocol_version_a: self.protocol_version_a,
            protocol_version_b: self.protocol_version_b,
            build_id: self.build_id,
        }
    }

    /// Compare the recording's build against the running one.
    ///
    /// Under [`HeaderPolicy::Lenient`] mismatches are logged and accepted.
    pub fn check_compatibility(
        &self,
        running: &BuildInfo,
        policy: HeaderPolicy,
    ) -> Result<(), FormatError> {
        let recorded = self.build_info();
        if recorded == *running {
            return Ok(());
        }

        let message = format!(
            "recorded with checksum 0x{:08X} protocol {}.{} build {}, running checksum 0x{:08X} protocol {}.{} build {}",
            recorded.content_checksum,
            recorded.protocol_version_a,
            recorded.protocol_version_b,
            recorded.build_id,
            running.content_checksum,
            running.protocol_version_a,
            running.protocol_version_b,
            running.build_id,
        );

        match policy {
            HeaderPolicy::Lenient => {
                tracing::warn!("Playing recording from a different build: {}", message);
                Ok(())
            }
            HeaderPolicy::Strict => Err(FormatError::Incompatible(message)),
        }
    }
}

/// Footer written when a recording stops; its presence marks the recording finalized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub num_frames: u32,
    pub total_time_seconds: f32,
    pub recorded_at_unix: u64,
    pub checkpoint_count: u32,
}

impl SessionMetadata {
    /// Stamp a footer with the current wall-clock time
    pub fn now(num_frames: u32, total_time_seconds: f32, checkpoint_count: u32) -> Self {
        Self {
            num_frames,
            total_time_seconds,
            recorded_at_unix: Utc::now().timestamp().max(0) as u64,
            checkpoint_count,
        }
    }

    /// When the recording was finalized
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.recorded_at_unix as i64, 0).single()
    }
}

/// Side-channel marker stored alongside the frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub id: String,
    pub group: String,
    pub time_seconds: f64,
    pub meta: String,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header_uses_current_format() {
        let header = SessionHeader::new(&BuildInfo::default(), "arena").with_extension("mode=ctf");
        assert_eq!(header.magic, DEMO_MAGIC);
        assert_eq!(header.format_version, DEMO_FORMAT_VERSION);
        assert_eq!(header.extension_fields, vec!["mode=ctf".to_string()]);
        assert_eq!(header.build_info(), BuildInfo::default());
    }

    #[test]
    fn test_compatibility_policies() {
        let header = SessionHeader::new(&BuildInfo::default(), "arena");
        let other = BuildInfo {
            build_id: 42,
            ..Default::default()
        };

        assert!(header
            .check_compatibility(&BuildInfo::default(), HeaderPolicy::Strict)
            .is_ok());
        assert!(header
            .check_compatibility(&other, HeaderPolicy::Lenient)
            .is_ok());
        assert!(matches!(
            header.check_compatibility(&other, HeaderPolicy::Strict),
            Err(FormatError::Incompatible(_))
        ));
    }

    #[test]
    fn test_metadata_timestamp() {
        let meta = SessionMetadata {
            num_frames: 3,
            total_time_seconds: 1.5,
            recorded_at_unix: 1_700_000_000,
            checkpoint_count: 1,
        };
        let at = meta.recorded_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);

        let now = SessionMetadata::now(1, 0.5, 0);
        assert!(now.recorded_at_unix > 1_600_000_000);
    }
}
