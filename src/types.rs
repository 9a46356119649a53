//! Core data types shared by the recorder and the player

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a replicated object, as assigned by the connection layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub const INVALID: ObjectId = ObjectId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "ObjectId(INVALID)")
        } else {
            write!(f, "ObjectId({})", self.0)
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One unit of recorded traffic: an opaque payload stamped with session time.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub playback_time_seconds: f32,
}

impl Frame {
    pub fn new(payload: impl Into<Vec<u8>>, playback_time_seconds: f32) -> Self {
        Self {
            payload: payload.into(),
            playback_time_seconds,
        }
    }

    /// Frame time widened for comparison against the fine clock
    #[inline]
    pub fn time(&self) -> f64 {
        self.playback_time_seconds as f64
    }
}

/// Opaque side-channel data attached to one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDataRecord {
    pub object_key: ObjectId,
    pub payload: Vec<u8>,
    pub timestamp_seconds: f32,
}

impl ExternalDataRecord {
    pub fn new(object_key: ObjectId, payload: impl Into<Vec<u8>>, timestamp_seconds: f32) -> Self {
        Self {
            object_key,
            payload: payload.into(),
            timestamp_seconds,
        }
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.timestamp_seconds as f64
    }
}

/// How a frame reaches the consumer.
///
/// Frames replayed while catching up to a seek target are delivered in
/// [`DispatchMode::FastForward`] so the consumer can suppress cosmetic
/// effects (sounds, particles, notifications) for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Live,
    FastForward,
}

impl DispatchMode {
    pub fn is_fast_forward(&self) -> bool {
        matches!(self, DispatchMode::FastForward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(7).to_string(), "ObjectId(7)");
        assert_eq!(ObjectId::INVALID.to_string(), "ObjectId(INVALID)");
        assert!(!ObjectId::INVALID.is_valid());
        assert!(ObjectId::default().is_valid());
    }

    #[test]
    fn test_frame_time_widening() {
        let frame = Frame::new(vec![1, 2, 3], 1.5);
        assert_eq!(frame.time(), 1.5);
        assert_eq!(frame.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_dispatch_mode_default_is_live() {
        assert_eq!(DispatchMode::default(), DispatchMode::Live);
        assert!(DispatchMode::FastForward.is_fast_forward());
    }
}
