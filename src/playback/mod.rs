//! Playback buffers
//!
//! - [`PlaybackQueue`]: frames decoded ahead of the clock
//! - [`ExternalDataChannel`]: per-object external data waiting for its time

mod external;
mod queue;

pub use external::ExternalDataChannel;
pub use queue::{PlaybackQueue, PopDue};
