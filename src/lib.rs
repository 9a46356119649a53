//! # NetDemo-RS: Network Session Recorder
//!
//! Records the outbound traffic of a simulation host to a set of append-only
//! streams and plays it back later, with checkpoints for fast seeking. The
//! host drives everything through [`DemoDriver`] and plugs in its own
//! transport via the [`RecordSource`] and [`PlaybackSink`] traits.
//!
//! ## Architecture
//!
//! - **Codec**: Binary layout of headers, frames, checkpoints and events
//! - **Storage**: Named append-only streams, on disk or in memory
//! - **Checkpoint**: Incremental object snapshots and the catalog used for seeking
//! - **Playback**: Read-ahead queue and per-object external data
//! - **Tasks**: Cooperative seek and checkpoint-load jobs, one active at a time
//! - **Driver**: Recording and playback state machine
//!
//! ## Configuration
//!
//! [`DemoConfig`] is read from TOML. Recordings default to the platform data
//! directory under `dev.hxyulin.netdemo-rs/demos`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.netdemo-rs/demos/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.netdemo-rs/demos/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.netdemo-rs\demos\`
//!
//! ## Example
//!
//! ```ignore
//! use netdemo_rs::{DemoConfig, DemoDriver, DirectoryStorage};
//!
//! fn main() -> netdemo_rs::Result<()> {
//!     let storage = DirectoryStorage::open_default()?;
//!     let mut driver = DemoDriver::new(DemoConfig::default(), storage);
//!
//!     driver.start_recording("match_01", "arena", Box::new(MyConnection::new()))?;
//!     for _ in 0..600 {
//!         driver.tick(1.0 / 60.0)?;
//!     }
//!     driver.stop()?;
//!
//!     driver.start_playback("match_01", Box::new(MyClient::new()))?;
//!     driver.seek_to(5.0, None)?;
//!     loop {
//!         driver.tick(1.0 / 60.0)?;
//!     }
//! }
//! ```

pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod inspect;
pub mod playback;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod types;

// Re-export commonly used types
pub use config::{DemoConfig, HeaderPolicy};
pub use connection::{PlaybackSink, RecordSource};
pub use driver::{DemoDriver, DriverEvent, DriverState, ListenerId, PlaybackCore};
pub use error::{DemoError, Result};
pub use session::{BuildInfo, ReplayEvent, SessionHeader, SessionMetadata};
pub use storage::{DirectoryStorage, MemoryStorage, ReplayStorage};
pub use tasks::{TaskOutcome, TaskDiscriminator};
pub use types::{DispatchMode, ExternalDataRecord, Frame, ObjectId};
