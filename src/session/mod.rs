//! Session model
//!
//! Data that describes one recording independent of how it is stored:
//! the header and metadata footer, side-channel events, the session clock
//! and the object tables the recorder tracks for checkpoints.

mod clock;
mod objects;
mod types;

pub use clock::SessionClock;
pub use objects::ObjectTables;
pub use types::*;
