//! Binary encode/decode for recordings.
//!
//! All integers are little-endian. Strings and byte arrays are length-prefixed
//! with a `u32`. The codec never touches storage: it reads from a
//! [`ByteCursor`] over bytes the caller already fetched and writes into
//! `Vec<u8>` buffers the caller appends.
//!
//! # Streams
//!
//! | Stream | Envelope |
//! |---|---|
//! | header | [`encode_header`] / [`decode_header`] |
//! | frames | [`encode_frame`] / [`decode_frame`] |
//! | external | [`encode_external`] / [`decode_external`] |
//! | checkpoints | [`encode_checkpoint`] / [`decode_checkpoint`] |
//! | events | [`encode_event`] / [`decode_event`] |
//! | meta | [`encode_metadata`] / [`decode_metadata`] |
//!
//! Every stream decoder is restartable: a trailing unit that is not fully
//! written yet yields [`FormatError::Truncated`](crate::error::FormatError)
//! and leaves the cursor where that unit starts.

mod cursor;
mod frame;
mod header;
mod records;

pub use cursor::*;
pub use frame::*;
pub use header::*;
pub use records::*;
