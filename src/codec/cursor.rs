//! Little-endian primitives over in-memory buffers

use crate::error::FormatError;

/// Longest string accepted in headers and events
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Writer-side counterpart of the length limits the readers enforce
pub fn check_len(what: &str, len: usize, limit: usize) -> Result<(), FormatError> {
    if len > limit {
        return Err(FormatError::Oversized {
            what: what.to_string(),
            len,
            limit,
        });
    }
    Ok(())
}

// ── Primitive writers ───────────────────────────────────────────

#[inline]
pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn put_str(out: &mut Vec<u8>, s: &str) {
    put_bytes(out, s.as_bytes());
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    put_u32(out, b.len() as u32);
    out.extend_from_slice(b);
}

// ── Reader ──────────────────────────────────────────────────────

/// Read position over a borrowed byte buffer.
///
/// Reads never allocate more than the buffer already holds: every length is
/// checked against the remaining bytes before anything is copied.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Run `f`, restoring the position if it fails.
    pub fn restartable<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FormatError>,
    ) -> Result<T, FormatError> {
        let start = self.pos;
        let result = f(self);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Borrow the next `n` bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let available = self.remaining();
        if n > available {
            return Err(FormatError::Truncated {
                needed: n,
                available,
            });
        }
        let buf: &'a [u8] = self.buf;
        let slice = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        self.take_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, FormatError> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, FormatError> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Read a length-prefixed byte array no longer than `max_len`
    pub fn read_bytes(&mut self, max_len: usize) -> Result<Vec<u8>, FormatError> {
        let len = self.read_u32()? as usize;
        if len > max_len {
            return Err(FormatError::Corrupt(format!(
                "length {} exceeds limit {}",
                len, max_len
            )));
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_str(&mut self) -> Result<String, FormatError> {
        let bytes = self.read_bytes(MAX_STRING_LEN)?;
        String::from_utf8(bytes)
            .map_err(|e| FormatError::Corrupt(format!("invalid UTF-8 string: {}", e)))
    }
}

/// Parse a length-delimited unit whose bytes are all present.
///
/// Inside a complete unit, running out of bytes means the unit lies about its
/// own contents, so truncation is reported as corruption.
pub(crate) fn parse_unit<T>(
    unit: &[u8],
    what: &str,
    f: impl FnOnce(&mut ByteCursor<'_>) -> Result<T, FormatError>,
) -> Result<T, FormatError> {
    let mut cursor = ByteCursor::new(unit);
    let value = f(&mut cursor).map_err(|e| match e {
        FormatError::Truncated { needed, available } => FormatError::Corrupt(format!(
            "{} overruns its declared size (needed {} more bytes, {} left)",
            what, needed, available
        )),
        other => other,
    })?;
    if !cursor.is_at_end() {
        return Err(FormatError::Corrupt(format!(
            "{} has {} trailing bytes",
            what,
            cursor.remaining()
        )));
    }
    Ok(value)
}
