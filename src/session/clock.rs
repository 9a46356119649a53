//! Session clock

/// Logical session time.
///
/// The fine value drives frame dispatch. The coarse value only changes on
/// whole-second boundaries and exists so observers are not notified every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionClock {
    current: f64,
    coarse: f32,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fine-grained time in seconds
    #[inline]
    pub fn current_seconds(&self) -> f64 {
        self.current
    }

    /// Whole-second time used for observer throttling
    #[inline]
    pub fn coarse_seconds(&self) -> f32 {
        self.coarse
    }

    /// Move forward by `delta` seconds. Negative or NaN deltas are ignored.
    ///
    /// Returns true when the coarse value changed.
    pub fn advance(&mut self, delta: f64) -> bool {
        if delta > 0.0 {
            self.set(self.current + delta)
        } else {
            false
        }
    }

    /// Jump to an absolute time (used by seeks). Returns true when the coarse value changed.
    pub fn set(&mut self, seconds: f64) -> bool {
        self.current = if seconds.is_finite() { seconds.max(0.0) } else { self.current };
        let coarse = self.current.floor() as f32;
        let changed = coarse != self.coarse;
        self.coarse = coarse;
        changed
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
