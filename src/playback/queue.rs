//! Queue of decoded frames waiting for the clock

use std::collections::VecDeque;

use crate::types::Frame;

/// Bounded FIFO of decoded-but-undispatched frames.
///
/// Frames leave in exactly the order they were pushed, including frames
/// that share a timestamp.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl PlaybackQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether read-ahead should stop
    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    pub fn has_pending(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Time of the newest queued frame
    pub fn last_time(&self) -> Option<f64> {
        self.frames.back().map(Frame::time)
    }

    /// Time of the next frame to dispatch
    pub fn front_time(&self) -> Option<f64> {
        self.frames.front().map(Frame::time)
    }

    /// Queue a frame read from storage
    pub fn push_decoded(&mut self, frame: Frame) {
        if let Some(last) = self.last_time() {
            if frame.time() < last {
                tracing::warn!(
                    "Frame at {:.3}s queued after frame at {:.3}s",
                    frame.time(),
                    last
                );
            }
        }
        self.frames.push_back(frame);
    }

    /// Drain, in push order, every frame due at `current_time`.
    ///
    /// Frames are removed lazily, so stopping the iterator early leaves the
    /// rest queued.
    pub fn pop_due(&mut self, current_time: f64) -> PopDue<'_> {
        PopDue {
            frames: &mut self.frames,
            current_time,
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Iterator returned by [`PlaybackQueue::pop_due`]
pub struct PopDue<'a> {
    frames: &'a mut VecDeque<Frame>,
    current_time: f64,
}

impl Iterator for PopDue<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.frames.front()?.time() <= self.current_time {
            self.frames.pop_front()
        } else {
            None
        }
    }
}
