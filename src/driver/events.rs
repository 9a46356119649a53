//! Persistent driver notifications

use std::fmt;

/// Notification sent to every registered listener
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Whole-second session time changed
    TimeUpdated { seconds: f32 },
    /// A seek finished successfully
    ScrubComplete { seconds: f64 },
    /// A finalized recording played to its end (sent once per session)
    PlaybackEnded,
    /// The recorder stored a checkpoint
    CheckpointSaved { seconds: f64 },
}

/// Handle returned by [`DemoDriver::add_listener`](super::DemoDriver::add_listener)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&DriverEvent) + Send>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn emit(&mut self, event: &DriverEvent) {
        tracing::trace!("Driver event {:?}", event);
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = DriverEvent>) {
        for event in events {
            self.emit(&event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
