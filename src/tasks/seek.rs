//! Seek and checkpoint-load tasks

use std::time::Instant;

use super::Step;
use crate::checkpoint::CatalogEntry;
use crate::driver::PlaybackCore;
use crate::error::{CheckpointError, DemoError};

/// Progress of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPhase {
    /// Pick the checkpoint to restore
    Select,
    /// Hand the checkpoint to the sink
    Restore,
    /// Replay frames from the checkpoint up to the target
    FastForward,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    /// Latest complete checkpoint at or before the target
    Nearest,
    /// A specific catalog entry plus extra time past it
    Checkpoint { index: usize, skip_extra: f64 },
}

/// Restore a checkpoint and fast-forward to a target time.
///
/// If anything fails, playback goes back to where it was before the seek
/// started (or before the unfinished seek it replaced) and carries on from
/// there. When the sink cannot be brought back the core reports lost sync
/// and the driver stops playback.
#[derive(Debug, Clone)]
pub struct SeekTask {
    requested: f64,
    anchor: Anchor,
    phase: SeekPhase,
    target: f64,
    entry: Option<CatalogEntry>,
    previous_time: Option<f64>,
    started: Option<Instant>,
}

impl SeekTask {
    /// Seek to an absolute time
    pub fn to_time(seconds: f64) -> Self {
        Self::new(seconds, Anchor::Nearest)
    }

    /// Load catalog entry `index`, then play `skip_extra_seconds` past it
    pub fn from_checkpoint(index: usize, skip_extra_seconds: f64) -> Self {
        Self::new(
            skip_extra_seconds,
            Anchor::Checkpoint {
                index,
                skip_extra: skip_extra_seconds.max(0.0),
            },
        )
    }

    fn new(requested: f64, anchor: Anchor) -> Self {
        Self {
            requested,
            anchor,
            phase: SeekPhase::Select,
            target: 0.0,
            entry: None,
            previous_time: None,
            started: None,
        }
    }

    pub fn phase(&self) -> SeekPhase {
        self.phase
    }

    /// The time the caller asked for
    pub fn requested_target(&self) -> f64 {
        self.requested
    }

    /// Playback time to fall back to if the seek fails, once known
    pub fn previous_time(&self) -> Option<f64> {
        self.previous_time
    }

    fn fail(&mut self, core: &mut PlaybackCore, err: DemoError) -> Step {
        if let Some(previous) = self.previous_time {
            match core.rewind_to(previous) {
                Ok(()) => tracing::warn!(
                    "Seek to {:.3}s failed, staying at {:.3}s: {}",
                    self.requested,
                    previous,
                    err
                ),
                Err(rewind) => {
                    tracing::error!(
                        "Seek to {:.3}s failed ({}) and playback could not return to {:.3}s: {}",
                        self.requested,
                        err,
                        previous,
                        rewind
                    );
                    core.mark_lost_sync(rewind.with_context(format!(
                        "Could not return to {:.3}s after a failed seek",
                        previous
                    )));
                }
            }
        }
        core.end_scrub();
        self.phase = SeekPhase::Finished;
        Step::Done(Err(err))
    }

    fn select(&mut self, core: &mut PlaybackCore) -> Result<(), DemoError> {
        self.previous_time = Some(core.begin_scrub());
        self.started = Some(Instant::now());
        if let Err(e) = core.refresh_catalog() {
            tracing::warn!("Could not refresh checkpoint catalog: {}", e);
        }

        match self.anchor {
            Anchor::Nearest => {
                self.target = core.resolve_seek_target(self.requested);
                self.entry = core.select_checkpoint(self.target);
            }
            Anchor::Checkpoint { index, skip_extra } => {
                let entry = core.checkpoint_entry(index).ok_or_else(|| {
                    CheckpointError::NotFound(format!("checkpoint index {}", index))
                })?;
                self.target = core.resolve_seek_target(entry.taken_at() + skip_extra);
                self.requested = self.target;
                self.entry = Some(entry);
            }
        }

        tracing::debug!(
            "Seeking to {:.3}s from {:.3}s via {}",
            self.target,
            core.current_time(),
            match &self.entry {
                Some(entry) => format!("checkpoint at {:.3}s", entry.taken_at()),
                None => "start of recording".to_string(),
            }
        );
        Ok(())
    }

    pub(crate) fn step(&mut self, core: &mut PlaybackCore) -> Step {
        if self.phase == SeekPhase::Select {
            if let Err(e) = self.select(core) {
                return self.fail(core, e);
            }
            self.phase = SeekPhase::Restore;
        }

        if self.phase == SeekPhase::Restore {
            if let Err(e) = core.restore(self.entry.as_ref()) {
                return self.fail(core, e);
            }
            self.phase = SeekPhase::FastForward;
        }

        if self.phase == SeekPhase::FastForward {
            let batch = core.fast_forward_batch();
            match core.fast_forward_step(self.target, batch) {
                Ok(true) => {}
                Ok(false) => return Step::Continue,
                Err(e) => return self.fail(core, e),
            }
            core.finish_fast_forward();
            self.phase = SeekPhase::Finished;

            let elapsed_ms = self
                .started
                .map(|s| s.elapsed().as_secs_f64() * 1000.0)
                .unwrap_or_default();
            tracing::info!(
                "Seek to {:.3}s finished in {:.2}ms",
                core.current_time(),
                elapsed_ms
            );
            core.end_scrub();
            core.mark_scrub_complete(core.current_time());
            return Step::Done(Ok(()));
        }

        Step::Done(Ok(()))
    }
}
