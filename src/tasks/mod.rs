//! Cooperative replay tasks
//!
//! Work that spans several ticks (seeking, loading a checkpoint, host-defined
//! jobs) is queued here and advanced one [`Step`] per driver tick.
//!
//! # Task types
//!
//! | Kind | Purpose |
//! |------|---------|
//! | `Seek` | Restore the nearest checkpoint at or before a time, then fast-forward to it |
//! | `LoadCheckpoint` | Restore a specific checkpoint, then fast-forward an extra amount |
//! | `Custom` | Host-provided [`CustomTask`] |
//!
//! Only one task is active at a time. A new seek supersedes any seek that is
//! active or queued; superseded seeks complete with [`TaskOutcome::Cancelled`].

mod seek;

pub use seek::{SeekPhase, SeekTask};

use std::collections::VecDeque;
use std::fmt;

use crate::driver::PlaybackCore;
use crate::error::{DemoError, Result};

/// Result of advancing a task by one tick
#[derive(Debug)]
pub enum Step {
    Continue,
    Done(Result<()>),
}

/// How a task ended, passed to its completion callback
#[derive(Debug)]
pub enum TaskOutcome {
    Completed,
    Failed(DemoError),
    Cancelled,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }
}

/// Single-shot completion callback
pub type DoneCallback = Box<dyn FnOnce(TaskOutcome) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Active,
    Done,
}

/// Task kind without its payload, for queue queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskDiscriminator {
    Seek,
    LoadCheckpoint,
    Custom,
}

/// Host-defined task
pub trait CustomTask: Send {
    /// Name for logs and diagnostics
    fn name(&self) -> &str;

    /// Advance the task; called once per tick while active
    fn step(&mut self, core: &mut PlaybackCore) -> Step;
}

pub enum TaskKind {
    Seek(SeekTask),
    LoadCheckpoint(SeekTask),
    Custom(Box<dyn CustomTask>),
}

impl TaskKind {
    pub fn discriminator(&self) -> TaskDiscriminator {
        match self {
            TaskKind::Seek(_) => TaskDiscriminator::Seek,
            TaskKind::LoadCheckpoint(_) => TaskDiscriminator::LoadCheckpoint,
            TaskKind::Custom(_) => TaskDiscriminator::Custom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TaskKind::Seek(_) => "Seek",
            TaskKind::LoadCheckpoint(_) => "LoadCheckpoint",
            TaskKind::Custom(task) => task.name(),
        }
    }

    /// Seeks replace one another instead of queueing up
    fn is_scrub(&self) -> bool {
        matches!(self, TaskKind::Seek(_) | TaskKind::LoadCheckpoint(_))
    }

    fn step(&mut self, core: &mut PlaybackCore) -> Step {
        match self {
            TaskKind::Seek(task) | TaskKind::LoadCheckpoint(task) => task.step(core),
            TaskKind::Custom(task) => task.step(core),
        }
    }
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Seek(task) | TaskKind::LoadCheckpoint(task) => {
                f.debug_tuple(self.name()).field(task).finish()
            }
            TaskKind::Custom(task) => write!(f, "Custom({})", task.name()),
        }
    }
}

/// A queued task and its completion callback
pub struct ReplayTask {
    kind: TaskKind,
    state: TaskState,
    on_done: Option<DoneCallback>,
}

impl ReplayTask {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            state: TaskState::Queued,
            on_done: None,
        }
    }

    pub fn seek(seconds: f64) -> Self {
        Self::new(TaskKind::Seek(SeekTask::to_time(seconds)))
    }

    pub fn load_checkpoint(index: usize, skip_extra_seconds: f64) -> Self {
        Self::new(TaskKind::LoadCheckpoint(SeekTask::from_checkpoint(
            index,
            skip_extra_seconds,
        )))
    }

    pub fn custom(task: Box<dyn CustomTask>) -> Self {
        Self::new(TaskKind::Custom(task))
    }

    /// Attach a completion callback
    pub fn on_done(mut self, callback: DoneCallback) -> Self {
        self.on_done = Some(callback);
        self
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn finish(mut self, outcome: TaskOutcome) {
        self.state = TaskState::Done;
        match &outcome {
            TaskOutcome::Completed => tracing::debug!("Task {} completed", self.kind.name()),
            TaskOutcome::Failed(e) => tracing::warn!("Task {} failed: {}", self.kind.name(), e),
            TaskOutcome::Cancelled => tracing::debug!("Task {} cancelled", self.kind.name()),
        }
        if let Some(callback) = self.on_done.take() {
            callback(outcome);
        }
    }
}

impl fmt::Debug for ReplayTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayTask")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("has_callback", &self.on_done.is_some())
            .finish()
    }
}

/// FIFO of replay tasks with at most one active
#[derive(Debug, Default)]
pub struct TaskQueue {
    active: Option<ReplayTask>,
    queued: VecDeque<ReplayTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Seeks cancel every seek already active or queued.
    pub fn enqueue(&mut self, task: ReplayTask) {
        if task.kind.is_scrub() {
            if self.active.as_ref().is_some_and(|t| t.kind.is_scrub()) {
                if let Some(superseded) = self.active.take() {
                    tracing::debug!("Superseding active {:?}", superseded.kind);
                    superseded.finish(TaskOutcome::Cancelled);
                }
            }
            let (scrubs, others): (VecDeque<_>, VecDeque<_>) =
                self.queued.drain(..).partition(|t| t.kind.is_scrub());
            self.queued = others;
            for superseded in scrubs {
                superseded.finish(TaskOutcome::Cancelled);
            }
        }

        self.queued.push_back(task);
        self.promote();
    }

    fn promote(&mut self) {
        if self.active.is_none() {
            if let Some(mut next) = self.queued.pop_front() {
                next.state = TaskState::Active;
                self.active = Some(next);
            }
        }
    }

    /// Step the active task once. Returns true while any work remains.
    pub fn tick(&mut self, core: &mut PlaybackCore) -> bool {
        self.promote();
        if let Some(task) = self.active.as_mut() {
            if let Step::Done(result) = task.kind.step(core) {
                if let Some(task) = self.active.take() {
                    task.finish(match result {
                        Ok(()) => TaskOutcome::Completed,
                        Err(e) => TaskOutcome::Failed(e),
                    });
                }
                self.promote();
            }
        }
        self.has_work()
    }

    /// Drop every task; callbacks receive [`TaskOutcome::Cancelled`]
    pub fn cancel_all(&mut self) {
        if let Some(task) = self.active.take() {
            task.finish(TaskOutcome::Cancelled);
        }
        for task in self.queued.drain(..) {
            task.finish(TaskOutcome::Cancelled);
        }
    }

    pub fn is_task_queued(&self, discriminator: TaskDiscriminator) -> bool {
        self.active
            .iter()
            .chain(self.queued.iter())
            .any(|t| t.kind.discriminator() == discriminator)
    }

    pub fn has_work(&self) -> bool {
        self.active.is_some() || !self.queued.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().count()
            + self
                .queued
                .iter()
                .filter(|t| t.state == TaskState::Active)
                .count()
    }

    pub fn len(&self) -> usize {
        self.active.iter().count() + self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_work()
    }

    /// Name of the active task, for diagnostics
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.kind.name())
    }

    /// Target of the active seek
    pub fn active_seek_target(&self) -> Option<f64> {
        match self.active.as_ref().map(|t| &t.kind) {
            Some(TaskKind::Seek(task)) | Some(TaskKind::LoadCheckpoint(task)) => {
                Some(task.requested_target())
            }
            _ => None,
        }
    }
}
