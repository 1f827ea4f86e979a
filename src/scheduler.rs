//! Deferred work requested by the recognizer
//!
//! The recognizer never sleeps or reads a clock. It asks its scheduler to run a
//! [`Task`] at an absolute point on the host's monotonic timeline, and the host
//! hands the task back through `GestureRecognizer::on_task` when it is due.
//! Stale tasks (cancelled, or belonging to a finished session) are dropped by
//! the recognizer, so a scheduler that cannot cancel is still correct.

use std::time::{Duration, Instant};

/// Interval between inertia frames (~60fps)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Single-owner handle for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

/// Work the recognizer can defer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Long-press check for the given session
    LongPress { session: u64 },
    /// One frame of the inertia loop
    InertiaFrame,
}

pub trait Scheduler {
    /// Run `task` at `deadline` (time since the host epoch)
    fn schedule(&mut self, deadline: Duration, task: Task) -> TaskHandle;

    /// Drop a pending task; unknown or already-run handles are ignored
    fn cancel(&mut self, handle: TaskHandle);
}

/// Host-side monotonic clock producing timestamps for events
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
