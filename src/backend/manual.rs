//! Deterministic scheduler driven by event timestamps
//!
//! Nothing runs until the owner advances time. Used for trace replay and tests.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::input::{Disposition, GestureRecognizer, PointerEvent, WheelEvent};
use crate::scheduler::{Scheduler, Task, TaskHandle};

#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_handle: u64,
    pending: BTreeMap<(Duration, TaskHandle), Task>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the earliest task due at or before `now`
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, TaskHandle, Task)> {
        let (&(deadline, handle), _) = self.pending.first_key_value()?;
        if deadline > now {
            return None;
        }
        let task = self.pending.remove(&(deadline, handle))?;
        Some((deadline, handle, task))
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, deadline: Duration, task: Task) -> TaskHandle {
        self.next_handle += 1;
        let handle = TaskHandle(self.next_handle);
        self.pending.insert((deadline, handle), task);
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.pending.retain(|(_, h), _| *h != handle);
    }
}

impl GestureRecognizer<ManualScheduler> {
    /// Run every task due at or before `now`, each at its own deadline.
    /// Returns the number of tasks run.
    pub fn advance_to(&mut self, now: Duration) -> usize {
        let mut ran = 0;
        while let Some((deadline, handle, task)) = self.scheduler_mut().pop_due(now) {
            self.on_task(handle, task, deadline);
            ran += 1;
        }
        ran
    }

    /// Catch up on timers, then handle the event
    pub fn feed(&mut self, event: PointerEvent) -> Disposition {
        self.advance_to(event.time);
        self.handle_pointer(event)
    }

    pub fn feed_wheel(&mut self, event: WheelEvent) -> Disposition {
        self.advance_to(event.time);
        self.handle_wheel(event)
    }

    /// Run until nothing is pending
    pub fn settle(&mut self) -> usize {
        let mut ran = 0;
        while let Some(deadline) = self.scheduler().next_deadline() {
            ran += self.advance_to(deadline);
        }
        ran
    }
}
