//! Realtime scheduler on a calloop event loop
//!
//! Every scheduled task becomes a one-shot `Timer` source. When it fires, the
//! callback reaches the recognizer through the loop data and hands the task
//! back with the firing time on the recognizer's timeline.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use tracing::warn;

use crate::input::GestureRecognizer;
use crate::scheduler::{Scheduler, Task, TaskHandle};

/// Loop data that owns a recognizer scheduled on the same loop
pub trait RecognizerHost: Sized + 'static {
    fn recognizer(&mut self) -> &mut GestureRecognizer<CalloopScheduler<Self>>;
}

pub struct CalloopScheduler<D: 'static> {
    handle: LoopHandle<'static, D>,
    epoch: Instant,
    next: u64,
    tokens: Rc<RefCell<HashMap<TaskHandle, RegistrationToken>>>,
}

impl<D: RecognizerHost> CalloopScheduler<D> {
    /// `epoch` must be the instant event timestamps are measured from
    pub fn new(handle: LoopHandle<'static, D>, epoch: Instant) -> Self {
        Self {
            handle,
            epoch,
            next: 0,
            tokens: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Number of timers still registered
    pub fn pending(&self) -> usize {
        self.tokens.borrow().len()
    }
}

impl<D: RecognizerHost> Scheduler for CalloopScheduler<D> {
    fn schedule(&mut self, deadline: Duration, task: Task) -> TaskHandle {
        self.next += 1;
        let handle = TaskHandle(self.next);
        let epoch = self.epoch;
        let tokens = self.tokens.clone();

        let timer = Timer::from_deadline(epoch + deadline);
        let inserted = self.handle.insert_source(timer, move |fired, _, host: &mut D| {
            tokens.borrow_mut().remove(&handle);
            let now = fired.saturating_duration_since(epoch);
            host.recognizer().on_task(handle, task, now);
            TimeoutAction::Drop
        });

        match inserted {
            Ok(token) => {
                self.tokens.borrow_mut().insert(handle, token);
            }
            Err(e) => warn!("Failed to schedule {:?}: {}", task, e.error),
        }
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        let token = self.tokens.borrow_mut().remove(&handle);
        if let Some(token) = token {
            self.handle.remove(token);
        }
    }
}
