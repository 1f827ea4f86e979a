//! Scheduler backends for the recognizer
//!
//! - `manual`: deterministic, advanced by event timestamps (replay, tests)
//! - `event_loop`: calloop timers for realtime use

pub mod event_loop;
pub mod manual;

pub use event_loop::{CalloopScheduler, RecognizerHost};
pub use manual::ManualScheduler;
