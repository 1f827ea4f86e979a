//! Multi-touch gesture recognition for a comic reader
//!
//! The recognizer consumes a host-supplied pointer stream with monotonic
//! timestamps and emits typed gesture events (tap, double tap, long press,
//! swipe, pan, pinch, rotate, wheel, plus session lifecycle and inertia) to
//! channel subscribers. Timers go through a [`scheduler::Scheduler`], so the
//! same recognizer runs on a calloop event loop or is driven deterministically
//! from recorded traces.

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod scheduler;
pub mod trace;

pub use config::{ConfigPatch, RecognitionConfig};
pub use error::{ConfigError, Error};
pub use input::{GestureEvent, GestureKind, GestureRecognizer, GestureSnapshot};

pub type Result<T> = std::result::Result<T, Error>;
