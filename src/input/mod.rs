//! Pointer input and gesture recognition
//!
//! This module provides:
//! - Normalized pointer and wheel events from the host surface
//! - The gesture recognizer and its classifier
//! - Post-release inertia
//! - Typed output channels and subscriptions

mod classifier;
mod dispatch;
mod gestures;
mod inertia;
mod touch;

pub use classifier::*;
pub use dispatch::*;
pub use gestures::*;
pub use inertia::*;
pub use touch::*;
