//! Post-release inertia
//!
//! Geometric decay: every frame the current velocity is reported as the frame's
//! displacement, then scaled by the decay factor. The loop ends once both
//! components drop below the minimum velocity.

use super::touch::Point;

/// One frame of inertial motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaStep {
    /// Zero-based frame index
    pub frame: u32,
    /// Displacement to apply this frame (px)
    pub delta: Point,
    /// Velocity this frame was produced from (px/ms)
    pub velocity: Point,
}

/// Decay simulation, yielding one [`InertiaStep`] per frame
#[derive(Debug, Clone)]
pub struct Inertia {
    velocity: Point,
    decay: f64,
    min_velocity: f64,
    frame: u32,
}

impl Inertia {
    pub fn new(velocity: Point, decay: f64, min_velocity: f64) -> Self {
        Self {
            velocity,
            decay,
            min_velocity,
            frame: 0,
        }
    }

    /// Whether a release velocity is fast enough to start a loop
    pub fn should_start(velocity: Point, min_velocity: f64) -> bool {
        velocity.x.abs() > min_velocity || velocity.y.abs() > min_velocity
    }

    pub fn is_finished(&self) -> bool {
        // decay < 1 keeps this reachable; NaN velocities count as finished
        !(self.velocity.x.abs() >= self.min_velocity || self.velocity.y.abs() >= self.min_velocity)
    }

    pub fn velocity(&self) -> Point {
        self.velocity
    }

    pub fn frames(&self) -> u32 {
        self.frame
    }
}

impl Iterator for Inertia {
    type Item = InertiaStep;

    fn next(&mut self) -> Option<InertiaStep> {
        if self.is_finished() {
            return None;
        }

        let step = InertiaStep {
            frame: self.frame,
            delta: self.velocity,
            velocity: self.velocity,
        };

        self.velocity.x *= self.decay;
        self.velocity.y *= self.decay;
        self.frame += 1;
        Some(step)
    }
}
