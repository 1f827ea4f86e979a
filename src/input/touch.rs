//! Raw pointer input as delivered by the host surface

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Stable identifier of one contact (finger, stylus tip, mouse button)
pub type ContactId = i32;

/// Opaque identifier of the node a contact originally hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// A point in client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Bearing towards another point in degrees, atan2 convention (y grows downward)
    pub fn bearing_to(&self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}, {:.0}", self.x, self.y)
    }
}

/// The node hit by an event, with the host-resolved ancestor chain (nearest first)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub node: TargetId,
    pub ancestors: Rc<[TargetId]>,
}

impl Target {
    pub fn new(node: TargetId) -> Self {
        Self {
            node,
            ancestors: Rc::from(Vec::<TargetId>::new()),
        }
    }

    pub fn with_ancestors(node: TargetId, ancestors: impl IntoIterator<Item = TargetId>) -> Self {
        Self {
            node,
            ancestors: ancestors.into_iter().collect(),
        }
    }

    /// The node itself followed by its ancestors
    pub fn path(&self) -> impl Iterator<Item = TargetId> + '_ {
        std::iter::once(self.node).chain(self.ancestors.iter().copied())
    }
}

/// Phase of a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Normalized pointer event
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub contact: ContactId,
    pub position: Point,
    pub target: Target,
    pub phase: PointerPhase,
    /// Monotonic time since the host's epoch
    pub time: Duration,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, contact: ContactId, position: Point, target: Target, time: Duration) -> Self {
        Self {
            contact,
            position,
            target,
            phase,
            time,
        }
    }

    pub fn down(contact: ContactId, x: f64, y: f64, time_ms: u64) -> Self {
        Self::untargeted(PointerPhase::Down, contact, x, y, time_ms)
    }

    pub fn moved(contact: ContactId, x: f64, y: f64, time_ms: u64) -> Self {
        Self::untargeted(PointerPhase::Move, contact, x, y, time_ms)
    }

    pub fn up(contact: ContactId, x: f64, y: f64, time_ms: u64) -> Self {
        Self::untargeted(PointerPhase::Up, contact, x, y, time_ms)
    }

    pub fn cancel(contact: ContactId, x: f64, y: f64, time_ms: u64) -> Self {
        Self::untargeted(PointerPhase::Cancel, contact, x, y, time_ms)
    }

    fn untargeted(phase: PointerPhase, contact: ContactId, x: f64, y: f64, time_ms: u64) -> Self {
        Self::new(
            phase,
            contact,
            Point::new(x, y),
            Target::new(TargetId(0)),
            Duration::from_millis(time_ms),
        )
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

/// Units of a wheel delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

/// Modifier keys held during a wheel event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

/// Wheel or trackpad scroll event
#[derive(Debug, Clone, PartialEq)]
pub struct WheelEvent {
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_z: f64,
    pub mode: DeltaMode,
    pub modifiers: Modifiers,
    pub target: Target,
    pub time: Duration,
}

/// What the host should do with the native event after the recognizer saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not tracked; the recognizer state is unchanged
    Ignored,
    /// Consumed by the recognizer; the host may suppress native handling
    Handled,
    /// Reported to subscribers but native handling should proceed (e.g. ctrl+wheel zoom)
    PassThrough,
}
