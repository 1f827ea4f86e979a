//! Typed output channels and subscriber fan-out
//!
//! Every emission belongs to exactly one [`Channel`]. Subscribers register a
//! [`ChannelMask`] and receive, by shared reference, each event whose channel
//! is in their mask, in subscription order.

use std::fmt;

use super::gestures::{GestureKind, GestureSnapshot};
use super::inertia::InertiaStep;
use super::touch::{PointerEvent, Target, WheelEvent};

/// Output channel of an emission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Start,
    Move,
    End,
    Cancel,
    Inertia,
    Tap,
    DoubleTap,
    LongPress,
    Swipe,
    Pan,
    Pinch,
    Rotate,
    Wheel,
}

impl Channel {
    pub const ALL: [Channel; 13] = [
        Channel::Start,
        Channel::Move,
        Channel::End,
        Channel::Cancel,
        Channel::Inertia,
        Channel::Tap,
        Channel::DoubleTap,
        Channel::LongPress,
        Channel::Swipe,
        Channel::Pan,
        Channel::Pinch,
        Channel::Rotate,
        Channel::Wheel,
    ];

    fn bit(self) -> u16 {
        1 << self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Start => "start",
            Channel::Move => "move",
            Channel::End => "end",
            Channel::Cancel => "cancel",
            Channel::Inertia => "inertia",
            Channel::Tap => "tap",
            Channel::DoubleTap => "doubletap",
            Channel::LongPress => "longpress",
            Channel::Swipe => "swipe",
            Channel::Pan => "pan",
            Channel::Pinch => "pinch",
            Channel::Rotate => "rotate",
            Channel::Wheel => "wheel",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|channel| channel.name() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of channels, one bit per [`Channel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u16);

impl ChannelMask {
    pub const NONE: ChannelMask = ChannelMask(0);
    pub const ALL: ChannelMask = ChannelMask((1 << 13) - 1);
    /// start, move, end, cancel, inertia
    pub const LIFECYCLE: ChannelMask = ChannelMask(0b1_1111);
    /// The seven classified gesture channels
    pub const GESTURES: ChannelMask = ChannelMask(0b111_1111 << 5);

    pub fn with(mut self, channel: Channel) -> Self {
        self.insert(channel);
        self
    }

    pub fn insert(&mut self, channel: Channel) {
        self.0 |= channel.bit();
    }

    pub fn remove(&mut self, channel: Channel) {
        self.0 &= !channel.bit();
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0 & channel.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        ChannelMask::ALL
    }
}

impl From<Channel> for ChannelMask {
    fn from(channel: Channel) -> Self {
        ChannelMask(channel.bit())
    }
}

impl FromIterator<Channel> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        iter.into_iter().fold(ChannelMask::NONE, ChannelMask::with)
    }
}

/// Snapshot plus the raw event that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct GesturePayload {
    pub snapshot: GestureSnapshot,
    pub source: PointerEvent,
    /// Target the session started on
    pub target: Target,
}

/// Everything the recognizer emits
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Start(GesturePayload),
    Move(GesturePayload),
    End(GesturePayload),
    Cancel(GesturePayload),
    /// A gesture type was latched (or decided at release)
    Recognized {
        kind: GestureKind,
        payload: GesturePayload,
    },
    Inertia(InertiaStep),
    Wheel(WheelEvent),
}

impl GestureEvent {
    pub fn channel(&self) -> Channel {
        match self {
            GestureEvent::Start(_) => Channel::Start,
            GestureEvent::Move(_) => Channel::Move,
            GestureEvent::End(_) => Channel::End,
            GestureEvent::Cancel(_) => Channel::Cancel,
            GestureEvent::Recognized { kind, .. } => kind.channel(),
            GestureEvent::Inertia(_) => Channel::Inertia,
            GestureEvent::Wheel(_) => Channel::Wheel,
        }
    }

    pub fn payload(&self) -> Option<&GesturePayload> {
        match self {
            GestureEvent::Start(p) | GestureEvent::Move(p) | GestureEvent::End(p) | GestureEvent::Cancel(p) => Some(p),
            GestureEvent::Recognized { payload, .. } => Some(payload),
            GestureEvent::Inertia(_) | GestureEvent::Wheel(_) => None,
        }
    }

    pub fn snapshot(&self) -> Option<&GestureSnapshot> {
        self.payload().map(|p| &p.snapshot)
    }

    /// Classified type carried by the event, if any
    pub fn kind(&self) -> Option<GestureKind> {
        match self {
            GestureEvent::Recognized { kind, .. } => Some(*kind),
            _ => self.snapshot().and_then(|s| s.kind),
        }
    }
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureEvent::Inertia(step) => write!(
                f,
                "inertia frame={} delta=({:.2}, {:.2})",
                step.frame, step.delta.x, step.delta.y
            ),
            GestureEvent::Wheel(wheel) => write!(
                f,
                "wheel dx={} dy={} dz={} ctrl={}",
                wheel.delta_x, wheel.delta_y, wheel.delta_z, wheel.modifiers.ctrl
            ),
            GestureEvent::Recognized { kind, payload } => match payload.snapshot.direction {
                Some(direction) => write!(f, "{} {:?} session={}", kind.name(), direction, payload.snapshot.session),
                None => write!(f, "{} session={}", kind.name(), payload.snapshot.session),
            },
            other => {
                let snapshot = other.snapshot();
                write!(f, "{}", other.channel())?;
                if let Some(s) = snapshot {
                    write!(f, " session={} contacts={} at ({})", s.session, s.contacts, s.current)?;
                }
                Ok(())
            }
        }
    }
}

/// Handle returned by [`GestureDispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&GestureEvent)>;

struct Subscriber {
    id: SubscriptionId,
    channels: ChannelMask,
    callback: Callback,
}

/// Ordered list of channel subscribers
#[derive(Default)]
pub struct GestureDispatcher {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl GestureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, channels: ChannelMask, callback: F) -> SubscriptionId
    where
        F: FnMut(&GestureEvent) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber {
            id,
            channels,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns false if the subscription was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn dispatch(&mut self, event: &GestureEvent) {
        let channel = event.channel();
        for subscriber in self.subscribers.iter_mut().filter(|s| s.channels.contains(channel)) {
            (subscriber.callback)(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for GestureDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureDispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
