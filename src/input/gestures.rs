//! Gesture recognition over a multi-contact pointer stream
//!
//! One [`GestureRecognizer`] owns at most one live session. A session starts
//! when the first contact lands and ends when the last one lifts or is
//! cancelled. While it is live the recognizer tracks:
//! - the tracked point (single contact) or centroid (several contacts)
//! - smoothed velocity in px/ms
//! - scale and rotation of the first two contacts against the pair baseline
//!
//! Classification latches: once a type is set it stays, except that a pan may
//! become a swipe and an unclassified session may become a tap or double tap
//! at release.
//!
//! Time is never read from a clock. Every event carries its own timestamp and
//! timers go through a [`Scheduler`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::classifier::GestureClassifier;
use super::dispatch::{Channel, ChannelMask, GestureDispatcher, GestureEvent, GesturePayload, SubscriptionId};
use super::inertia::Inertia;
use super::touch::{ContactId, Disposition, Point, PointerEvent, PointerPhase, Target, TargetId, WheelEvent};
use crate::config::{ConfigPatch, RecognitionConfig};
use crate::error::ConfigError;
use crate::scheduler::{Scheduler, Task, TaskHandle, FRAME_INTERVAL};

/// Classified gesture type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Tap,
    DoubleTap,
    LongPress,
    Swipe,
    Pan,
    Pinch,
    Rotate,
}

impl GestureKind {
    pub fn channel(self) -> Channel {
        match self {
            GestureKind::Tap => Channel::Tap,
            GestureKind::DoubleTap => Channel::DoubleTap,
            GestureKind::LongPress => Channel::LongPress,
            GestureKind::Swipe => Channel::Swipe,
            GestureKind::Pan => Channel::Pan,
            GestureKind::Pinch => Channel::Pinch,
            GestureKind::Rotate => Channel::Rotate,
        }
    }

    pub fn name(self) -> &'static str {
        self.channel().name()
    }
}

/// Direction of a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Quadrant of a bearing in degrees (y grows downward)
    pub fn from_angle(angle: f64) -> Self {
        if (-45.0..45.0).contains(&angle) {
            SwipeDirection::Right
        } else if (45.0..135.0).contains(&angle) {
            SwipeDirection::Down
        } else if angle >= 135.0 || angle < -135.0 {
            SwipeDirection::Left
        } else {
            SwipeDirection::Up
        }
    }
}

/// One contact of the live session
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPoint {
    pub id: ContactId,
    pub position: Point,
    pub origin: Point,
    /// Node the contact originally hit
    pub target: Target,
}

/// Immutable copy of the session state at the time of an emission
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSnapshot {
    pub session: u64,
    pub active: bool,
    pub kind: Option<GestureKind>,
    /// Set when the session was upgraded to a swipe
    pub direction: Option<SwipeDirection>,
    pub start_time: Duration,
    pub last_move_time: Duration,
    pub origin: Point,
    pub current: Point,
    pub delta: Point,
    /// Smoothed velocity (px/ms)
    pub velocity: Point,
    pub distance: f64,
    /// Bearing from origin to current, degrees
    pub angle: f64,
    pub scale: f64,
    /// Degrees in (-180, 180]
    pub rotation: f64,
    pub contacts: usize,
    pub tap_count: u32,
    pub last_tap_time: Option<Duration>,
}

impl Default for GestureSnapshot {
    fn default() -> Self {
        Self {
            session: 0,
            active: false,
            kind: None,
            direction: None,
            start_time: Duration::ZERO,
            last_move_time: Duration::ZERO,
            origin: Point::ZERO,
            current: Point::ZERO,
            delta: Point::ZERO,
            velocity: Point::ZERO,
            distance: 0.0,
            angle: 0.0,
            scale: 1.0,
            rotation: 0.0,
            contacts: 0,
            tap_count: 0,
            last_tap_time: None,
        }
    }
}

/// Debug overlay text
impl fmt::Display for GestureSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type: {}", self.kind.map_or("none", GestureKind::name))?;
        writeln!(f, "Delta: {:.0}, {:.0}", self.delta.x, self.delta.y)?;
        writeln!(f, "Velocity: {:.2}, {:.2}", self.velocity.x, self.velocity.y)?;
        writeln!(f, "Distance: {:.0}", self.distance)?;
        writeln!(f, "Angle: {:.0}°", self.angle)?;
        writeln!(f, "Scale: {:.2}", self.scale)?;
        writeln!(f, "Rotation: {:.0}°", self.rotation)?;
        write!(f, "Touches: {}", self.contacts)
    }
}

/// Per-target gesture settings, resolved nearest first along the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSettings {
    pub enabled: bool,
    /// Classified and wheel channels delivered for sessions started here
    pub channels: ChannelMask,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: ChannelMask::ALL,
        }
    }
}

/// Separation and bearing of the first two contacts when the pair formed
#[derive(Debug, Clone, Copy)]
struct PairBaseline {
    distance: f64,
    bearing: f64,
    // scale and rotation already accumulated when the pair formed
    scale: f64,
    rotation: f64,
}

struct GestureSession {
    state: GestureSnapshot,
    config: RecognitionConfig,
    settings: TargetSettings,
    contacts: Vec<ContactPoint>,
    baseline: Option<PairBaseline>,
    /// Event that started the session
    trigger: PointerEvent,
}

impl GestureSession {
    fn begin(id: u64, config: RecognitionConfig, settings: TargetSettings, event: &PointerEvent) -> Self {
        let mut session = Self {
            state: GestureSnapshot {
                session: id,
                active: true,
                start_time: event.time,
                last_move_time: event.time,
                origin: event.position,
                current: event.position,
                ..GestureSnapshot::default()
            },
            config,
            settings,
            contacts: Vec::new(),
            baseline: None,
            trigger: event.clone(),
        };
        session.add_contact(event);
        session
    }

    fn classifier(&self) -> GestureClassifier {
        GestureClassifier::new(self.config)
    }

    fn has_contact(&self, id: ContactId) -> bool {
        self.contacts.iter().any(|c| c.id == id)
    }

    fn add_contact(&mut self, event: &PointerEvent) {
        self.contacts.push(ContactPoint {
            id: event.contact,
            position: event.position,
            origin: event.position,
            target: event.target.clone(),
        });
        self.state.contacts = self.contacts.len();
        if self.contacts.len() == 2 {
            self.rebaseline();
        }
    }

    /// Returns false for an untracked contact
    fn move_contact(&mut self, id: ContactId, position: Point) -> bool {
        match self.contacts.iter_mut().find(|c| c.id == id) {
            Some(contact) => {
                contact.position = position;
                true
            }
            None => false,
        }
    }

    fn remove_contact(&mut self, id: ContactId) {
        let Some(index) = self.contacts.iter().position(|c| c.id == id) else {
            return;
        };
        self.contacts.remove(index);
        self.state.contacts = self.contacts.len();

        if self.contacts.len() < 2 {
            // last measured scale and rotation are kept
            self.baseline = None;
        } else if index < 2 {
            self.rebaseline();
        }
    }

    fn rebaseline(&mut self) {
        self.baseline = match self.contacts.as_slice() {
            [a, b, ..] => Some(PairBaseline {
                distance: a.position.distance_to(b.position),
                bearing: a.position.bearing_to(b.position),
                scale: self.state.scale,
                rotation: self.state.rotation,
            }),
            _ => None,
        };
    }

    /// Follow a single tracked point; velocity only when `dt` is given.
    /// The sample is the displacement from the session origin over `dt`.
    fn track_single(&mut self, position: Point, dt: Option<Duration>) {
        self.track(position);

        if let Some(dt) = dt {
            let ms = dt.as_secs_f64() * 1000.0;
            if ms > 0.0 {
                let delta = self.state.delta;
                let velocity = &mut self.state.velocity;
                velocity.x = 0.7 * velocity.x + 0.3 * (delta.x / ms);
                velocity.y = 0.7 * velocity.y + 0.3 * (delta.y / ms);
            }
        }
    }

    /// Centroid of all contacts, plus scale and rotation of the first pair
    fn track_multi(&mut self) {
        let count = self.contacts.len() as f64;
        let (sx, sy) = self
            .contacts
            .iter()
            .fold((0.0, 0.0), |acc, c| (acc.0 + c.position.x, acc.1 + c.position.y));
        self.track(Point::new(sx / count, sy / count));

        if let (Some(baseline), [a, b, ..]) = (self.baseline, self.contacts.as_slice()) {
            if baseline.distance > 0.0 {
                self.state.scale = baseline.scale * a.position.distance_to(b.position) / baseline.distance;
            }
            self.state.rotation =
                normalize_degrees(baseline.rotation + a.position.bearing_to(b.position) - baseline.bearing);
        }
    }

    fn track(&mut self, current: Point) {
        let state = &mut self.state;
        state.current = current;
        state.delta = current - state.origin;
        state.distance = state.origin.distance_to(current);
        state.angle = state.origin.bearing_to(current);
    }
}

/// Running inertia loop
struct InertiaRun {
    handle: TaskHandle,
    sim: Inertia,
}

/// Normalize an angle difference to (-180, 180]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Multi-touch gesture recognizer
pub struct GestureRecognizer<S> {
    config: RecognitionConfig,
    scheduler: S,
    dispatcher: GestureDispatcher,
    targets: HashMap<TargetId, TargetSettings>,
    session: Option<GestureSession>,
    next_session: u64,
    /// Tap tracking carried across sessions
    tap_count: u32,
    last_tap_time: Option<Duration>,
    long_press: Option<TaskHandle>,
    inertia: Option<InertiaRun>,
}

impl<S: Scheduler> GestureRecognizer<S> {
    pub fn new(scheduler: S) -> Self {
        Self::build(RecognitionConfig::default(), scheduler)
    }

    pub fn with_config(config: RecognitionConfig, scheduler: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, scheduler))
    }

    fn build(config: RecognitionConfig, scheduler: S) -> Self {
        Self {
            config,
            scheduler,
            dispatcher: GestureDispatcher::new(),
            targets: HashMap::new(),
            session: None,
            next_session: 0,
            tap_count: 0,
            last_tap_time: None,
            long_press: None,
            inertia: None,
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Merge `patch` into the configuration. Sessions already running keep
    /// the configuration they started with.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        let config = match self.config.patched(patch) {
            Ok(config) => config,
            Err(e) => {
                warn!("Rejected gesture config update: {}", e);
                return Err(e);
            }
        };

        let was_enabled = self.config.enabled;
        self.config = config;
        info!(?patch, "Gesture config updated");

        if was_enabled && !config.enabled {
            self.abort();
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled == enabled {
            return;
        }
        self.config.enabled = enabled;
        info!(enabled, "Gesture recognition toggled");
        if !enabled {
            self.abort();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn register_target(&mut self, target: TargetId, settings: TargetSettings) {
        self.targets.insert(target, settings);
    }

    /// Returns whether a registration was removed
    pub fn unregister_target(&mut self, target: TargetId) -> bool {
        self.targets.remove(&target).is_some()
    }

    pub fn subscribe<F>(&mut self, channels: ChannelMask, callback: F) -> SubscriptionId
    where
        F: FnMut(&GestureEvent) + 'static,
    {
        self.dispatcher.subscribe(channels, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Snapshot of the live (or most recent) session
    pub fn session(&self) -> Option<GestureSnapshot> {
        self.session.as_ref().map(|s| self.snapshot(s))
    }

    /// Contacts of the live session, in landing order
    pub fn contacts(&self) -> &[ContactPoint] {
        match self.session.as_ref() {
            Some(session) => &session.contacts,
            None => &[],
        }
    }

    /// No session, long-press timer or inertia loop is live
    pub fn is_idle(&self) -> bool {
        !self.session.as_ref().is_some_and(|s| s.state.active) && self.long_press.is_none() && self.inertia.is_none()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Disposition {
        if !self.config.enabled {
            return Disposition::Ignored;
        }

        match event.phase {
            PointerPhase::Down => self.contact_down(event),
            PointerPhase::Move => self.contact_move(event),
            PointerPhase::Up => self.contact_end(event, false),
            PointerPhase::Cancel => self.contact_end(event, true),
        }
    }

    pub fn handle_wheel(&mut self, event: WheelEvent) -> Disposition {
        if !self.config.enabled {
            return Disposition::Ignored;
        }

        let settings = self.resolve(&event.target);
        if !settings.enabled {
            debug!(node = ?event.target.node, "Wheel on disabled target ignored");
            return Disposition::Ignored;
        }

        let pass_through = event.modifiers.ctrl;
        if settings.channels.contains(Channel::Wheel) {
            self.dispatcher.dispatch(&GestureEvent::Wheel(event));
        }

        if pass_through {
            Disposition::PassThrough
        } else {
            Disposition::Handled
        }
    }

    /// Run a task the scheduler found due. `now` is the time it fired.
    pub fn on_task(&mut self, handle: TaskHandle, task: Task, now: Duration) {
        match task {
            Task::LongPress { session } => self.long_press_due(handle, session),
            Task::InertiaFrame => self.inertia_frame(handle, now),
        }
    }

    fn contact_down(&mut self, event: PointerEvent) -> Disposition {
        let settings = self.resolve(&event.target);
        if !settings.enabled {
            debug!(contact = event.contact, node = ?event.target.node, "Contact on disabled target ignored");
            return Disposition::Ignored;
        }

        match self.session.as_mut().filter(|s| s.state.active) {
            Some(session) => {
                if session.has_contact(event.contact) {
                    debug!(contact = event.contact, "Duplicate contact down ignored");
                    return Disposition::Ignored;
                }
                session.add_contact(&event);
            }
            None => {
                self.stop_inertia();
                self.next_session += 1;
                let session = GestureSession::begin(self.next_session, self.config, settings, &event);
                debug!(session = self.next_session, contact = event.contact, "Gesture session started");
                self.session = Some(session);
            }
        }

        let Some(session) = self.session.as_ref() else {
            return Disposition::Ignored;
        };
        let single = session.contacts.len() == 1;
        let id = session.state.session;
        let deadline = event.time + session.config.long_press_delay;

        self.emit_payload(Channel::Start, None, &event);

        if single {
            self.cancel_long_press();
            self.long_press = Some(self.scheduler.schedule(deadline, Task::LongPress { session: id }));
        }
        Disposition::Handled
    }

    fn contact_move(&mut self, event: PointerEvent) -> Disposition {
        let Some(session) = self.session.as_mut().filter(|s| s.state.active) else {
            return Disposition::Ignored;
        };
        if !session.move_contact(event.contact, event.position) {
            return Disposition::Ignored;
        }

        let dt = event.time.saturating_sub(session.state.last_move_time);
        session.state.last_move_time = event.time;

        let classifier = session.classifier();
        let mut left_tap_zone = false;
        if session.contacts.len() == 1 {
            session.track_single(event.position, Some(dt));
            if classifier.is_pan(&session.state) {
                left_tap_zone = true;
                if session.state.kind.is_none() {
                    session.state.kind = Some(GestureKind::Pan);
                    debug!(session = session.state.session, "Classified pan");
                }
            }
        } else {
            session.track_multi();
            if session.state.kind.is_none() {
                let kind = classifier.multi_touch(&session.state);
                session.state.kind = Some(kind);
                debug!(
                    session = session.state.session,
                    scale = session.state.scale,
                    rotation = session.state.rotation,
                    "Classified {}",
                    kind.name()
                );
            }
        }

        trace!("{}", session.state);
        let kind = session.state.kind;

        if left_tap_zone {
            self.cancel_long_press();
        }
        self.emit_payload(Channel::Move, None, &event);
        if let Some(kind) = kind {
            self.emit_payload(kind.channel(), Some(kind), &event);
        }
        Disposition::Handled
    }

    fn contact_end(&mut self, event: PointerEvent, cancelled: bool) -> Disposition {
        let Some(session) = self.session.as_mut().filter(|s| s.state.active) else {
            return Disposition::Ignored;
        };
        if !session.has_contact(event.contact) {
            return Disposition::Ignored;
        }

        if !cancelled && session.contacts.len() == 1 {
            session.track_single(event.position, None);
        }
        session.remove_contact(event.contact);

        if !session.contacts.is_empty() {
            self.emit_payload(Channel::Move, None, &event);
            return Disposition::Handled;
        }

        session.state.active = false;
        let id = session.state.session;
        self.cancel_long_press();

        if cancelled {
            debug!(session = id, "Gesture session cancelled");
            self.emit_payload(Channel::Cancel, None, &event);
            if let Some(session) = self.session.as_mut() {
                session.state.kind = None;
                session.state.direction = None;
            }
            return Disposition::Handled;
        }

        let now = event.time;
        let last_tap_time = self.last_tap_time;
        let Some(session) = self.session.as_mut() else {
            return Disposition::Ignored;
        };
        let classifier = session.classifier();
        let mut tap = None;

        match session.state.kind {
            None if classifier.is_tap(&session.state, now) => {
                if classifier.is_double_tap(last_tap_time, now) {
                    session.state.kind = Some(GestureKind::DoubleTap);
                    tap = Some((0, None));
                } else {
                    session.state.kind = Some(GestureKind::Tap);
                    tap = Some((1, Some(now)));
                }
            }
            Some(GestureKind::Pan) if classifier.is_swipe(&session.state, now) => {
                session.state.kind = Some(GestureKind::Swipe);
                session.state.direction = Some(SwipeDirection::from_angle(session.state.angle));
            }
            _ => {}
        }

        let kind = session.state.kind;
        let velocity = session.state.velocity;
        let config = session.config;
        debug!(session = id, kind = kind.map_or("none", GestureKind::name), "Gesture session ended");

        if let Some((count, time)) = tap {
            self.tap_count = count;
            self.last_tap_time = time;
        }

        self.emit_payload(Channel::End, None, &event);
        if let Some(kind) = kind {
            self.emit_payload(kind.channel(), Some(kind), &event);
        }

        if config.inertia_enabled && Inertia::should_start(velocity, config.inertia_min_velocity) {
            let sim = Inertia::new(velocity, config.inertia_decay, config.inertia_min_velocity);
            let handle = self.scheduler.schedule(now + FRAME_INTERVAL, Task::InertiaFrame);
            debug!(vx = velocity.x, vy = velocity.y, "Inertia started");
            self.inertia = Some(InertiaRun { handle, sim });
        }
        Disposition::Handled
    }

    fn long_press_due(&mut self, handle: TaskHandle, id: u64) {
        if self.long_press != Some(handle) {
            return;
        }
        self.long_press = None;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state.session != id || !session.classifier().is_long_press(&session.state) {
            return;
        }

        session.state.kind = Some(GestureKind::LongPress);
        debug!(session = id, "Classified longpress");
        let trigger = session.trigger.clone();
        self.emit_payload(Channel::LongPress, Some(GestureKind::LongPress), &trigger);
    }

    fn inertia_frame(&mut self, handle: TaskHandle, now: Duration) {
        let Some(run) = self.inertia.as_mut() else {
            return;
        };
        if run.handle != handle {
            return;
        }

        let Some(step) = run.sim.next() else {
            self.inertia = None;
            return;
        };
        if run.sim.is_finished() {
            debug!(frames = run.sim.frames(), "Inertia finished");
            self.inertia = None;
        } else {
            run.handle = self.scheduler.schedule(now + FRAME_INTERVAL, Task::InertiaFrame);
        }
        self.dispatcher.dispatch(&GestureEvent::Inertia(step));
    }

    /// Cancel the live session without classifying it
    fn abort(&mut self) {
        self.cancel_long_press();
        self.stop_inertia();

        let Some(session) = self.session.as_mut().filter(|s| s.state.active) else {
            return;
        };
        session.contacts.clear();
        session.baseline = None;
        session.state.contacts = 0;
        session.state.active = false;
        let trigger = session.trigger.clone();
        info!(session = session.state.session, "Gesture session aborted");

        self.emit_payload(Channel::Cancel, None, &trigger);
        if let Some(session) = self.session.as_mut() {
            session.state.kind = None;
            session.state.direction = None;
        }
    }

    fn cancel_long_press(&mut self) {
        if let Some(handle) = self.long_press.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn stop_inertia(&mut self) {
        if let Some(run) = self.inertia.take() {
            let velocity = run.sim.velocity();
            debug!(frames = run.sim.frames(), vx = velocity.x, vy = velocity.y, "Inertia stopped");
            self.scheduler.cancel(run.handle);
        }
    }

    fn resolve(&self, target: &Target) -> TargetSettings {
        target
            .path()
            .find_map(|node| self.targets.get(&node).copied())
            .unwrap_or_default()
    }

    fn snapshot(&self, session: &GestureSession) -> GestureSnapshot {
        GestureSnapshot {
            tap_count: self.tap_count,
            last_tap_time: self.last_tap_time,
            ..session.state.clone()
        }
    }

    /// Emit a session event; classified channels go through the session's target mask
    fn emit_payload(&mut self, channel: Channel, kind: Option<GestureKind>, source: &PointerEvent) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if kind.is_some() && !session.settings.channels.contains(channel) {
            return;
        }

        let payload = GesturePayload {
            snapshot: self.snapshot(session),
            source: source.clone(),
            target: session.trigger.target.clone(),
        };
        let event = match (channel, kind) {
            (_, Some(kind)) => GestureEvent::Recognized { kind, payload },
            (Channel::Start, None) => GestureEvent::Start(payload),
            (Channel::End, None) => GestureEvent::End(payload),
            (Channel::Cancel, None) => GestureEvent::Cancel(payload),
            _ => GestureEvent::Move(payload),
        };
        self.dispatcher.dispatch(&event);
    }
}

impl<S> fmt::Debug for GestureRecognizer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureRecognizer")
            .field("config", &self.config)
            .field("session", &self.session.as_ref().map(|s| &s.state))
            .field("targets", &self.targets.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
