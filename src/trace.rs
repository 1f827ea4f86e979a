//! Recorded input traces
//!
//! A trace is a time-ordered list of pointer and wheel samples, stored as JSON
//! or TOML. Replaying one through a recognizer on a [`ManualScheduler`] is
//! fully deterministic: timers fire at the deadlines implied by the sample
//! timestamps.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::ManualScheduler;
use crate::config::InputDevice;
use crate::error::Error;
use crate::input::{
    DeltaMode, GestureEvent, GestureRecognizer, Modifiers, Point, PointerEvent, PointerPhase, Target, TargetId,
    WheelEvent,
};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Device preset to apply before replaying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<InputDevice>,
    pub events: Vec<TraceEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceEvent {
    Down(ContactSample),
    Move(ContactSample),
    Up(ContactSample),
    Cancel(ContactSample),
    Wheel(WheelSample),
}

/// One pointer sample; `t` is milliseconds since the start of the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSample {
    pub t: u64,
    pub id: i32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub target: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSample {
    pub t: u64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default)]
    pub dz: f64,
    #[serde(default)]
    pub mode: WheelMode,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub target: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelMode {
    #[default]
    Pixel,
    Line,
    Page,
}

/// A trace sample converted to recognizer input
#[derive(Debug, Clone, PartialEq)]
pub enum TraceInput {
    Pointer(PointerEvent),
    Wheel(WheelEvent),
}

impl TraceEvent {
    pub fn time(&self) -> Duration {
        let t = match self {
            TraceEvent::Down(s) | TraceEvent::Move(s) | TraceEvent::Up(s) | TraceEvent::Cancel(s) => s.t,
            TraceEvent::Wheel(w) => w.t,
        };
        Duration::from_millis(t)
    }

    pub fn to_input(&self) -> TraceInput {
        let (phase, sample) = match self {
            TraceEvent::Down(s) => (PointerPhase::Down, s),
            TraceEvent::Move(s) => (PointerPhase::Move, s),
            TraceEvent::Up(s) => (PointerPhase::Up, s),
            TraceEvent::Cancel(s) => (PointerPhase::Cancel, s),
            TraceEvent::Wheel(w) => {
                return TraceInput::Wheel(WheelEvent {
                    delta_x: w.dx,
                    delta_y: w.dy,
                    delta_z: w.dz,
                    mode: match w.mode {
                        WheelMode::Pixel => DeltaMode::Pixel,
                        WheelMode::Line => DeltaMode::Line,
                        WheelMode::Page => DeltaMode::Page,
                    },
                    modifiers: Modifiers {
                        ctrl: w.ctrl,
                        alt: w.alt,
                        shift: w.shift,
                        meta: w.meta,
                    },
                    target: target(w.target, &w.ancestors),
                    time: self.time(),
                })
            }
        };

        TraceInput::Pointer(PointerEvent::new(
            phase,
            sample.id,
            Point::new(sample.x, sample.y),
            target(sample.target, &sample.ancestors),
            self.time(),
        ))
    }
}

fn target(node: u64, ancestors: &[u64]) -> Target {
    Target::with_ancestors(TargetId(node), ancestors.iter().copied().map(TargetId))
}

impl Trace {
    /// Load by extension: `.json` or `.toml`
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str());
        if !matches!(extension, Some("json") | Some("toml")) {
            return Err(Error::TraceFormat(path.display().to_string()));
        }

        let contents = fs::read_to_string(path)?;
        let trace = if extension == Some("json") {
            Self::from_json(&contents)?
        } else {
            Self::from_toml(&contents)?
        };
        debug!(events = trace.events.len(), "Loaded trace from {:?}", path);
        Ok(trace)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let trace: Trace = serde_json::from_str(contents)?;
        trace.check_order()?;
        Ok(trace)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let trace: Trace = toml::from_str(contents)?;
        trace.check_order()?;
        Ok(trace)
    }

    fn check_order(&self) -> Result<()> {
        for (i, pair) in self.events.windows(2).enumerate() {
            if pair[1].time() < pair[0].time() {
                return Err(Error::TraceFormat(format!(
                    "event {} at {:?} precedes the one before it",
                    i + 1,
                    pair[1].time()
                )));
            }
        }
        Ok(())
    }

    /// End of the trace
    pub fn duration(&self) -> Duration {
        self.events.last().map_or(Duration::ZERO, TraceEvent::time)
    }

    /// Feed every sample, then let pending timers run out
    pub fn replay(&self, recognizer: &mut GestureRecognizer<ManualScheduler>) {
        for event in &self.events {
            match event.to_input() {
                TraceInput::Pointer(pointer) => {
                    recognizer.feed(pointer);
                }
                TraceInput::Wheel(wheel) => {
                    recognizer.feed_wheel(wheel);
                }
            }
        }
        recognizer.settle();
    }
}

/// Flat, serializable view of an emitted event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctrl: Option<bool>,
}

impl From<&GestureEvent> for EventRecord {
    fn from(event: &GestureEvent) -> Self {
        let mut record = EventRecord {
            channel: event.channel().name(),
            time_ms: None,
            session: None,
            kind: None,
            direction: None,
            position: None,
            delta: None,
            velocity: None,
            scale: None,
            rotation: None,
            contacts: None,
            frame: None,
            ctrl: None,
        };

        match event {
            GestureEvent::Inertia(step) => {
                record.frame = Some(step.frame);
                record.delta = Some([step.delta.x, step.delta.y]);
                record.velocity = Some([step.velocity.x, step.velocity.y]);
            }
            GestureEvent::Wheel(wheel) => {
                record.time_ms = Some(wheel.time.as_millis() as u64);
                record.delta = Some([wheel.delta_x, wheel.delta_y]);
                record.ctrl = Some(wheel.modifiers.ctrl);
            }
            _ => {
                if let Some(payload) = event.payload() {
                    let s = &payload.snapshot;
                    record.time_ms = Some(payload.source.time.as_millis() as u64);
                    record.session = Some(s.session);
                    record.kind = event.kind().map(|k| k.name());
                    record.direction = s.direction.map(|d| format!("{:?}", d).to_lowercase());
                    record.position = Some([s.current.x, s.current.y]);
                    record.delta = Some([s.delta.x, s.delta.y]);
                    record.velocity = Some([s.velocity.x, s.velocity.y]);
                    record.scale = Some(s.scale);
                    record.rotation = Some(s.rotation);
                    record.contacts = Some(s.contacts);
                }
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Channel, ChannelMask, GestureKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    const SWIPE: &str = r#"{
        "events": [
            { "kind": "down", "t": 0, "id": 1, "x": 0, "y": 0 },
            { "kind": "move", "t": 50, "id": 1, "x": 33, "y": 0 },
            { "kind": "move", "t": 100, "id": 1, "x": 66, "y": 0 },
            { "kind": "move", "t": 150, "id": 1, "x": 100, "y": 0 },
            { "kind": "up", "t": 150, "id": 1, "x": 100, "y": 0 }
        ]
    }"#;

    #[test]
    fn test_json_trace_replays_to_swipe() {
        let trace = Trace::from_json(SWIPE).unwrap();
        assert_eq!(trace.duration(), Duration::from_millis(150));

        let mut recognizer = GestureRecognizer::new(ManualScheduler::new());
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let sink = kinds.clone();
        recognizer.subscribe(ChannelMask::GESTURES, move |e| sink.borrow_mut().extend(e.kind()));
        trace.replay(&mut recognizer);

        assert_eq!(kinds.borrow().last(), Some(&GestureKind::Swipe));
        assert!(recognizer.is_idle());
    }

    #[test]
    fn test_toml_trace_with_targets_and_wheel() {
        let trace = Trace::from_toml(
            r#"
device = "touch"

[[events]]
kind = "down"
t = 0
id = 3
x = 10.0
y = 20.0
target = 7
ancestors = [2, 1]

[[events]]
kind = "wheel"
t = 40
dy = -120.0
ctrl = true
"#,
        )
        .unwrap();
        assert_eq!(trace.device, Some(InputDevice::Touch));

        match trace.events[0].to_input() {
            TraceInput::Pointer(event) => {
                assert_eq!(event.phase, PointerPhase::Down);
                assert_eq!(event.contact, 3);
                let path: Vec<_> = event.target.path().collect();
                assert_eq!(path, vec![TargetId(7), TargetId(2), TargetId(1)]);
            }
            other => panic!("unexpected input {:?}", other),
        }
        match trace.events[1].to_input() {
            TraceInput::Wheel(wheel) => {
                assert!(wheel.modifiers.ctrl);
                assert_eq!(wheel.delta_y, -120.0);
                assert_eq!(wheel.time, Duration::from_millis(40));
            }
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_trace_rejected() {
        let result = Trace::from_json(
            r#"{ "events": [
                { "kind": "down", "t": 100, "id": 1, "x": 0, "y": 0 },
                { "kind": "up", "t": 50, "id": 1, "x": 0, "y": 0 }
            ] }"#,
        );
        assert!(matches!(result, Err(Error::TraceFormat(_))));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = Trace::load(Path::new("/nonexistent/trace.yaml"));
        assert!(matches!(result, Err(Error::TraceFormat(_))));
    }

    #[test]
    fn test_event_record_fields() {
        let trace = Trace::from_json(SWIPE).unwrap();
        let mut recognizer = GestureRecognizer::new(ManualScheduler::new());
        let records = Rc::new(RefCell::new(Vec::new()));
        let sink = records.clone();
        recognizer.subscribe(ChannelMask::ALL, move |e| sink.borrow_mut().push(EventRecord::from(e)));
        trace.replay(&mut recognizer);

        let records = records.borrow();
        let swipe = records.iter().find(|r| r.channel == Channel::Swipe.name()).unwrap();
        assert_eq!(swipe.direction.as_deref(), Some("right"));
        assert_eq!(swipe.time_ms, Some(150));
        assert_eq!(swipe.contacts, Some(0));

        let frame = records.iter().find(|r| r.channel == "inertia").unwrap();
        assert_eq!(frame.frame, Some(0));
        assert!(frame.session.is_none());

        let json = serde_json::to_string(swipe).unwrap();
        assert!(json.contains("\"kind\":\"swipe\""));
        assert!(!json.contains("frame"));
    }

    #[test]
    fn test_demo_traces() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
        let cases = [
            ("tap.json", GestureKind::Tap),
            ("double-tap.json", GestureKind::DoubleTap),
            ("swipe-left.json", GestureKind::Swipe),
            ("pinch.json", GestureKind::Pinch),
            ("rotate.json", GestureKind::Rotate),
            ("long-press.toml", GestureKind::LongPress),
        ];

        for (file, expected) in cases {
            let trace = Trace::load(&demos.join(file)).unwrap();
            let mut recognizer = GestureRecognizer::new(ManualScheduler::new());
            if let Some(device) = trace.device {
                recognizer.update_config(&crate::ConfigPatch::for_device(device)).unwrap();
            }
            let kinds = Rc::new(RefCell::new(Vec::new()));
            let sink = kinds.clone();
            recognizer.subscribe(ChannelMask::GESTURES, move |e| sink.borrow_mut().extend(e.kind()));
            trace.replay(&mut recognizer);
            assert_eq!(kinds.borrow().last(), Some(&expected), "{}", file);
        }

        let trace = Trace::load(&demos.join("wheel.json")).unwrap();
        let mut recognizer = GestureRecognizer::new(ManualScheduler::new());
        let wheels = Rc::new(RefCell::new(0));
        let sink = wheels.clone();
        recognizer.subscribe(ChannelMask::from(Channel::Wheel), move |_| *sink.borrow_mut() += 1);
        trace.replay(&mut recognizer);
        assert_eq!(*wheels.borrow(), 3);
    }
}
