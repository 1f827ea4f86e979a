//! Predicates deciding whether a session satisfies a gesture type

use std::time::Duration;

use super::gestures::{GestureKind, GestureSnapshot};
use crate::config::RecognitionConfig;

/// Predicate table parameterized by one configuration
#[derive(Debug, Clone, Copy)]
pub struct GestureClassifier {
    config: RecognitionConfig,
}

impl GestureClassifier {
    pub fn new(config: RecognitionConfig) -> Self {
        Self { config }
    }

    /// Short, stationary contact
    pub fn is_tap(&self, state: &GestureSnapshot, now: Duration) -> bool {
        now.saturating_sub(state.start_time) <= self.config.tap_max_duration
            && state.distance <= self.config.tap_max_distance
    }

    /// A tap landing within the double-tap window of the previous one
    pub fn is_double_tap(&self, last_tap_time: Option<Duration>, now: Duration) -> bool {
        last_tap_time.is_some_and(|last| now.saturating_sub(last) <= self.config.double_tap_delay)
    }

    /// Checked when the long-press deadline passes
    pub fn is_long_press(&self, state: &GestureSnapshot) -> bool {
        state.active && state.contacts == 1 && state.kind.is_none() && state.distance <= self.config.tap_max_distance
    }

    pub fn is_pan(&self, state: &GestureSnapshot) -> bool {
        state.distance > self.config.tap_max_distance
    }

    /// Far and fast enough, and over quickly
    pub fn is_swipe(&self, state: &GestureSnapshot, now: Duration) -> bool {
        state.distance >= self.config.swipe_min_distance
            && state.velocity.length() >= self.config.swipe_min_velocity
            && now.saturating_sub(state.start_time) <= self.config.swipe_max_time
    }

    pub fn is_pinch(&self, state: &GestureSnapshot) -> bool {
        (state.scale - 1.0).abs() >= self.config.pinch_min_scale_delta
    }

    pub fn is_rotate(&self, state: &GestureSnapshot) -> bool {
        state.rotation.abs() >= self.config.rotate_min_angle
    }

    /// Tie-break for two or more contacts: pinch, then rotate, then pan
    pub fn multi_touch(&self, state: &GestureSnapshot) -> GestureKind {
        if self.is_pinch(state) {
            GestureKind::Pinch
        } else if self.is_rotate(state) {
            GestureKind::Rotate
        } else {
            GestureKind::Pan
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::touch::Point;

    fn state() -> GestureSnapshot {
        GestureSnapshot {
            active: true,
            contacts: 1,
            ..GestureSnapshot::default()
        }
    }

    #[test]
    fn test_tap_bounds_are_inclusive() {
        let classifier = GestureClassifier::new(RecognitionConfig::default());
        let mut s = state();
        s.distance = 10.0;
        assert!(classifier.is_tap(&s, Duration::from_millis(300)));
        assert!(!classifier.is_tap(&s, Duration::from_millis(301)));
        s.distance = 10.5;
        assert!(!classifier.is_tap(&s, Duration::from_millis(100)));
    }

    #[test]
    fn test_double_tap_window() {
        let classifier = GestureClassifier::new(RecognitionConfig::default());
        assert!(!classifier.is_double_tap(None, Duration::from_millis(10)));
        assert!(classifier.is_double_tap(Some(Duration::from_millis(100)), Duration::from_millis(400)));
        assert!(!classifier.is_double_tap(Some(Duration::from_millis(100)), Duration::from_millis(401)));
    }

    #[test]
    fn test_swipe_needs_distance_speed_and_time() {
        let classifier = GestureClassifier::new(RecognitionConfig::default());
        let mut s = state();
        s.distance = 40.0;
        s.velocity = Point::new(0.2, 0.25);
        assert!(classifier.is_swipe(&s, Duration::from_millis(200)));
        assert!(!classifier.is_swipe(&s, Duration::from_millis(400)));
        s.velocity = Point::new(0.2, 0.1);
        assert!(!classifier.is_swipe(&s, Duration::from_millis(200)));
    }

    #[test]
    fn test_multi_touch_tie_break() {
        let classifier = GestureClassifier::new(RecognitionConfig::default());
        let mut s = state();
        s.contacts = 2;
        s.scale = 1.15;
        s.rotation = 30.0;
        assert_eq!(classifier.multi_touch(&s), GestureKind::Pinch);
        s.scale = 1.05;
        assert_eq!(classifier.multi_touch(&s), GestureKind::Rotate);
        s.rotation = -4.0;
        assert_eq!(classifier.multi_touch(&s), GestureKind::Pan);
    }

    #[test]
    fn test_long_press_requires_single_unlatched_contact() {
        let classifier = GestureClassifier::new(RecognitionConfig::default());
        let mut s = state();
        assert!(classifier.is_long_press(&s));
        s.kind = Some(GestureKind::Pan);
        assert!(!classifier.is_long_press(&s));
        s.kind = None;
        s.contacts = 2;
        assert!(!classifier.is_long_press(&s));
    }
}
