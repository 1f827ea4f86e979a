//! Recognition thresholds
//!
//! The configuration is a flat set of thresholds. Files and runtime updates are
//! treated as patches over a base configuration, and the merged result is
//! validated before it replaces anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::Result;

/// Thresholds used to classify a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecognitionConfig {
    /// Master switch; when off, pointer and wheel events are ignored
    pub enabled: bool,

    /// Maximum displacement (px) for a tap or long press
    pub tap_max_distance: f64,

    /// Maximum down-to-up time for a tap
    #[serde(with = "millis")]
    pub tap_max_duration: Duration,

    /// Maximum gap between two taps forming a double tap
    #[serde(with = "millis")]
    pub double_tap_delay: Duration,

    /// Hold time before a stationary contact becomes a long press
    #[serde(with = "millis")]
    pub long_press_delay: Duration,

    /// Minimum travel (px) for a swipe
    pub swipe_min_distance: f64,

    /// Minimum release speed (px/ms) for a swipe
    pub swipe_min_velocity: f64,

    /// Maximum session duration for a swipe
    #[serde(with = "millis")]
    pub swipe_max_time: Duration,

    /// Minimum |scale - 1| for a pinch
    pub pinch_min_scale_delta: f64,

    /// Minimum |rotation| (degrees) for a rotate
    pub rotate_min_angle: f64,

    /// Run the inertia loop after release
    pub inertia_enabled: bool,

    /// Per-frame velocity multiplier
    pub inertia_decay: f64,

    /// Velocity (px/ms) below which inertia stops
    pub inertia_min_velocity: f64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tap_max_distance: 10.0,
            tap_max_duration: Duration::from_millis(300),
            double_tap_delay: Duration::from_millis(300),
            long_press_delay: Duration::from_millis(500),
            swipe_min_distance: 30.0,
            swipe_min_velocity: 0.3,
            swipe_max_time: Duration::from_millis(300),
            pinch_min_scale_delta: 0.1,
            rotate_min_angle: 5.0,
            inertia_enabled: true,
            inertia_decay: 0.95,
            inertia_min_velocity: 0.05,
        }
    }
}

impl RecognitionConfig {
    /// Check every threshold
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        non_negative("tap_max_distance", self.tap_max_distance)?;
        non_negative("swipe_min_distance", self.swipe_min_distance)?;
        non_negative("swipe_min_velocity", self.swipe_min_velocity)?;
        positive("pinch_min_scale_delta", self.pinch_min_scale_delta)?;
        non_negative("rotate_min_angle", self.rotate_min_angle)?;
        positive("inertia_min_velocity", self.inertia_min_velocity)?;

        finite("inertia_decay", self.inertia_decay)?;
        if self.inertia_decay <= 0.0 || self.inertia_decay >= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "inertia_decay",
                value: self.inertia_decay,
                min: 0.0,
                max: 1.0,
            });
        }

        non_zero("tap_max_duration", self.tap_max_duration)?;
        non_zero("double_tap_delay", self.double_tap_delay)?;
        non_zero("long_press_delay", self.long_press_delay)?;
        non_zero("swipe_max_time", self.swipe_max_time)?;
        Ok(())
    }

    /// Merge a patch over this configuration and validate the result
    pub fn patched(&self, patch: &ConfigPatch) -> std::result::Result<Self, ConfigError> {
        let merged = patch.apply(*self);
        merged.validate()?;
        Ok(merged)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
            .ok()
            .map(|dir| dir.join("comic-gestures/gestures.toml"))
    }

    /// Load a TOML file as a patch over the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let patch: ConfigPatch = toml::from_str(&contents)?;
        let config = Self::default().patched(&patch)?;
        tracing::info!("Loaded gesture config from {:?}", path);
        Ok(config)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring gesture config {:?}: {}", path, e),
                }
            }
        }
        tracing::info!("No gesture config found, using defaults");
        Self::default()
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::info!("Saved gesture config to {:?}", path);
        Ok(())
    }
}

/// Partial configuration; unset fields keep their current value
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub tap_max_distance: Option<f64>,
    #[serde(deserialize_with = "millis::optional")]
    pub tap_max_duration: Option<Duration>,
    #[serde(deserialize_with = "millis::optional")]
    pub double_tap_delay: Option<Duration>,
    #[serde(deserialize_with = "millis::optional")]
    pub long_press_delay: Option<Duration>,
    pub swipe_min_distance: Option<f64>,
    pub swipe_min_velocity: Option<f64>,
    #[serde(deserialize_with = "millis::optional")]
    pub swipe_max_time: Option<Duration>,
    pub pinch_min_scale_delta: Option<f64>,
    pub rotate_min_angle: Option<f64>,
    pub inertia_enabled: Option<bool>,
    pub inertia_decay: Option<f64>,
    pub inertia_min_velocity: Option<f64>,
}

impl ConfigPatch {
    pub fn apply(&self, base: RecognitionConfig) -> RecognitionConfig {
        RecognitionConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            tap_max_distance: self.tap_max_distance.unwrap_or(base.tap_max_distance),
            tap_max_duration: self.tap_max_duration.unwrap_or(base.tap_max_duration),
            double_tap_delay: self.double_tap_delay.unwrap_or(base.double_tap_delay),
            long_press_delay: self.long_press_delay.unwrap_or(base.long_press_delay),
            swipe_min_distance: self.swipe_min_distance.unwrap_or(base.swipe_min_distance),
            swipe_min_velocity: self.swipe_min_velocity.unwrap_or(base.swipe_min_velocity),
            swipe_max_time: self.swipe_max_time.unwrap_or(base.swipe_max_time),
            pinch_min_scale_delta: self.pinch_min_scale_delta.unwrap_or(base.pinch_min_scale_delta),
            rotate_min_angle: self.rotate_min_angle.unwrap_or(base.rotate_min_angle),
            inertia_enabled: self.inertia_enabled.unwrap_or(base.inertia_enabled),
            inertia_decay: self.inertia_decay.unwrap_or(base.inertia_decay),
            inertia_min_velocity: self.inertia_min_velocity.unwrap_or(base.inertia_min_velocity),
        }
    }

    /// Combine two patches; fields set in `other` win
    pub fn merge(self, other: ConfigPatch) -> ConfigPatch {
        ConfigPatch {
            enabled: other.enabled.or(self.enabled),
            tap_max_distance: other.tap_max_distance.or(self.tap_max_distance),
            tap_max_duration: other.tap_max_duration.or(self.tap_max_duration),
            double_tap_delay: other.double_tap_delay.or(self.double_tap_delay),
            long_press_delay: other.long_press_delay.or(self.long_press_delay),
            swipe_min_distance: other.swipe_min_distance.or(self.swipe_min_distance),
            swipe_min_velocity: other.swipe_min_velocity.or(self.swipe_min_velocity),
            swipe_max_time: other.swipe_max_time.or(self.swipe_max_time),
            pinch_min_scale_delta: other.pinch_min_scale_delta.or(self.pinch_min_scale_delta),
            rotate_min_angle: other.rotate_min_angle.or(self.rotate_min_angle),
            inertia_enabled: other.inertia_enabled.or(self.inertia_enabled),
            inertia_decay: other.inertia_decay.or(self.inertia_decay),
            inertia_min_velocity: other.inertia_min_velocity.or(self.inertia_min_velocity),
        }
    }

    /// Thresholds tuned for the kind of pointer in use
    pub fn for_device(device: InputDevice) -> ConfigPatch {
        let (tap_max_distance, swipe_min_distance, swipe_min_velocity) = match device {
            // Fingers are imprecise: larger slop and a longer swipe
            InputDevice::Touch => (15.0, 50.0, 0.3),
            InputDevice::Pen => (5.0, 30.0, 0.2),
            InputDevice::Mouse => (5.0, 30.0, 0.2),
        };
        ConfigPatch {
            tap_max_distance: Some(tap_max_distance),
            tap_max_duration: Some(Duration::from_millis(300)),
            double_tap_delay: Some(Duration::from_millis(300)),
            long_press_delay: Some(Duration::from_millis(500)),
            swipe_min_distance: Some(swipe_min_distance),
            swipe_min_velocity: Some(swipe_min_velocity),
            ..ConfigPatch::default()
        }
    }

    pub fn for_accessibility(settings: Accessibility) -> ConfigPatch {
        let mut patch = ConfigPatch {
            inertia_enabled: Some(!settings.reduced_motion),
            ..ConfigPatch::default()
        };
        if settings.large_targets {
            patch.tap_max_distance = Some(20.0);
            patch.swipe_min_distance = Some(60.0);
        }
        patch
    }
}

/// Kind of pointing device driving the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDevice {
    Touch,
    Pen,
    Mouse,
}

/// Accessibility preferences that affect gesture thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accessibility {
    pub reduced_motion: bool,
    pub large_targets: bool,
}

fn finite(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

fn non_zero(field: &'static str, value: Duration) -> std::result::Result<(), ConfigError> {
    if value.is_zero() {
        Err(ConfigError::ZeroDuration { field })
    } else {
        Ok(())
    }
}

/// Durations are stored as whole milliseconds in config files
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(RecognitionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let patch: ConfigPatch = toml::from_str("tap_max_distance = 12.5\nlong_press_delay = 650\n").unwrap();
        let config = RecognitionConfig::default().patched(&patch).unwrap();
        assert_eq!(config.tap_max_distance, 12.5);
        assert_eq!(config.long_press_delay, Duration::from_millis(650));
        assert_eq!(config.swipe_min_distance, 30.0);
    }

    #[test]
    fn test_negative_duration_rejected_by_decoder() {
        assert!(toml::from_str::<ConfigPatch>("tap_max_duration = -5\n").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<ConfigPatch>("tap_distance = 5.0\n").is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = RecognitionConfig::default();

        let patch = ConfigPatch { swipe_min_distance: Some(-1.0), ..ConfigPatch::default() };
        assert_eq!(
            base.patched(&patch),
            Err(ConfigError::Negative { field: "swipe_min_distance", value: -1.0 })
        );

        let patch = ConfigPatch { inertia_decay: Some(1.0), ..ConfigPatch::default() };
        assert!(matches!(base.patched(&patch), Err(ConfigError::OutOfRange { field: "inertia_decay", .. })));

        let patch = ConfigPatch { long_press_delay: Some(Duration::ZERO), ..ConfigPatch::default() };
        assert_eq!(base.patched(&patch), Err(ConfigError::ZeroDuration { field: "long_press_delay" }));

        let patch = ConfigPatch { rotate_min_angle: Some(f64::NAN), ..ConfigPatch::default() };
        assert!(matches!(base.patched(&patch), Err(ConfigError::NotFinite { .. })));
    }

    #[test]
    fn test_device_and_accessibility_presets() {
        let base = RecognitionConfig::default();
        let touch = base.patched(&ConfigPatch::for_device(InputDevice::Touch)).unwrap();
        assert_eq!(touch.tap_max_distance, 15.0);
        assert_eq!(touch.swipe_min_distance, 50.0);

        let patch = ConfigPatch::for_device(InputDevice::Mouse).merge(ConfigPatch::for_accessibility(Accessibility {
            reduced_motion: true,
            large_targets: true,
        }));
        let merged = base.patched(&patch).unwrap();
        assert!(!merged.inertia_enabled);
        assert_eq!(merged.tap_max_distance, 20.0);
        assert_eq!(merged.swipe_min_velocity, 0.2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("comic-gestures-config-{}", std::process::id()));
        let path = dir.join("gestures.toml");
        let config = RecognitionConfig {
            swipe_min_velocity: 0.45,
            double_tap_delay: Duration::from_millis(250),
            ..RecognitionConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = RecognitionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_dir_all(&dir);
    }
}
