//! Configuration loading, validation and persistence
//!
//! The on-disk record is JSON. Loading is forgiving: a file that is missing or
//! unparseable yields full defaults, missing fields take their defaults, and
//! an axis record that is malformed or out of range is replaced by that
//! axis's defaults with a warning. Saving happens only on explicit request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::axis::{Axis, PerAxis};
use crate::calibration::{AxisCalibration, CalibrationSet, StepDurations};
use crate::error::{ConfigError, ErrorCode};
use crate::mapping::SmoothingAlpha;

/// Default configuration file name, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "face_midi_config.json";

/// Per-axis mapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRuntimeConfig {
    pub enabled: bool,
    /// MIDI controller number (0-127)
    pub cc_number: u8,
    /// MIDI channel in user numbering (1-16)
    pub channel: u8,
    pub output_min: u8,
    pub output_max: u8,
    pub calibration: AxisCalibration,
}

impl Default for AxisRuntimeConfig {
    fn default() -> Self {
        Self::default_for(Axis::Pitch)
    }
}

impl AxisRuntimeConfig {
    /// Factory defaults: CC 1 (modulation), 2 (breath) and 3 for pitch, yaw
    /// and roll, channel 1, full 0-127 output, +/-30 degree range.
    pub fn default_for(axis: Axis) -> Self {
        let cc_number = match axis {
            Axis::Pitch => 1,
            Axis::Yaw => 2,
            Axis::Roll => 3,
        };
        Self {
            enabled: true,
            cc_number,
            channel: 1,
            output_min: 0,
            output_max: 127,
            calibration: AxisCalibration::default(),
        }
    }

    /// Check every field against its legal range
    ///
    /// # Returns
    /// * `Ok(())` - Configuration can be published
    /// * `Err(ConfigError)` - First out-of-range field found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cc_number > 127 {
            return Err(ConfigError::CcNumberOutOfRange {
                value: self.cc_number,
            });
        }
        if !(1..=16).contains(&self.channel) {
            return Err(ConfigError::ChannelOutOfRange {
                value: self.channel,
            });
        }
        for value in [self.output_min, self.output_max] {
            if value > 127 {
                return Err(ConfigError::OutputOutOfRange { value });
            }
        }
        self.calibration.validate()
    }
}

/// Mapping configuration for all three axes, published as one immutable value
pub type AxesConfig = PerAxis<AxisRuntimeConfig>;

pub fn default_axes() -> AxesConfig {
    PerAxis::from_fn(AxisRuntimeConfig::default_for)
}

/// Calibration portion of an axes config.
pub fn calibration_of(axes: &AxesConfig) -> CalibrationSet {
    axes.map(|_, config| config.calibration)
}

/// Camera capture parameters handed to the pose source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub device_id: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// MIDI output selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Output port index; `None` opens a virtual port where supported
    pub port_index: Option<usize>,
    pub virtual_port_name: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            port_index: None,
            virtual_port_name: "Face to MIDI".to_string(),
        }
    }
}

/// Pipeline tuning constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// EMA coefficient in (0, 1]; higher follows the head more tightly
    pub smoothing_alpha: f64,
    /// Upper bound on a single capture call
    pub capture_timeout_ms: u64,
    /// Consecutive capture failures before the camera is declared unavailable
    pub max_consecutive_capture_errors: u32,
    /// Worker wake-up interval when no sample arrives
    pub idle_tick_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: SmoothingAlpha::DEFAULT,
            capture_timeout_ms: 200,
            max_consecutive_capture_errors: 5,
            idle_tick_ms: 50,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        SmoothingAlpha::new(self.smoothing_alpha)?;
        if self.capture_timeout_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "capture_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_consecutive_capture_errors == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_consecutive_capture_errors",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.idle_tick_ms == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "idle_tick_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }
}

/// Calibration wizard timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub neutral_step_ms: u64,
    pub directional_step_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let durations = StepDurations::default();
        Self {
            neutral_step_ms: durations.neutral.as_millis() as u64,
            directional_step_ms: durations.directional.as_millis() as u64,
        }
    }
}

impl CalibrationConfig {
    pub fn step_durations(&self) -> StepDurations {
        StepDurations {
            neutral: Duration::from_millis(self.neutral_step_ms),
            directional: Duration::from_millis(self.directional_step_ms),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_axes")]
    pub axes: AxesConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            axes: default_axes(),
            camera: CameraConfig::default(),
            midi: MidiConfig::default(),
            pipeline: PipelineConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a configuration record, merging it over the defaults
    ///
    /// Per-axis problems are repaired (axis reset to defaults, warning
    /// logged). Structural problems elsewhere are returned as errors.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let loaded: Value = serde_json::from_str(json)?;
        let mut merged = serde_json::to_value(AppConfig::default())?;
        merge_json(&mut merged, loaded);

        let axes = merged
            .as_object_mut()
            .and_then(|root| root.remove("axes"))
            .unwrap_or(Value::Null);
        let mut config: AppConfig = serde_json::from_value(merged)?;
        config.axes = PerAxis::from_fn(|axis| parse_axis(axis, axes.get(axis.display_name())));

        if let Err(err) = config.pipeline.validate() {
            log::warn!("[Config] {}. Using default pipeline settings.", err.message());
            config.pipeline = PipelineConfig::default();
        }
        Ok(config)
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration; if the file doesn't exist or its JSON is
    /// invalid, the default configuration.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] Failed to load config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err.message()
                );
                Self::default()
            }
        }
    }

    /// Strict variant of [`AppConfig::load_from_file`] that reports failures.
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        log::info!("[Config] Saved configuration to {:?}", path.as_ref());
        Ok(())
    }

    /// Validate every section without repairing anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (_, axis) in self.axes.iter() {
            axis.validate()?;
        }
        self.pipeline.validate()
    }
}

fn parse_axis(axis: Axis, value: Option<&Value>) -> AxisRuntimeConfig {
    let Some(value) = value else {
        return AxisRuntimeConfig::default_for(axis);
    };
    let parsed = serde_json::from_value::<AxisRuntimeConfig>(value.clone())
        .map_err(ConfigError::from)
        .and_then(|config| config.validate().map(|_| config));

    match parsed {
        Ok(config) => config,
        Err(err) => {
            log::warn!(
                "[Config] Invalid {} axis configuration: {}. Using axis defaults.",
                axis,
                err.message()
            );
            AxisRuntimeConfig::default_for(axis)
        }
    }
}

/// Recursively overlay `loaded` onto `base`; keys absent from `base` are ignored.
fn merge_json(base: &mut Value, loaded: Value) {
    match (base, loaded) {
        (Value::Object(base_map), Value::Object(loaded_map)) => {
            for (key, loaded_value) in loaded_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json(base_value, loaded_value);
                }
            }
        }
        (base, loaded) => *base = loaded,
    }
}
