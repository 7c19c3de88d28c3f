// Mapping module - raw angle to debounced MIDI CC value
//
// Per axis, per sample:
// 1. subtract the neutral offset
// 2. clamp to [min_extent, max_extent]
// 3. exponential smoothing (first sample seeds the filter)
// 4. linear rescale to [output_min, output_max], round to nearest
// 5. emit only when the value differs from the last one sent
//
// `map_sample` is the pure step; `AxisMapper` owns the state for one axis and
// `MapperBank` drives all three in pitch, yaw, roll order.

pub mod smoothing;

use serde::{Deserialize, Serialize};

use crate::axis::{Axis, PerAxis};
use crate::config::{AxesConfig, AxisRuntimeConfig};
use crate::pose::PoseSample;

pub use smoothing::SmoothingAlpha;

/// One outbound Control-Change, ready for the emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedValue {
    pub axis: Axis,
    pub cc_number: u8,
    /// MIDI channel in user numbering (1-16)
    pub channel: u8,
    pub value: u8,
}

/// Filter and debounce state carried between samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapperState {
    /// Smoothed, clamped, neutral-relative angle
    pub filtered: Option<f64>,
    /// Most recent computed output, sent or not
    pub value: Option<u8>,
    /// Last value handed to the emitter
    pub last_sent: Option<u8>,
}

/// Scale a clamped, neutral-relative angle into the configured output range.
///
/// A zero-width (or non-finite) calibration maps to `output_min`. The result
/// is always inside the inclusive output range, also when the range is
/// inverted (`output_min > output_max`).
pub fn rescale(angle: f64, config: &AxisRuntimeConfig) -> u8 {
    let calibration = &config.calibration;
    let width = calibration.width();
    if !(width > 0.0) || !width.is_finite() || !angle.is_finite() {
        return config.output_min;
    }

    let t = ((angle - calibration.min_extent) / width).clamp(0.0, 1.0);
    let out_min = f64::from(config.output_min);
    let out_max = f64::from(config.output_max);
    let scaled = (out_min + t * (out_max - out_min)).round();

    let lo = config.output_min.min(config.output_max);
    let hi = config.output_min.max(config.output_max);
    (scaled as i64).clamp(i64::from(lo), i64::from(hi)) as u8
}

/// Map one raw angle
///
/// # Returns
/// `(Some(value), state)` when `value` must be sent, `(None, state)` when the
/// output is unchanged or the input unusable. Non-finite input leaves the
/// state untouched.
pub fn map_sample(
    raw_angle: f64,
    config: &AxisRuntimeConfig,
    state: MapperState,
    alpha: SmoothingAlpha,
) -> (Option<u8>, MapperState) {
    if !raw_angle.is_finite() {
        return (None, state);
    }

    let calibration = &config.calibration;
    let relative = calibration.relative(raw_angle);
    // max/min instead of clamp: never panics on a degenerate range
    let clamped = relative.max(calibration.min_extent).min(calibration.max_extent);
    let filtered = alpha.apply(state.filtered, clamped);
    let value = rescale(filtered, config);

    let emit = state.last_sent != Some(value);
    let next = MapperState {
        filtered: Some(filtered),
        value: Some(value),
        last_sent: Some(value),
    };
    (emit.then_some(value), next)
}

/// Stateful mapper for one axis
#[derive(Debug, Clone)]
pub struct AxisMapper {
    axis: Axis,
    state: MapperState,
}

impl AxisMapper {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            state: MapperState::default(),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> MapperState {
        self.state
    }

    /// Current output value, held across no-face ticks.
    pub fn value(&self) -> Option<u8> {
        self.state.value
    }

    /// Feed one raw angle. Disabled axes produce nothing and drop their state,
    /// so re-enabling starts from the next real sample and re-sends.
    pub fn process(
        &mut self,
        raw_angle: f64,
        config: &AxisRuntimeConfig,
        alpha: SmoothingAlpha,
    ) -> Option<MappedValue> {
        if !config.enabled {
            self.reset();
            return None;
        }
        let (emit, next) = map_sample(raw_angle, config, self.state, alpha);
        self.state = next;
        emit.map(|value| MappedValue {
            axis: self.axis,
            cc_number: config.cc_number,
            channel: config.channel,
            value,
        })
    }

    /// Forget the last sent value so the next sample retries the send.
    pub fn mark_send_failed(&mut self) {
        self.state.last_sent = None;
    }

    pub fn reset(&mut self) {
        self.state = MapperState::default();
    }
}

/// The three axis mappers, processed together per sample
#[derive(Debug, Clone)]
pub struct MapperBank {
    mappers: PerAxis<AxisMapper>,
}

impl Default for MapperBank {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperBank {
    pub fn new() -> Self {
        Self {
            mappers: PerAxis::from_fn(AxisMapper::new),
        }
    }

    /// Map all three angles of one sample against one config snapshot.
    ///
    /// Values come back in pitch, yaw, roll order.
    pub fn process(
        &mut self,
        sample: &PoseSample,
        axes: &AxesConfig,
        alpha: SmoothingAlpha,
    ) -> Vec<MappedValue> {
        Axis::ALL
            .into_iter()
            .filter_map(|axis| self.mappers[axis].process(sample.angle(axis), &axes[axis], alpha))
            .collect()
    }

    pub fn mark_send_failed(&mut self, axis: Axis) {
        self.mappers[axis].mark_send_failed();
    }

    pub fn values(&self) -> PerAxis<Option<u8>> {
        self.mappers.map(|_, mapper| mapper.value())
    }

    pub fn reset(&mut self) {
        for axis in Axis::ALL {
            self.mappers[axis].reset();
        }
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
