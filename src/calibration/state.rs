// AxisCalibration - learned neutral offset and angular extent per axis
//
// Extents are relative to the neutral offset: a raw angle is first reduced by
// `neutral_offset`, then compared against `[min_extent, max_extent]`.
// Ranges may be asymmetric, but `min_extent < max_extent` and all three values
// finite is an invariant every constructor and edit upholds.

use serde::{Deserialize, Serialize};

use crate::axis::{Axis, PerAxis, RangeBound};
use crate::error::{CalibrationError, ConfigError};

/// Default half-width of a fresh axis range, in degrees.
pub const DEFAULT_EXTENT_DEG: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    pub neutral_offset: f64,
    pub min_extent: f64,
    pub max_extent: f64,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            neutral_offset: 0.0,
            min_extent: -DEFAULT_EXTENT_DEG,
            max_extent: DEFAULT_EXTENT_DEG,
        }
    }
}

impl AxisCalibration {
    /// Create a validated calibration
    ///
    /// # Returns
    /// * `Ok(AxisCalibration)` - All values finite and `min_extent < max_extent`
    /// * `Err(ConfigError::InvalidExtent)` - Otherwise
    pub fn new(neutral_offset: f64, min_extent: f64, max_extent: f64) -> Result<Self, ConfigError> {
        let calibration = Self {
            neutral_offset,
            min_extent,
            max_extent,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.neutral_offset.is_finite()
            && self.min_extent.is_finite()
            && self.max_extent.is_finite();
        if !finite || self.min_extent >= self.max_extent {
            return Err(ConfigError::InvalidExtent {
                neutral_offset: self.neutral_offset,
                min: self.min_extent,
                max: self.max_extent,
            });
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_extent - self.min_extent
    }

    pub fn extent(&self, bound: RangeBound) -> f64 {
        match bound {
            RangeBound::Min => self.min_extent,
            RangeBound::Max => self.max_extent,
        }
    }

    /// Replace one bound, rejecting edits that would break `min < max`.
    ///
    /// Used by manual "set as min/max" actions; the receiver is untouched on
    /// error.
    pub fn with_extent(&self, bound: RangeBound, value: f64) -> Result<Self, CalibrationError> {
        let mut next = *self;
        match bound {
            RangeBound::Min => next.min_extent = value,
            RangeBound::Max => next.max_extent = value,
        }
        if !value.is_finite() || next.min_extent >= next.max_extent {
            return Err(CalibrationError::InvalidExtent {
                min: next.min_extent,
                max: next.max_extent,
            });
        }
        Ok(next)
    }

    /// Replace one bound the way a calibration step learns it.
    ///
    /// `value` is paired with `learned_opposite` when the opposite bound was
    /// learned in the same run, otherwise with the stored opposite bound. The
    /// pair is ordered, so a user who turned "left" during the "right" step
    /// still ends up with an ordered range. A pair that collapses the range
    /// to zero width is rejected.
    pub fn with_learned_extent(
        &self,
        bound: RangeBound,
        value: f64,
        learned_opposite: Option<f64>,
    ) -> Result<Self, CalibrationError> {
        let opposite = learned_opposite.unwrap_or_else(|| self.extent(bound.opposite()));
        let (mut min, mut max) = match bound {
            RangeBound::Min => (value, opposite),
            RangeBound::Max => (opposite, value),
        };
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        if !value.is_finite() || min >= max {
            return Err(CalibrationError::InvalidExtent { min, max });
        }
        Ok(Self {
            neutral_offset: self.neutral_offset,
            min_extent: min,
            max_extent: max,
        })
    }

    /// Neutral-relative angle for a raw reading.
    pub fn relative(&self, raw_angle: f64) -> f64 {
        raw_angle - self.neutral_offset
    }
}

/// Calibration for all three axes.
pub type CalibrationSet = PerAxis<AxisCalibration>;

/// Assign the same neutral offsets to every axis at once.
pub fn with_neutral(set: &CalibrationSet, neutral: PerAxis<f64>) -> CalibrationSet {
    set.map(|axis, calibration| AxisCalibration {
        neutral_offset: neutral[axis],
        ..*calibration
    })
}

/// Axes whose calibration differs between two sets.
pub fn changed_axes(before: &CalibrationSet, after: &CalibrationSet) -> Vec<Axis> {
    Axis::ALL
        .into_iter()
        .filter(|axis| before[*axis] != after[*axis])
        .collect()
}
