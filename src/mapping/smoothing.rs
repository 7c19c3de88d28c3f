// Exponential smoothing for per-axis angle streams

use crate::error::ConfigError;

/// Validated single-pole low-pass coefficient in (0, 1].
///
/// `1.0` disables smoothing; smaller values trade latency for stability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingAlpha(f64);

impl SmoothingAlpha {
    pub const DEFAULT: f64 = 0.3;

    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        if alpha.is_finite() && alpha > 0.0 && alpha <= 1.0 {
            Ok(Self(alpha))
        } else {
            Err(ConfigError::InvalidParameter {
                name: "smoothing_alpha",
                reason: format!("must be in (0, 1], got {}", alpha),
            })
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// One filter step. The first sample seeds the filter and passes through.
    pub fn apply(&self, previous: Option<f64>, input: f64) -> f64 {
        match previous {
            Some(last) => self.0 * input + (1.0 - self.0) * last,
            None => input,
        }
    }
}

impl Default for SmoothingAlpha {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}
