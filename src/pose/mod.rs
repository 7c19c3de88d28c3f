// Pose module - the boundary to the external landmark/pose estimator
//
// The estimator itself is an opaque collaborator. This module only defines
// what crosses the boundary:
// - PoseSample: one timestamped (pitch, yaw, roll) reading
// - PoseReading: a sample, or "no face detected" for this frame
// - PoseSource: the trait the capture thread drives
//
// Two sources ship with the crate: a channel-fed source for embedding the
// pipeline behind another capture loop (and for tests), and a synthetic
// sweep source used by the CLI.

pub mod channel;
pub mod synthetic;

use std::fmt;
use std::time::{Duration, Instant};

use crate::axis::{Axis, PerAxis};

pub use channel::{ChannelPoseSource, PoseFeeder};
pub use synthetic::SyntheticPoseSource;

/// One timestamped head-pose reading in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub timestamp: Instant,
}

impl PoseSample {
    pub fn new(pitch: f64, yaw: f64, roll: f64, timestamp: Instant) -> Self {
        Self {
            pitch,
            yaw,
            roll,
            timestamp,
        }
    }

    /// Convenience constructor stamped with `Instant::now()`.
    pub fn now(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self::new(pitch, yaw, roll, Instant::now())
    }

    pub fn angle(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
            Axis::Roll => self.roll,
        }
    }

    pub fn angles(&self) -> PerAxis<f64> {
        PerAxis::new(self.pitch, self.yaw, self.roll)
    }

    /// A sample is usable only if all three angles are finite.
    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}

/// Result of one pose-extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseReading {
    Face(PoseSample),
    /// Frame captured but no face found; no sample this tick.
    NoFace,
}

/// Failures reported by a pose source.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseSourceError {
    /// No frame arrived within the capture timeout.
    Timeout,
    /// A single frame could not be decoded/estimated.
    BadFrame { reason: String },
    /// The device is gone; further reads will not succeed.
    Disconnected { reason: String },
    /// The device could not be opened.
    OpenFailed { reason: String },
}

impl fmt::Display for PoseSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseSourceError::Timeout => write!(f, "capture timed out"),
            PoseSourceError::BadFrame { reason } => write!(f, "bad frame: {}", reason),
            PoseSourceError::Disconnected { reason } => write!(f, "disconnected: {}", reason),
            PoseSourceError::OpenFailed { reason } => write!(f, "open failed: {}", reason),
        }
    }
}

impl std::error::Error for PoseSourceError {}

/// Camera capture plus pose extraction, treated as a single producer stage.
///
/// `next_reading` must return within roughly `timeout` so that `stop()` can
/// interrupt capture in bounded time.
pub trait PoseSource: Send {
    fn open(&mut self) -> Result<(), PoseSourceError>;
    fn next_reading(&mut self, timeout: Duration) -> Result<PoseReading, PoseSourceError>;
    fn close(&mut self) {}
    fn name(&self) -> &str;
}

/// Fold a roll angle into [-90, 90] degrees.
///
/// Euler decomposition of a face pose flips roll by 180 degrees near the
/// singularity; sources that produce raw decompositions should pass roll
/// through this before building a [`PoseSample`].
pub fn normalize_roll(roll: f64) -> f64 {
    if roll > 90.0 {
        roll - 180.0
    } else if roll < -90.0 {
        roll + 180.0
    } else {
        roll
    }
}
