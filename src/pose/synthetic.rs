// Synthetic pose source - deterministic head sweeps for demos and soak runs
//
// Produces a sinusoidal sweep per axis at a fixed frame rate with optional
// Gaussian-ish jitter and random face dropouts. Seeded, so two runs with the
// same parameters emit the same angle sequence.

use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::axis::PerAxis;

use super::{PoseReading, PoseSample, PoseSource, PoseSourceError};

/// Per-axis sweep amplitude in degrees.
pub const DEFAULT_AMPLITUDE: PerAxis<f64> = PerAxis {
    pitch: 25.0,
    yaw: 35.0,
    roll: 20.0,
};

pub struct SyntheticPoseSource {
    frame_interval: Duration,
    period: Duration,
    amplitude: PerAxis<f64>,
    jitter_deg: f64,
    dropout_probability: f64,
    rng: StdRng,
    seed: u64,
    started_at: Option<Instant>,
    next_frame_at: Option<Instant>,
}

impl SyntheticPoseSource {
    /// # Arguments
    /// * `fps` - Simulated camera frame rate (clamped to 1..=240)
    /// * `period` - Time for one full sweep cycle
    pub fn new(fps: u32, period: Duration) -> Self {
        let fps = fps.clamp(1, 240);
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / fps as f64),
            period: period.max(Duration::from_millis(100)),
            amplitude: DEFAULT_AMPLITUDE,
            jitter_deg: 0.0,
            dropout_probability: 0.0,
            rng: StdRng::seed_from_u64(0),
            seed: 0,
            started_at: None,
            next_frame_at: None,
        }
    }

    pub fn with_amplitude(mut self, amplitude: PerAxis<f64>) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Uniform jitter of +/- `jitter_deg` on every angle.
    pub fn with_jitter(mut self, jitter_deg: f64) -> Self {
        self.jitter_deg = jitter_deg.abs();
        self
    }

    /// Probability in [0, 1] that a frame reports no face.
    pub fn with_dropouts(mut self, probability: f64) -> Self {
        self.dropout_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Clean (jitter-free) sweep angles at `elapsed` since open.
    pub fn sweep_at(&self, elapsed: Duration) -> PerAxis<f64> {
        let phase = TAU * elapsed.as_secs_f64() / self.period.as_secs_f64();
        // Axes are phase-shifted so they do not all peak together.
        PerAxis::new(
            self.amplitude.pitch * phase.sin(),
            self.amplitude.yaw * (phase + TAU / 3.0).sin(),
            self.amplitude.roll * (phase + 2.0 * TAU / 3.0).sin(),
        )
    }

    fn jitter(&mut self) -> f64 {
        if self.jitter_deg == 0.0 {
            0.0
        } else {
            self.rng.gen_range(-self.jitter_deg..=self.jitter_deg)
        }
    }
}

impl PoseSource for SyntheticPoseSource {
    fn open(&mut self) -> Result<(), PoseSourceError> {
        let now = Instant::now();
        self.started_at = Some(now);
        self.next_frame_at = Some(now);
        self.rng = StdRng::seed_from_u64(self.seed);
        Ok(())
    }

    fn next_reading(&mut self, timeout: Duration) -> Result<PoseReading, PoseSourceError> {
        let (started_at, due) = match (self.started_at, self.next_frame_at) {
            (Some(started), Some(due)) => (started, due),
            _ => {
                return Err(PoseSourceError::Disconnected {
                    reason: "synthetic source not opened".to_string(),
                })
            }
        };

        let now = Instant::now();
        let wait = due.saturating_duration_since(now);
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(PoseSourceError::Timeout);
        }
        std::thread::sleep(wait);
        self.next_frame_at = Some(due + self.frame_interval);

        if self.dropout_probability > 0.0 && self.rng.gen_bool(self.dropout_probability) {
            return Ok(PoseReading::NoFace);
        }

        let timestamp = Instant::now();
        let clean = self.sweep_at(timestamp.saturating_duration_since(started_at));
        let pitch = clean.pitch + self.jitter();
        let yaw = clean.yaw + self.jitter();
        let roll = clean.roll + self.jitter();

        Ok(PoseReading::Face(PoseSample::new(pitch, yaw, roll, timestamp)))
    }

    fn close(&mut self) {
        self.started_at = None;
        self.next_frame_at = None;
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
