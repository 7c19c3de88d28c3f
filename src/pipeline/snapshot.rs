//! Read-only view of the pipeline for the UI layer.

use serde::{Deserialize, Serialize};

use crate::axis::PerAxis;
use crate::calibration::CalibrationProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    #[default]
    Stopped,
    Running,
    Calibrating,
}

/// Consistent copy of pipeline state; written under one lock by the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub mode: PipelineMode,
    /// Last raw pose, `None` before the first face or after stop
    pub angles: Option<PerAxis<f64>>,
    /// Current output per axis; held while no face is detected
    pub midi_values: PerAxis<Option<u8>>,
    pub calibration: Option<CalibrationProgress>,
    pub samples_processed: u64,
    pub frames_dropped: u64,
    /// Device fault that stopped the last run
    pub last_fault: Option<String>,
}

impl PipelineSnapshot {
    pub fn is_running(&self) -> bool {
        self.mode != PipelineMode::Stopped
    }
}
