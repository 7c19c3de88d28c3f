//! Telemetry event types describing pipeline health for the CLI and any
//! embedding UI.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::calibration::CalibrationStep;

/// Lifecycle transitions of the pipeline coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    PipelineStarted,
    PipelineStopped,
    CalibrationStarted,
    CalibrationCompleted,
    CalibrationCancelled,
}

/// Non-fatal calibration outcomes worth surfacing to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationWarningKind {
    /// Step ended with no samples; treated as skipped
    NoSamplesCollected,
    /// Learned extent would have collapsed the range; not committed
    InvalidExtent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Sample-to-emit latency over a rolling window
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    /// Samples overwritten in the mailbox before the worker took them
    FramesDropped { total: u64 },
    CaptureFault {
        consecutive_errors: u32,
        reason: String,
    },
    MidiSendFailed { axis: Axis, reason: String },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    CalibrationWarning {
        step: CalibrationStep,
        kind: CalibrationWarningKind,
    },
}
