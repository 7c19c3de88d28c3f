// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use tokio::sync::broadcast;

use crate::calibration::CalibrationProgress;
use crate::mapping::MappedValue;

/// Progress updates arrive at most a few per step.
const CALIBRATION_BUFFER: usize = 50;
/// Three values per sample at camera rate; roughly one second of burst.
const MAPPED_BUFFER: usize = 100;

/// Manages the UI-facing broadcast channels
///
/// Channels are created eagerly so subscribers may attach before the pipeline
/// starts and keep their receivers across start/stop cycles. Slow subscribers
/// lag (old messages are dropped); publishing never blocks the worker.
///
/// # Channel Types
/// - Calibration: wizard progress on every step change
/// - Mapped: every MappedValue the worker sends, in pitch, yaw, roll order
pub struct BroadcastChannelManager {
    calibration: broadcast::Sender<CalibrationProgress>,
    mapped: broadcast::Sender<MappedValue>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        let (calibration, _) = broadcast::channel(CALIBRATION_BUFFER);
        let (mapped, _) = broadcast::channel(MAPPED_BUFFER);
        Self {
            calibration,
            mapped,
        }
    }

    // ========================================================================
    // CALIBRATION CHANNEL
    // ========================================================================

    pub fn calibration_sender(&self) -> broadcast::Sender<CalibrationProgress> {
        self.calibration.clone()
    }

    /// Publish progress; returns the number of subscribers reached.
    pub fn publish_calibration(&self, progress: CalibrationProgress) -> usize {
        // No subscribers is fine
        self.calibration.send(progress).unwrap_or(0)
    }

    pub fn subscribe_calibration(&self) -> broadcast::Receiver<CalibrationProgress> {
        self.calibration.subscribe()
    }

    // ========================================================================
    // MAPPED VALUE CHANNEL
    // ========================================================================

    pub fn publish_mapped(&self, value: MappedValue) -> usize {
        self.mapped.send(value).unwrap_or(0)
    }

    pub fn subscribe_mapped(&self) -> broadcast::Receiver<MappedValue> {
        self.mapped.subscribe()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
