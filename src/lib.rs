// Face MIDI Core - head pose to MIDI Control-Change pipeline
// Real-time capture, calibration wizard and per-axis mapping with drop-latest
// backpressure between stages

// Module declarations
pub mod axis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod managers;
pub mod mapping;
pub mod midi;
pub mod pipeline;
pub mod pose;
pub mod telemetry;

// Re-exports for convenience
pub use axis::{Axis, PerAxis, RangeBound};
pub use calibration::{AxisCalibration, CalibrationProgress, CalibrationStep};
pub use config::{AppConfig, AxesConfig, AxisRuntimeConfig};
pub use error::{CalibrationError, ConfigError, ErrorCode, PipelineError};
pub use mapping::MappedValue;
pub use midi::MidiEmitter;
pub use pipeline::{Coordinator, PipelineMode, PipelineSnapshot};
pub use pose::{PoseReading, PoseSample, PoseSource};

/// Install the global `tracing` subscriber.
///
/// `try_init` also installs the `log` bridge, so records from config I/O reach
/// the same subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(level: tracing::Level) {
    let result = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
    if result.is_ok() {
        log::debug!("Logging initialized at {}", level);
    }
}
