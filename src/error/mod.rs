// Error types for the face-to-MIDI pipeline
//
// This module defines custom error types for pipeline lifecycle, calibration,
// and configuration operations, providing structured error handling with
// numeric error codes suitable for a UI/control layer.

mod calibration;
mod config;
mod pipeline;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the control surface.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
