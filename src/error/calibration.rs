// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants exposed to the control layer
///
/// Error code range: 2001-2005
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// A calibration wizard is already active
    pub const ALREADY_CALIBRATING: i32 = 2001;

    /// Calibration requires a running pipeline
    pub const NOT_RUNNING: i32 = 2002;

    /// No calibration wizard is active
    pub const NOT_CALIBRATING: i32 = 2003;

    /// Calibration state lock was poisoned
    pub const STATE_POISONED: i32 = 2004;

    /// A learned extent would violate min < max
    pub const INVALID_EXTENT: i32 = 2005;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationWizard, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These are state errors: they are rejected synchronously at the call that
/// caused them and leave the pipeline state unchanged.
///
/// Error code range: 2001-2005
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A wizard is already active
    AlreadyCalibrating,

    /// The pipeline is stopped
    NotRunning,

    /// No wizard is active
    NotCalibrating,

    /// Wizard lock was poisoned
    StatePoisoned,

    /// Learned extent rejected (non-finite or collapses the range)
    InvalidExtent { min: f64, max: f64 },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::AlreadyCalibrating => CalibrationErrorCodes::ALREADY_CALIBRATING,
            CalibrationError::NotRunning => CalibrationErrorCodes::NOT_RUNNING,
            CalibrationError::NotCalibrating => CalibrationErrorCodes::NOT_CALIBRATING,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
            CalibrationError::InvalidExtent { .. } => CalibrationErrorCodes::INVALID_EXTENT,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::AlreadyCalibrating => "Calibration already in progress".to_string(),
            CalibrationError::NotRunning => {
                "Calibration requires a running pipeline. Call start() first.".to_string()
            }
            CalibrationError::NotCalibrating => "No calibration in progress".to_string(),
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
            CalibrationError::InvalidExtent { min, max } => {
                format!("Invalid extent: min {:.2} must be below max {:.2}", min, max)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
