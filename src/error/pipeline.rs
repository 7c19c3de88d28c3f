// Pipeline error types and constants

use crate::error::{ConfigError, ErrorCode};
use log::error;
use std::fmt;

/// Pipeline error code constants exposed to the control layer
///
/// Error code range: 1001-1008
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Pipeline is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Pipeline is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Camera / pose source could not be opened or stopped delivering frames
    pub const CAMERA_UNAVAILABLE: i32 = 1003;

    /// MIDI output port could not be opened
    pub const MIDI_PORT_UNAVAILABLE: i32 = 1004;

    /// A single MIDI message could not be delivered
    pub const MIDI_SEND_FAILED: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Capture or worker thread could not be spawned
    pub const WORKER_SPAWN_FAILED: i32 = 1007;

    /// Invalid configuration rejected by the pipeline
    pub const CONFIG: i32 = 1008;
}

/// Log a pipeline error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
/// The logging is non-blocking and will not panic on failure.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=PipelineCoordinator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Pipeline-related errors
///
/// These errors cover the coordinator lifecycle and the device boundaries
/// (pose source and MIDI transport). Device errors are fatal to `start()` or
/// to a running pipeline; they never crash the process.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Pipeline is already running
    AlreadyRunning,

    /// Pipeline is not running
    NotRunning,

    /// Camera / pose source unavailable or disconnected
    CameraUnavailable { reason: String },

    /// MIDI output port could not be opened
    MidiPortUnavailable { reason: String },

    /// A MIDI message could not be sent
    MidiSendFailed { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Capture or worker thread could not be spawned
    WorkerSpawnFailed { reason: String },

    /// Configuration rejected
    Config(ConfigError),
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::AlreadyRunning => PipelineErrorCodes::ALREADY_RUNNING,
            PipelineError::NotRunning => PipelineErrorCodes::NOT_RUNNING,
            PipelineError::CameraUnavailable { .. } => PipelineErrorCodes::CAMERA_UNAVAILABLE,
            PipelineError::MidiPortUnavailable { .. } => PipelineErrorCodes::MIDI_PORT_UNAVAILABLE,
            PipelineError::MidiSendFailed { .. } => PipelineErrorCodes::MIDI_SEND_FAILED,
            PipelineError::LockPoisoned { .. } => PipelineErrorCodes::LOCK_POISONED,
            PipelineError::WorkerSpawnFailed { .. } => PipelineErrorCodes::WORKER_SPAWN_FAILED,
            PipelineError::Config(_) => PipelineErrorCodes::CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::AlreadyRunning => {
                "Pipeline already running. Call stop() first.".to_string()
            }
            PipelineError::NotRunning => "Pipeline not running. Call start() first.".to_string(),
            PipelineError::CameraUnavailable { reason } => {
                format!("Camera unavailable: {}", reason)
            }
            PipelineError::MidiPortUnavailable { reason } => {
                format!("Failed to open MIDI port: {}", reason)
            }
            PipelineError::MidiSendFailed { reason } => {
                format!("Failed to send MIDI message: {}", reason)
            }
            PipelineError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            PipelineError::WorkerSpawnFailed { reason } => {
                format!("Failed to spawn pipeline thread: {}", reason)
            }
            PipelineError::Config(err) => format!("Invalid configuration: {}", err.message()),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::WorkerSpawnFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_codes() {
        assert_eq!(PipelineError::AlreadyRunning.code(), 1001);
        assert_eq!(PipelineError::NotRunning.code(), 1002);
        assert_eq!(
            PipelineError::CameraUnavailable {
                reason: "test".to_string()
            }
            .code(),
            1003
        );
        assert_eq!(
            PipelineError::MidiPortUnavailable {
                reason: "test".to_string()
            }
            .code(),
            1004
        );
        assert_eq!(
            PipelineError::MidiSendFailed {
                reason: "test".to_string()
            }
            .code(),
            1005
        );
        assert_eq!(
            PipelineError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            1006
        );
        assert_eq!(
            PipelineError::WorkerSpawnFailed {
                reason: "test".to_string()
            }
            .code(),
            1007
        );
        assert_eq!(
            PipelineError::Config(ConfigError::ChannelOutOfRange { value: 0 }).code(),
            1008
        );
    }

    #[test]
    fn test_pipeline_error_messages() {
        assert!(PipelineError::AlreadyRunning
            .message()
            .contains("already running"));

        let err = PipelineError::CameraUnavailable {
            reason: "5 consecutive capture timeouts".to_string(),
        };
        assert_eq!(
            err.message(),
            "Camera unavailable: 5 consecutive capture timeouts"
        );

        let err = PipelineError::LockPoisoned {
            component: "ConfigStore".to_string(),
        };
        assert!(err.message().contains("ConfigStore"));
    }

    #[test]
    fn test_pipeline_error_display() {
        let display = format!("{}", PipelineError::NotRunning);
        assert!(display.contains("PipelineError"));
        assert!(display.contains("1002"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "no threads left");
        let err: PipelineError = io_err.into();

        match err {
            PipelineError::WorkerSpawnFailed { reason } => {
                assert!(reason.contains("no threads left"));
            }
            _ => panic!("Expected WorkerSpawnFailed variant"),
        }
    }
}
