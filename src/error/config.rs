// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3007
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    pub const CC_NUMBER_OUT_OF_RANGE: i32 = 3001;
    pub const CHANNEL_OUT_OF_RANGE: i32 = 3002;
    pub const OUTPUT_OUT_OF_RANGE: i32 = 3003;
    pub const INVALID_EXTENT: i32 = 3004;
    pub const IO: i32 = 3005;
    pub const PARSE: i32 = 3006;
    pub const INVALID_PARAMETER: i32 = 3007;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=ConfigStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration validation and persistence errors
///
/// Out-of-range values are state errors: the edit that carried them is
/// rejected and the published configuration stays unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// CC number above 127
    CcNumberOutOfRange { value: u8 },

    /// MIDI channel outside 1..=16
    ChannelOutOfRange { value: u8 },

    /// Output bound above 127
    OutputOutOfRange { value: u8 },

    /// Calibration extent not finite or min >= max
    InvalidExtent {
        neutral_offset: f64,
        min: f64,
        max: f64,
    },

    /// Reading or writing the configuration file failed
    Io { reason: String },

    /// Configuration file could not be parsed or serialized
    Parse { reason: String },

    /// Pipeline tuning parameter out of range
    InvalidParameter { name: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::CcNumberOutOfRange { .. } => ConfigErrorCodes::CC_NUMBER_OUT_OF_RANGE,
            ConfigError::ChannelOutOfRange { .. } => ConfigErrorCodes::CHANNEL_OUT_OF_RANGE,
            ConfigError::OutputOutOfRange { .. } => ConfigErrorCodes::OUTPUT_OUT_OF_RANGE,
            ConfigError::InvalidExtent { .. } => ConfigErrorCodes::INVALID_EXTENT,
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
            ConfigError::Parse { .. } => ConfigErrorCodes::PARSE,
            ConfigError::InvalidParameter { .. } => ConfigErrorCodes::INVALID_PARAMETER,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::CcNumberOutOfRange { value } => {
                format!("CC number must be in 0..=127 (got {})", value)
            }
            ConfigError::ChannelOutOfRange { value } => {
                format!("MIDI channel must be in 1..=16 (got {})", value)
            }
            ConfigError::OutputOutOfRange { value } => {
                format!("Output bound must be in 0..=127 (got {})", value)
            }
            ConfigError::InvalidExtent {
                neutral_offset,
                min,
                max,
            } => format!(
                "Invalid calibration: offset {}, min {}, max {} (need finite values and min < max)",
                neutral_offset, min, max
            ),
            ConfigError::Io { reason } => format!("Config I/O failed: {}", reason),
            ConfigError::Parse { reason } => format!("Config parse failed: {}", reason),
            ConfigError::InvalidParameter { name, reason } => {
                format!("Invalid parameter {}: {}", name, reason)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            reason: err.to_string(),
        }
    }
}
