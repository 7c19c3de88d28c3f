// MIDI module - outbound Control-Change transport boundary
//
// The pipeline worker is the only caller of `MidiEmitter::send_cc`; the
// coordinator keeps the emitter behind a mutex so sends are serialized even
// when the worker is restarted.

pub mod null;
#[cfg(feature = "hardware-midi")]
pub mod port;
pub mod recording;

use crate::error::{ConfigError, PipelineError};

pub use null::NullEmitter;
#[cfg(feature = "hardware-midi")]
pub use port::{list_output_ports, MidirEmitter};
pub use recording::{RecordedCc, RecordingEmitter, RecordingHandle};

/// Control-Change status nibble.
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Sink for outbound Control-Change messages
pub trait MidiEmitter: Send {
    /// Send one CC message
    ///
    /// # Arguments
    /// * `channel` - MIDI channel in user numbering (1-16)
    /// * `cc_number` - Controller number (0-127)
    /// * `value` - Controller value (0-127)
    fn send_cc(&mut self, channel: u8, cc_number: u8, value: u8) -> Result<(), PipelineError>;

    fn name(&self) -> &str;

    /// Release the underlying port, if any.
    fn close(&mut self) {}
}

/// Encode a CC message as `[0xB0 | (channel - 1), cc_number, value]`.
pub fn cc_message_bytes(channel: u8, cc_number: u8, value: u8) -> Result<[u8; 3], PipelineError> {
    if !(1..=16).contains(&channel) {
        return Err(ConfigError::ChannelOutOfRange { value: channel }.into());
    }
    if cc_number > 127 {
        return Err(ConfigError::CcNumberOutOfRange { value: cc_number }.into());
    }
    if value > 127 {
        return Err(ConfigError::OutputOutOfRange { value }.into());
    }
    Ok([CONTROL_CHANGE | (channel - 1), cc_number, value])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_message_encoding() {
        assert_eq!(cc_message_bytes(1, 1, 64).unwrap(), [0xB0, 1, 64]);
        assert_eq!(cc_message_bytes(16, 74, 127).unwrap(), [0xBF, 74, 127]);
    }

    #[test]
    fn test_cc_message_rejects_out_of_range() {
        assert_eq!(
            cc_message_bytes(0, 1, 1),
            Err(PipelineError::Config(ConfigError::ChannelOutOfRange {
                value: 0
            }))
        );
        assert!(cc_message_bytes(17, 1, 1).is_err());
        assert!(cc_message_bytes(1, 128, 1).is_err());
        assert!(cc_message_bytes(1, 1, 128).is_err());
    }
}
