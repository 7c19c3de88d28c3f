//! Debug sink that validates and drops every message.

use crate::error::PipelineError;

use super::{cc_message_bytes, MidiEmitter};

#[derive(Debug, Default)]
pub struct NullEmitter {
    sent: u64,
}

impl NullEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl MidiEmitter for NullEmitter {
    fn send_cc(&mut self, channel: u8, cc_number: u8, value: u8) -> Result<(), PipelineError> {
        let bytes = cc_message_bytes(channel, cc_number, value)?;
        self.sent += 1;
        tracing::trace!(?bytes, "null emitter dropped CC");
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
