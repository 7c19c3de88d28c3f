//! Hardware/software MIDI output through `midir`.

use midir::{MidiOutput, MidiOutputConnection};

use crate::config::MidiConfig;
use crate::error::PipelineError;

use super::{cc_message_bytes, MidiEmitter};

const CLIENT_NAME: &str = "face_midi";

pub struct MidirEmitter {
    connection: Option<MidiOutputConnection>,
    name: String,
}

impl MidirEmitter {
    /// Open the port selected by `config`
    ///
    /// With `port_index` set, connects to that output port. Without it, a
    /// virtual port named `virtual_port_name` is created (Unix only).
    ///
    /// # Errors
    /// `MidiPortUnavailable` when the backend, port index or virtual port
    /// cannot be opened.
    pub fn open(config: &MidiConfig) -> Result<Self, PipelineError> {
        let output = MidiOutput::new(CLIENT_NAME).map_err(unavailable)?;

        match config.port_index {
            Some(index) => {
                let ports = output.ports();
                let port = ports.get(index).ok_or_else(|| PipelineError::MidiPortUnavailable {
                    reason: format!("no output port at index {} ({} available)", index, ports.len()),
                })?;
                let name = output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("port {}", index));
                let connection = output.connect(port, CLIENT_NAME).map_err(unavailable)?;
                tracing::info!(port = %name, "opened MIDI output port");
                Ok(Self {
                    connection: Some(connection),
                    name,
                })
            }
            None => Self::open_virtual(output, &config.virtual_port_name),
        }
    }

    #[cfg(unix)]
    fn open_virtual(output: MidiOutput, name: &str) -> Result<Self, PipelineError> {
        use midir::os::unix::VirtualOutput;

        let connection = output.create_virtual(name).map_err(unavailable)?;
        tracing::info!(port = %name, "created virtual MIDI output port");
        Ok(Self {
            connection: Some(connection),
            name: name.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn open_virtual(_output: MidiOutput, name: &str) -> Result<Self, PipelineError> {
        Err(PipelineError::MidiPortUnavailable {
            reason: format!(
                "virtual port {:?} not supported on this platform; set midi.port_index",
                name
            ),
        })
    }
}

impl MidiEmitter for MidirEmitter {
    fn send_cc(&mut self, channel: u8, cc_number: u8, value: u8) -> Result<(), PipelineError> {
        let bytes = cc_message_bytes(channel, cc_number, value)?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| PipelineError::MidiSendFailed {
                reason: "port closed".to_string(),
            })?;
        connection
            .send(&bytes)
            .map_err(|err| PipelineError::MidiSendFailed {
                reason: err.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            tracing::info!(port = %self.name, "closed MIDI output port");
        }
    }
}

/// Names of the available output ports, indexed as `midi.port_index` expects.
pub fn list_output_ports() -> Result<Vec<String>, PipelineError> {
    let output = MidiOutput::new(CLIENT_NAME).map_err(unavailable)?;
    Ok(output
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            output
                .port_name(port)
                .unwrap_or_else(|_| format!("port {}", index))
        })
        .collect())
}

fn unavailable(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::MidiPortUnavailable {
        reason: err.to_string(),
    }
}
