use super::device::{MidiError, OutputDevice, Result};
use log::{debug, error, info};
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "ticksyncrs-output";

/// An output port opened through midir.
pub struct MidirOutput {
    name: String,
    connection: MidiOutputConnection,
}

impl MidirOutput {
    /// Connects to the first output port whose name contains `device_name`.
    pub fn connect(device_name: &str) -> Result<Self> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let available_ports: Vec<String> = out_ports
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect();
        debug!("Available MIDI output ports: {:?}", available_ports);

        let port = out_ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| {
                error!("MIDI output device '{}' not found", device_name);
                MidiError::ConnectionError(format!("output device '{}' not found", device_name))
            })?;

        let port_name = midi_out
            .port_name(port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        info!("Connecting to MIDI output port: {}", port_name);

        let connection = midi_out
            .connect(port, "ticksyncrs-output-conn")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        Ok(Self {
            name: port_name,
            connection,
        })
    }
}

impl OutputDevice for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.connection
            .send(message)
            .map_err(|e| MidiError::SendError(e.to_string()))
    }
}

/// Names of the available MIDI output ports.
#[cfg(not(feature = "test-mock"))]
pub fn list_output_ports() -> Vec<String> {
    match MidiOutput::new("ticksyncrs-port-lister") {
        Ok(midi_out) => midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect(),
        Err(e) => {
            error!("Failed to list MIDI output ports: {}", e);
            Vec::new()
        }
    }
}

#[cfg(feature = "test-mock")]
pub fn list_output_ports() -> Vec<String> {
    vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
}
