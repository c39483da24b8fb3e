//! MIDI I/O for the sync engine.
//!
//! - [`OutputDevice`] is the seam between output channels and real ports
//! - [`MidirOutput`] sends through midir
//! - [`RecordingOutput`] captures bytes for tests and dry runs
//! - [`ExternalClockInput`] feeds incoming realtime messages to a handler
mod device;
mod external_clock;
pub mod message;
mod midir_output;
mod recording;

pub use device::{MidiError, OutputDevice, Result};
pub use external_clock::{list_input_ports, ExternalClockInput};
pub use message::ClockMessage;
pub use midir_output::{list_output_ports, MidirOutput};
pub use recording::RecordingOutput;
