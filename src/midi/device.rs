use thiserror::Error;

/// Custom error type for MIDI device operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MidiError {
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Destination for the bytes an output channel releases.
///
/// Implementations are called from the timer thread while the engine lock is
/// held, so `send` must not block.
pub trait OutputDevice: Send {
    /// Human readable name, used in log messages.
    fn name(&self) -> &str {
        "output"
    }

    /// Sends one complete short or realtime message.
    fn send(&mut self, message: &[u8]) -> Result<()>;

    /// Sends one complete System Exclusive message, 0xF0 through 0xF7.
    fn send_sysex(&mut self, message: &[u8]) -> Result<()> {
        self.send(message)
    }
}
