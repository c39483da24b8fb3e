use super::device::{MidiError, OutputDevice, Result};
use std::sync::{Arc, Mutex};

/// An output that stores every message it is sent.
///
/// Clones share the same log, so a test can hand one clone to the engine and
/// inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    name: String,
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingOutput {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Messages that are not MIDI clock (0xF8).
    pub fn non_clock_messages(&self) -> Vec<Vec<u8>> {
        self.messages()
            .into_iter()
            .filter(|m| m.as_slice() != [super::message::TIMING_CLOCK])
            .collect()
    }

    /// Number of messages consisting of exactly `status`.
    pub fn count(&self, status: u8) -> usize {
        self.messages()
            .iter()
            .filter(|m| m.as_slice() == [status])
            .count()
    }

    /// Makes every later send fail, as an unplugged device would.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    fn is_failing(&self) -> bool {
        self.failing.lock().map(|flag| *flag).unwrap_or(false)
    }
}

impl OutputDevice for RecordingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        if self.is_failing() {
            return Err(MidiError::SendError(format!("{} is disconnected", self.name)));
        }
        let mut messages = self
            .messages
            .lock()
            .map_err(|e| MidiError::SendError(e.to_string()))?;
        messages.push(message.to_vec());
        Ok(())
    }
}
