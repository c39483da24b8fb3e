//! Multi-packet System Exclusive assembly.

use crate::midi::message::{SYSEX_END, SYSEX_START};

/// Outcome of feeding bytes to a [`SysexAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysexProgress {
    /// More continuation packets are needed.
    Pending,
    /// The end-of-exclusive marker arrived; `message()` holds the transfer.
    Complete,
    /// The payload outgrew the buffer and the transfer was dropped.
    Overflow,
    /// No transfer was open; the bytes were discarded.
    NotStarted,
}

/// Accumulates one SysEx transfer for an output channel.
///
/// The buffer is reserved up front and reused across transfers, so feeding
/// packets from the timer thread never allocates.
#[derive(Debug)]
pub struct SysexAssembler {
    buffer: Vec<u8>,
    capacity: usize,
    in_progress: bool,
}

impl SysexAssembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            in_progress: false,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Opens a transfer, discarding any unfinished one.
    pub fn begin(&mut self) {
        self.buffer.clear();
        self.buffer.push(SYSEX_START);
        self.in_progress = true;
    }

    pub fn extend(&mut self, bytes: &[u8]) -> SysexProgress {
        if !self.in_progress {
            return SysexProgress::NotStarted;
        }

        for &byte in bytes {
            // a leading status byte repeated in the first packet is redundant
            if byte == SYSEX_START && self.buffer.len() == 1 {
                continue;
            }
            if self.buffer.len() == self.capacity {
                self.abort();
                return SysexProgress::Overflow;
            }
            self.buffer.push(byte);
            if byte == SYSEX_END {
                return SysexProgress::Complete;
            }
        }
        SysexProgress::Pending
    }

    /// The assembled transfer, including the framing bytes.
    pub fn message(&self) -> &[u8] {
        &self.buffer
    }

    /// Clears a completed transfer so normal dispatch resumes.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.in_progress = false;
    }

    pub fn abort(&mut self) {
        self.finish();
    }
}
