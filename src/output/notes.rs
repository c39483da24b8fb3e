//! Tracks which notes an output is currently sounding.

use crate::midi::message::{ALL_NOTES_OFF, CONTROL_CHANGE, NOTE_OFF, NOTE_ON};
use crate::midi::{OutputDevice, Result};

/// One bit per note for each of the 16 MIDI channels.
#[derive(Debug, Default, Clone)]
pub struct NoteTracker {
    sounding: [u128; 16],
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the sounding set from a message that was just sent.
    pub fn track(&mut self, message: &[u8]) {
        let [status, data1, rest @ ..] = message else {
            return;
        };
        let channel = usize::from(status & 0x0F);
        let bit = 1u128 << (data1 & 0x7F);
        match status & 0xF0 {
            NOTE_ON => match rest.first().copied() {
                Some(0) => self.sounding[channel] &= !bit,
                Some(_) => self.sounding[channel] |= bit,
                None => {}
            },
            NOTE_OFF => self.sounding[channel] &= !bit,
            CONTROL_CHANGE if *data1 == ALL_NOTES_OFF => self.sounding[channel] = 0,
            _ => {}
        }
    }

    pub fn is_sounding(&self, channel: u8, note: u8) -> bool {
        self.sounding[usize::from(channel & 0x0F)] & (1u128 << (note & 0x7F)) != 0
    }

    pub fn sounding_count(&self) -> u32 {
        self.sounding.iter().map(|bits| bits.count_ones()).sum()
    }

    /// Sends Note Off for every sounding note and forgets them. Keeps going
    /// after a failed send and reports the first error.
    pub fn silence(&mut self, device: &mut dyn OutputDevice) -> Result<()> {
        let mut first_error = None;
        for (channel, bits) in self.sounding.iter_mut().enumerate() {
            while *bits != 0 {
                let note = bits.trailing_zeros() as u8;
                *bits &= !(1u128 << note);
                let message = [NOTE_OFF | channel as u8, note, 0];
                if let Err(err) = device.send(&message) {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
