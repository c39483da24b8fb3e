//! MIDI status bytes and realtime transport parsing.

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
pub const TIMING_CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;

/// Controller number of the "All Notes Off" channel mode message.
pub const ALL_NOTES_OFF: u8 = 123;

/// Realtime transport messages that drive a slaved engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMessage {
    Tick,
    Start,
    Stop,
    Continue,
}

impl ClockMessage {
    /// Recognises a realtime message by its status byte. Anything else,
    /// including channel messages, yields `None`.
    pub fn parse(data: &[u8]) -> Option<ClockMessage> {
        match *data.first()? {
            TIMING_CLOCK => Some(ClockMessage::Tick),
            START => Some(ClockMessage::Start),
            STOP => Some(ClockMessage::Stop),
            CONTINUE => Some(ClockMessage::Continue),
            _ => None,
        }
    }
}
