//! Events queued on output channels.

/// Opaque identifier of an output channel attached to a sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) usize);

impl ChannelId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Raw channel-voice (or other short) message bytes, released as-is.
    NoteMessage(Vec<u8>),
    /// New tempo in microseconds per beat. Zero is ignored at dispatch.
    TempoChange(u32),
    /// Opens a System Exclusive transfer on the channel.
    SysexStart,
    /// SysEx payload bytes. A 0xF7 byte ends the transfer.
    SysexContinue(Vec<u8>),
}

impl EventKind {
    pub fn is_sysex(&self) -> bool {
        matches!(self, EventKind::SysexStart | EventKind::SysexContinue(_))
    }
}

/// An event due `delta_ticks` after the previous event on the same channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub delta_ticks: u32,
    pub kind: EventKind,
}

impl Event {
    pub fn new(delta_ticks: u32, kind: EventKind) -> Self {
        Self { delta_ticks, kind }
    }
}

/// Units accepted by `SyncEngine::get_position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionUnit {
    Milliseconds,
    Ticks,
}
