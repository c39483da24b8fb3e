//! Per-destination output queues.

mod channel;
mod notes;
mod sysex;

pub use channel::OutputChannel;
pub use notes::NoteTracker;
pub use sysex::{SysexAssembler, SysexProgress};
