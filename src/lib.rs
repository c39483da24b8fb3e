//! Tick-accurate MIDI sync: a fixed-point clock drives per-output event
//! queues, emits MIDI clock as master, or follows an external clock as slave.

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod midi;
pub mod output;
pub mod sink;
pub mod sync_mode;
pub mod timer;
pub mod ui;

pub use cli::Args;
pub use clock::TickClock;
pub use config::SyncConfig;
pub use engine::{RunState, SyncEngine, SyncStatus, TickOutcome};
pub use error::{Result, SyncError};
pub use event::{ChannelId, Event, EventKind, PositionUnit};
pub use sink::{ChannelSink, Diagnostic, NotificationSink, NullSink, SyncNotification};
pub use sync_mode::SyncMode;
pub use timer::SyncTimer;

/// Names of all MIDI ports, outputs first.
pub fn handle_device_list() -> Vec<String> {
    let mut devices = midi::list_output_ports();
    for input in midi::list_input_ports() {
        if !devices.contains(&input) {
            devices.push(input);
        }
    }
    devices
}
