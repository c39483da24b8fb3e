//! Notifications emitted by the sync engine.

use crate::event::ChannelId;
use crate::midi::MidiError;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};

/// Problems detected on the timer path. They cannot be returned to a caller,
/// so they are reported through the sink instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An event's absolute due tick does not fit in the tick counter.
    DueTickOverflow { channel: ChannelId },
    /// The slave clock was asked to step backwards past its last pulse.
    TickUnderflow { elapsed: u64, last_pulse: u64 },
    DeviceError { channel: ChannelId, error: MidiError },
    SysexOverflow { channel: ChannelId, capacity: usize },
    /// A SysEx continuation arrived with no transfer open.
    OrphanSysexContinuation { channel: ChannelId },
}

/// Receiver of timing notifications. Called with the engine lock held, from
/// the timer thread or from the thread driving a lifecycle call, so
/// implementations must return promptly and never block.
pub trait NotificationSink: Send + Sync {
    fn on_beat(&self);
    fn on_buffer_ready(&self, channel: ChannelId);
    fn on_sync_done(&self);

    fn on_diagnostic(&self, diagnostic: Diagnostic) {
        warn!("sync diagnostic: {:?}", diagnostic);
    }

    /// A tempo change recorded for the attached sync input, `delta_ticks`
    /// after the previous recorded event.
    fn on_tempo_recorded(&self, _delta_ticks: u64, _tempo: u32) {}
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn on_beat(&self) {}
    fn on_buffer_ready(&self, _channel: ChannelId) {}
    fn on_sync_done(&self) {}
    fn on_diagnostic(&self, _diagnostic: Diagnostic) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotification {
    Beat,
    BufferReady(ChannelId),
    SyncDone,
    Diagnostic(Diagnostic),
    TempoRecorded { delta_ticks: u64, tempo: u32 },
}

/// Forwards notifications over a bounded crossbeam channel.
///
/// Sends never block: when the consumer falls behind, notifications are
/// dropped and counted.
pub struct ChannelSink {
    tx: Sender<SyncNotification>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<SyncNotification>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn post(&self, notification: SyncNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl NotificationSink for ChannelSink {
    fn on_beat(&self) {
        self.post(SyncNotification::Beat);
    }

    fn on_buffer_ready(&self, channel: ChannelId) {
        self.post(SyncNotification::BufferReady(channel));
    }

    fn on_sync_done(&self) {
        self.post(SyncNotification::SyncDone);
    }

    fn on_diagnostic(&self, diagnostic: Diagnostic) {
        self.post(SyncNotification::Diagnostic(diagnostic));
    }

    fn on_tempo_recorded(&self, delta_ticks: u64, tempo: u32) {
        self.post(SyncNotification::TempoRecorded { delta_ticks, tempo });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, rx) = ChannelSink::new(4);
        sink.on_beat();
        sink.on_buffer_ready(ChannelId(2));
        sink.on_sync_done();

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                SyncNotification::Beat,
                SyncNotification::BufferReady(ChannelId(2)),
                SyncNotification::SyncDone,
            ]
        );
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelSink::new(1);
        sink.on_beat();
        sink.on_beat();
        sink.on_beat();
        assert_eq!(sink.dropped(), 2);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
