use super::notes::NoteTracker;
use super::sysex::{SysexAssembler, SysexProgress};
use crate::clock::TickClock;
use crate::error::{Result, SyncError};
use crate::event::{ChannelId, Event, EventKind};
use crate::midi::OutputDevice;
use crate::sink::{Diagnostic, NotificationSink};
use log::trace;
use std::collections::VecDeque;

/// Pending events for one output destination.
///
/// The queue is a ring buffer reserved to its full capacity on construction;
/// `enqueue` rejects events beyond it rather than growing. A new channel
/// reports as `ChannelId(0)` until the engine attaches it.
pub struct OutputChannel {
    id: ChannelId,
    device: Box<dyn OutputDevice>,
    queue: VecDeque<Event>,
    capacity: usize,
    sync_enabled: bool,
    last_event_ticks: u64,
    sysex: SysexAssembler,
    notes: NoteTracker,
}

impl OutputChannel {
    pub fn new(
        device: Box<dyn OutputDevice>,
        sync_enabled: bool,
        capacity: usize,
        sysex_capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(SyncError::AllocationFailure(
                "output queue capacity must be non-zero".to_string(),
            ));
        }

        let mut queue = VecDeque::new();
        queue
            .try_reserve_exact(capacity)
            .map_err(|e| SyncError::AllocationFailure(e.to_string()))?;

        Ok(Self {
            id: ChannelId(0),
            device,
            queue,
            capacity,
            sync_enabled,
            last_event_ticks: 0,
            sysex: SysexAssembler::new(sysex_capacity),
            notes: NoteTracker::new(),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: ChannelId) {
        self.id = id;
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Number of queued events.
    pub fn span(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn last_event_ticks(&self) -> u64 {
        self.last_event_ticks
    }

    pub fn sysex_in_progress(&self) -> bool {
        self.sysex.in_progress()
    }

    /// True when nothing is queued and no SysEx transfer is open.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && !self.sysex.in_progress()
    }

    pub fn notes(&self) -> &NoteTracker {
        &self.notes
    }

    pub fn enqueue(&mut self, event: Event) -> Result<()> {
        if self.queue.len() >= self.capacity {
            return Err(SyncError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(event);
        Ok(())
    }

    /// Moves the time origin back to zero for a fresh start.
    pub fn rewind(&mut self) {
        self.last_event_ticks = 0;
    }

    /// Sends a single-byte realtime message `count` times, if this channel
    /// carries sync.
    pub fn send_realtime(&mut self, status: u8, count: u64, sink: &dyn NotificationSink) {
        if !self.sync_enabled {
            return;
        }
        for _ in 0..count {
            if let Err(error) = self.device.send(&[status]) {
                sink.on_diagnostic(Diagnostic::DeviceError {
                    channel: self.id,
                    error,
                });
                break;
            }
        }
    }

    /// Sends Note Off for every note this channel left sounding.
    pub fn silence(&mut self, sink: &dyn NotificationSink) {
        if let Err(error) = self.notes.silence(&mut *self.device) {
            sink.on_diagnostic(Diagnostic::DeviceError {
                channel: self.id,
                error,
            });
        }
    }

    /// Drops an unfinished SysEx transfer so queued events can flow again.
    pub fn flush_sysex(&mut self) {
        if self.sysex.in_progress() {
            trace!("channel {:?}: flushing unfinished sysex", self.id);
        }
        self.sysex.abort();
    }

    /// Clears everything not yet released and silences the output.
    pub fn hard_reset(&mut self, sink: &dyn NotificationSink) {
        self.queue.clear();
        self.flush_sysex();
        self.silence(sink);
    }

    /// Releases every event due at or before `elapsed_ticks`, in enqueue
    /// order. While a SysEx transfer is open only continuations are released.
    pub fn dispatch(
        &mut self,
        elapsed_ticks: u64,
        clock: &mut TickClock,
        sink: &dyn NotificationSink,
    ) {
        while let Some(head) = self.queue.front() {
            if self.sysex.in_progress() && !matches!(head.kind, EventKind::SysexContinue(_)) {
                break;
            }

            let due = self.last_event_ticks.checked_add(u64::from(head.delta_ticks));
            match due {
                Some(due) if due > elapsed_ticks => break,
                Some(due) => self.last_event_ticks = due,
                None => sink.on_diagnostic(Diagnostic::DueTickOverflow { channel: self.id }),
            }

            let Some(event) = self.queue.pop_front() else {
                break;
            };
            if due.is_some() {
                self.release(event.kind, clock, sink);
            }

            if self.queue.len() == self.capacity / 4 {
                sink.on_buffer_ready(self.id);
            }
        }
    }

    fn release(&mut self, kind: EventKind, clock: &mut TickClock, sink: &dyn NotificationSink) {
        match kind {
            EventKind::TempoChange(0) => {
                trace!("channel {:?}: ignoring zero tempo change", self.id);
            }
            EventKind::TempoChange(tempo) => clock.set_tempo(tempo),
            EventKind::SysexStart => self.sysex.begin(),
            EventKind::SysexContinue(bytes) => match self.sysex.extend(&bytes) {
                SysexProgress::Pending => {}
                SysexProgress::Complete => {
                    if let Err(error) = self.device.send_sysex(self.sysex.message()) {
                        sink.on_diagnostic(Diagnostic::DeviceError {
                            channel: self.id,
                            error,
                        });
                    }
                    self.sysex.finish();
                }
                SysexProgress::Overflow => sink.on_diagnostic(Diagnostic::SysexOverflow {
                    channel: self.id,
                    capacity: self.sysex.capacity(),
                }),
                SysexProgress::NotStarted => {
                    sink.on_diagnostic(Diagnostic::OrphanSysexContinuation { channel: self.id })
                }
            },
            EventKind::NoteMessage(bytes) => match self.device.send(&bytes) {
                Ok(()) => self.notes.track(&bytes),
                Err(error) => sink.on_diagnostic(Diagnostic::DeviceError {
                    channel: self.id,
                    error,
                }),
            },
        }
    }
}
