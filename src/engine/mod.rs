//! The shared sync engine handle.
//!
//! All state lives in a [`SyncCore`] behind one mutex. The timer thread calls
//! [`SyncEngine::tick`] once per period; producers and the external clock call
//! the other methods from their own threads.

mod core;

pub use self::core::{RunState, SyncStatus};

use self::core::SyncCore;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::event::{ChannelId, Event, EventKind, PositionUnit};
use crate::midi::{ClockMessage, OutputDevice};
use crate::output::OutputChannel;
use crate::sink::NotificationSink;
use crate::sync_mode::SyncMode;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What happened to a call to [`SyncEngine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    /// Another tick was still executing; this one was dropped.
    Skipped,
    Closed,
}

struct Shared {
    core: Mutex<SyncCore>,
    in_tick: AtomicBool,
    queue_capacity: usize,
    sysex_capacity: usize,
}

/// A cloneable handle to one sync engine.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl SyncEngine {
    /// Opens an engine with default capacities in internal sync mode.
    pub fn open<S>(resolution: u32, tempo: u32, sink: S) -> Result<Self>
    where
        S: NotificationSink + 'static,
    {
        Self::open_with(
            SyncConfig {
                resolution,
                tempo,
                ..SyncConfig::default()
            },
            sink,
        )
    }

    pub fn open_with<S>(config: SyncConfig, sink: S) -> Result<Self>
    where
        S: NotificationSink + 'static,
    {
        let core = SyncCore::new(&config, Box::new(sink))?;
        info!(
            "Sync engine opened: {} ticks/beat, {} us/beat, {:?} mode",
            config.resolution, config.tempo, config.mode
        );
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                in_tick: AtomicBool::new(false),
                queue_capacity: config.queue_capacity,
                sysex_capacity: config.sysex_capacity,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SyncCore> {
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the core, failing once the engine is closed.
    fn open_core(&self) -> Result<MutexGuard<'_, SyncCore>> {
        let core = self.lock();
        if core.is_closed() {
            return Err(SyncError::InvalidHandle);
        }
        Ok(core)
    }

    /// Silences and detaches every output. Waits for an in-flight tick.
    pub fn close(&self) -> Result<()> {
        self.open_core()?.close();
        info!("Sync engine closed");
        Ok(())
    }

    /// Stops the transport and closes the engine, so master outputs get a
    /// final Stop and every output is silenced.
    pub fn shutdown(&self) -> Result<()> {
        self.stop()?;
        self.close()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    pub fn start(&self) -> Result<()> {
        self.open_core()?.start();
        info!("Sync started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.open_core()?.stop();
        info!("Sync stopped");
        Ok(())
    }

    /// Freezes the position. With `reset_notes`, sounding notes are silenced
    /// and any unfinished SysEx is dropped.
    pub fn pause(&self, reset_notes: bool) -> Result<()> {
        self.open_core()?.pause(reset_notes);
        info!("Sync paused");
        Ok(())
    }

    /// Resumes from the current position.
    pub fn restart(&self) -> Result<()> {
        if self.open_core()?.restart() {
            info!("Sync restarted");
        }
        Ok(())
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state()
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().status()
    }

    pub fn mode(&self) -> SyncMode {
        self.lock().mode()
    }

    /// Switches between internal and external timing. Takes effect from the
    /// next tick; pending pulse state is discarded.
    pub fn set_mode(&self, mode: SyncMode) -> Result<()> {
        self.open_core()?.set_mode(mode);
        info!("Sync mode set to {:?}", mode);
        Ok(())
    }

    /// Sets the tempo in microseconds per beat.
    pub fn set_tempo(&self, tempo: u32) -> Result<()> {
        self.open_core()?.set_tempo(tempo)?;
        debug!("Tempo set to {} us/beat", tempo);
        Ok(())
    }

    pub fn get_tempo(&self) -> Result<u32> {
        Ok(self.open_core()?.tempo())
    }

    /// Sets ticks per beat, 1 through 960.
    pub fn set_resolution(&self, resolution: u32) -> Result<()> {
        self.open_core()?.set_resolution(resolution)?;
        debug!("Resolution set to {} ticks/beat", resolution);
        Ok(())
    }

    pub fn get_resolution(&self) -> Result<u32> {
        Ok(self.open_core()?.resolution())
    }

    pub fn get_position(&self, unit: PositionUnit) -> Result<u64> {
        Ok(self.open_core()?.position(unit))
    }

    /// Changes the real time each tick accounts for. The driving timer
    /// picks the new period up on its next wait.
    pub fn set_timer_period(&self, period: Duration) -> Result<()> {
        self.open_core()?.set_timer_period(period)?;
        debug!("Timer period set to {:?}", period);
        Ok(())
    }

    pub fn timer_period(&self) -> Result<Duration> {
        Ok(self.open_core()?.timer_period())
    }

    pub fn attach_output(
        &self,
        device: Box<dyn OutputDevice>,
        sync_enabled: bool,
    ) -> Result<ChannelId> {
        // queue reservation happens before taking the lock
        let channel = OutputChannel::new(
            device,
            sync_enabled,
            self.shared.queue_capacity,
            self.shared.sysex_capacity,
        )?;
        self.open_core()?.attach_output(channel)
    }

    /// Queues an event `delta_ticks` after the previous event on `channel`.
    pub fn enqueue(&self, channel: ChannelId, delta_ticks: u32, kind: EventKind) -> Result<()> {
        self.open_core()?
            .enqueue(channel, Event::new(delta_ticks, kind))
    }

    /// Number of events waiting on `channel`.
    pub fn span(&self, channel: ChannelId) -> Result<usize> {
        Ok(self.open_core()?.channel(channel)?.span())
    }

    /// Number of notes `channel` has left sounding.
    pub fn sounding_notes(&self, channel: ChannelId) -> Result<u32> {
        Ok(self.open_core()?.channel(channel)?.notes().sounding_count())
    }

    /// Starts reporting tempo changes made while slaved through
    /// [`NotificationSink::on_tempo_recorded`].
    pub fn attach_sync_input(&self) -> Result<()> {
        self.open_core()?.attach_sync_input();
        Ok(())
    }

    pub fn detach_sync_input(&self) -> Result<()> {
        self.open_core()?.detach_sync_input();
        Ok(())
    }

    pub fn has_sync_input(&self) -> bool {
        self.lock().has_sync_input()
    }

    /// Accounts for one external MIDI clock pulse.
    pub fn feed_external_clock_pulse(&self) -> Result<()> {
        let mut core = self.open_core()?;
        if core.mode() != SyncMode::ExternalSlave {
            return Err(SyncError::InvalidMode);
        }
        // a timer tick arriving now is dropped rather than queued behind us
        let was_in_tick = self.shared.in_tick.swap(true, Ordering::Acquire);
        core.pulse();
        if !was_in_tick {
            self.shared.in_tick.store(false, Ordering::Release);
        }
        Ok(())
    }

    /// Applies one realtime transport message from the clock source.
    pub fn feed_external(&self, message: ClockMessage) -> Result<()> {
        if self.open_core()?.mode() != SyncMode::ExternalSlave {
            return Err(SyncError::InvalidMode);
        }
        match message {
            ClockMessage::Tick => self.feed_external_clock_pulse(),
            ClockMessage::Start => self.start(),
            ClockMessage::Stop => self.stop(),
            ClockMessage::Continue => self.restart(),
        }
    }

    /// Runs one timer period. A call that overlaps a tick still in progress
    /// is dropped.
    pub fn tick(&self) -> TickOutcome {
        if self.shared.in_tick.swap(true, Ordering::Acquire) {
            return TickOutcome::Skipped;
        }
        let outcome = {
            let mut core = self.lock();
            if core.is_closed() {
                TickOutcome::Closed
            } else {
                core.tick();
                TickOutcome::Ran
            }
        };
        self.shared.in_tick.store(false, Ordering::Release);
        outcome
    }
}
