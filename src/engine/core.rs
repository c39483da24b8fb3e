use crate::clock::{TickClock, MAX_RESOLUTION};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::event::{ChannelId, Event, PositionUnit};
use crate::midi::message::{START, STOP, TIMING_CLOCK};
use crate::output::OutputChannel;
use crate::sink::NotificationSink;
use crate::sync_mode::{Step, SyncMode, SyncModeController};
use log::{debug, trace};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Closed,
    Stopped,
    Running,
    Paused,
}

/// Snapshot of the engine for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub run_state: RunState,
    pub mode: SyncMode,
    pub tempo: u32,
    pub resolution: u32,
    pub elapsed_ticks: u64,
    pub position_ms: u64,
    /// Slave mode is waiting for an overdue external pulse.
    pub holding: bool,
}

/// Everything behind the engine lock.
pub(crate) struct SyncCore {
    run_state: RunState,
    clock: TickClock,
    controller: SyncModeController,
    elapsed_ticks: u64,
    ticks_since_beat: u64,
    ticks_since_clock: u64,
    position_us: u64,
    sync_done_sent: bool,
    channels: Vec<OutputChannel>,
    // elapsed tick of the last tempo recorded upstream, while a sync input is attached
    sync_input: Option<u64>,
    sink: Box<dyn NotificationSink>,
}

impl SyncCore {
    pub(crate) fn new(config: &SyncConfig, sink: Box<dyn NotificationSink>) -> Result<Self> {
        config.validate()?;

        let mut channels = Vec::new();
        channels
            .try_reserve(4)
            .map_err(|e| SyncError::AllocationFailure(e.to_string()))?;

        Ok(Self {
            run_state: RunState::Stopped,
            clock: TickClock::new(config.resolution, config.tempo, config.timer_period()),
            controller: SyncModeController::new(config.mode),
            elapsed_ticks: 0,
            ticks_since_beat: 0,
            ticks_since_clock: 0,
            position_us: 0,
            sync_done_sent: false,
            channels,
            sync_input: None,
            sink,
        })
    }

    pub(crate) fn run_state(&self) -> RunState {
        self.run_state
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.run_state == RunState::Closed
    }

    pub(crate) fn mode(&self) -> SyncMode {
        self.controller.mode()
    }

    pub(crate) fn status(&self) -> SyncStatus {
        SyncStatus {
            run_state: self.run_state,
            mode: self.controller.mode(),
            tempo: self.clock.tempo(),
            resolution: self.clock.resolution(),
            elapsed_ticks: self.elapsed_ticks,
            position_ms: self.position_us / 1_000,
            holding: self.controller.is_holding(),
        }
    }

    fn is_master(&self) -> bool {
        !self.controller.is_slave()
    }

    fn send_transport(&mut self, status: u8) {
        let sink = &*self.sink;
        for channel in &mut self.channels {
            channel.send_realtime(status, 1, sink);
        }
    }

    pub(crate) fn start(&mut self) {
        self.elapsed_ticks = 0;
        self.ticks_since_beat = 0;
        self.ticks_since_clock = 0;
        self.position_us = 0;
        self.clock.reset();
        self.controller.reset();
        if let Some(last) = self.sync_input.as_mut() {
            *last = 0;
        }
        for channel in &mut self.channels {
            channel.rewind();
        }
        if self.is_master() {
            self.send_transport(START);
        }
        self.sync_done_sent = false;
        self.run_state = RunState::Running;
    }

    pub(crate) fn stop(&mut self) {
        if self.is_master() && self.run_state != RunState::Stopped {
            self.send_transport(STOP);
        }
        let sink = &*self.sink;
        for channel in &mut self.channels {
            channel.hard_reset(sink);
        }
        self.run_state = RunState::Stopped;
    }

    pub(crate) fn pause(&mut self, reset_notes: bool) {
        if self.run_state != RunState::Running {
            return;
        }
        self.run_state = RunState::Paused;
        if !reset_notes {
            return;
        }
        if self.is_master() {
            self.send_transport(STOP);
        }
        let sink = &*self.sink;
        for channel in &mut self.channels {
            channel.silence(sink);
            channel.flush_sysex();
        }
    }

    /// Resumes without moving the position. Returns false when already running.
    pub(crate) fn restart(&mut self) -> bool {
        if self.run_state == RunState::Running {
            return false;
        }
        if self.is_master() {
            self.send_transport(START);
        }
        self.sync_done_sent = false;
        self.run_state = RunState::Running;
        true
    }

    pub(crate) fn close(&mut self) {
        let sink = &*self.sink;
        for channel in &mut self.channels {
            channel.hard_reset(sink);
        }
        self.channels.clear();
        self.sync_input = None;
        self.run_state = RunState::Closed;
    }

    pub(crate) fn set_tempo(&mut self, tempo: u32) -> Result<()> {
        if tempo == 0 {
            return Err(SyncError::InvalidTempo(tempo));
        }
        self.clock.set_tempo(tempo);
        self.record_tempo(tempo);
        Ok(())
    }

    pub(crate) fn tempo(&self) -> u32 {
        self.clock.tempo()
    }

    pub(crate) fn set_resolution(&mut self, resolution: u32) -> Result<()> {
        if resolution == 0 || resolution > MAX_RESOLUTION {
            return Err(SyncError::InvalidResolution(resolution));
        }
        let old = u64::from(self.clock.resolution());
        let new = u64::from(resolution);
        self.clock.set_resolution(resolution);
        // keep the fraction of the current beat and clock interval
        self.ticks_since_beat = self.ticks_since_beat * new / old;
        self.ticks_since_clock = self.ticks_since_clock * new / old;
        self.ticks_since_clock %= self.clock.ticks_per_clock();
        Ok(())
    }

    pub(crate) fn resolution(&self) -> u32 {
        self.clock.resolution()
    }

    pub(crate) fn set_timer_period(&mut self, period: Duration) -> Result<()> {
        let period_us = period.as_micros() as u64;
        if period_us == 0 {
            return Err(SyncError::InvalidPeriod(period_us));
        }
        self.clock.set_period(period);
        Ok(())
    }

    pub(crate) fn timer_period(&self) -> Duration {
        self.clock.period()
    }

    pub(crate) fn position(&self, unit: PositionUnit) -> u64 {
        match unit {
            PositionUnit::Milliseconds => self.position_us / 1_000,
            PositionUnit::Ticks => self.elapsed_ticks,
        }
    }

    pub(crate) fn set_mode(&mut self, mode: SyncMode) {
        self.controller.set_mode(mode);
    }

    /// Takes ownership of an already built channel and numbers it.
    pub(crate) fn attach_output(&mut self, mut channel: OutputChannel) -> Result<ChannelId> {
        self.channels
            .try_reserve(1)
            .map_err(|e| SyncError::AllocationFailure(e.to_string()))?;
        let id = ChannelId(self.channels.len());
        channel.assign_id(id);
        debug!(
            "Attached output {:?} ({}), sync {}",
            id,
            channel.device_name(),
            if channel.sync_enabled() { "enabled" } else { "disabled" }
        );
        self.channels.push(channel);
        Ok(id)
    }

    pub(crate) fn enqueue(&mut self, channel: ChannelId, event: Event) -> Result<()> {
        self.channels
            .get_mut(channel.index())
            .ok_or(SyncError::InvalidHandle)?
            .enqueue(event)
    }

    pub(crate) fn channel(&self, channel: ChannelId) -> Result<&OutputChannel> {
        self.channels
            .get(channel.index())
            .ok_or(SyncError::InvalidHandle)
    }

    pub(crate) fn attach_sync_input(&mut self) {
        self.sync_input = Some(self.elapsed_ticks);
    }

    pub(crate) fn detach_sync_input(&mut self) {
        self.sync_input = None;
    }

    pub(crate) fn has_sync_input(&self) -> bool {
        self.sync_input.is_some()
    }

    fn record_tempo(&mut self, tempo: u32) {
        if !self.controller.is_slave() || self.run_state != RunState::Running {
            return;
        }
        if let Some(last) = self.sync_input.as_mut() {
            let delta = self.elapsed_ticks.saturating_sub(*last);
            *last = self.elapsed_ticks;
            self.sink.on_tempo_recorded(delta, tempo);
        }
    }

    /// One timer period.
    pub(crate) fn tick(&mut self) {
        if self.run_state != RunState::Running {
            return;
        }
        self.position_us += self.clock.period().as_micros() as u64;
        let step = self
            .controller
            .step(&mut self.clock, self.elapsed_ticks, &*self.sink);
        self.apply(step);
    }

    /// One external clock pulse. Ignored unless running.
    pub(crate) fn pulse(&mut self) {
        if self.run_state != RunState::Running {
            return;
        }
        self.controller.begin_pulse();
        let step = self
            .controller
            .step(&mut self.clock, self.elapsed_ticks, &*self.sink);
        self.apply(step);
        let tempo = self.controller.finish_pulse(&mut self.clock);
        trace!("pulse at tick {}, tempo now {}", self.elapsed_ticks, tempo);
    }

    fn apply(&mut self, step: Step) {
        let nticks = match step {
            Step::Advance(n) => n,
            Step::Hold => return,
        };

        self.elapsed_ticks += nticks;
        self.ticks_since_beat += nticks;
        let resolution = u64::from(self.clock.resolution());
        while self.ticks_since_beat >= resolution {
            self.ticks_since_beat -= resolution;
            self.sink.on_beat();
        }

        let mut nclocks = 0;
        if self.is_master() {
            let ticks_per_clock = self.clock.ticks_per_clock();
            self.ticks_since_clock += nticks;
            nclocks = self.ticks_since_clock / ticks_per_clock;
            self.ticks_since_clock %= ticks_per_clock;
        }

        let sink = &*self.sink;
        for channel in &mut self.channels {
            if nclocks > 0 {
                channel.send_realtime(TIMING_CLOCK, nclocks, sink);
            }
            channel.dispatch(self.elapsed_ticks, &mut self.clock, sink);
        }

        if !self.sync_done_sent && self.channels.iter().all(OutputChannel::is_drained) {
            self.sync_done_sent = true;
            self.sink.on_sync_done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::midi::RecordingOutput;
    use crate::sink::{ChannelSink, SyncNotification};

    use crossbeam::channel::Receiver;

    fn new_core(resolution: u32, tempo: u32) -> (SyncCore, Receiver<SyncNotification>) {
        let (sink, rx) = ChannelSink::new(4096);
        let config = SyncConfig {
            resolution,
            tempo,
            ..SyncConfig::default()
        };
        (SyncCore::new(&config, Box::new(sink)).unwrap(), rx)
    }

    #[test]
    fn test_tick_ignored_unless_running() {
        let (mut core, rx) = new_core(480, 500_000);
        core.tick();
        assert_eq!(core.position(PositionUnit::Ticks), 0);
        assert_eq!(core.position(PositionUnit::Milliseconds), 0);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_beats_emitted_per_resolution() {
        // one tick per period
        let (mut core, rx) = new_core(100, 100_000);
        core.start();
        for _ in 0..250 {
            core.tick();
        }
        let beats = rx
            .try_iter()
            .filter(|n| *n == SyncNotification::Beat)
            .count();
        assert_eq!(beats, 2);
        assert_eq!(core.position(PositionUnit::Milliseconds), 250);
    }

    #[test]
    fn test_sync_done_with_no_outputs() {
        let (mut core, rx) = new_core(480, 500_000);
        core.start();
        core.tick();
        core.tick();
        let done = rx
            .try_iter()
            .filter(|n| *n == SyncNotification::SyncDone)
            .count();
        assert_eq!(done, 1);
    }

    #[test]
    fn test_tempo_recorded_only_when_slaved_with_input() {
        let (mut core, rx) = new_core(96, 500_000);
        core.start();
        core.set_tempo(400_000).unwrap();
        assert_eq!(rx.try_iter().count(), 0);

        core.set_mode(SyncMode::ExternalSlave);
        core.attach_sync_input();
        core.set_tempo(450_000).unwrap();
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![SyncNotification::TempoRecorded {
                delta_ticks: 0,
                tempo: 450_000
            }]
        );
    }

    #[test]
    fn test_unknown_channel_is_invalid_handle() {
        let (mut core, _rx) = new_core(480, 500_000);
        let event = Event::new(0, EventKind::TempoChange(1));
        assert_eq!(
            core.enqueue(ChannelId(3), event),
            Err(SyncError::InvalidHandle)
        );
    }

    fn output(name: &str, sync_enabled: bool, capacity: usize) -> OutputChannel {
        OutputChannel::new(Box::new(RecordingOutput::new(name)), sync_enabled, capacity, 64).unwrap()
    }

    #[test]
    fn test_attach_assigns_sequential_ids() {
        let (mut core, _rx) = new_core(480, 500_000);
        let a = core.attach_output(output("a", true, 8)).unwrap();
        let b = core.attach_output(output("b", false, 16)).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(core.channel(a).unwrap().id(), a);
        assert_eq!(core.channel(b).unwrap().id(), b);
        assert_eq!(core.channel(b).unwrap().capacity(), 16);
        assert!(!core.channel(b).unwrap().sync_enabled());
    }

    #[test]
    fn test_resolution_change_keeps_beat_phase() {
        // one tick per period
        let (mut core, rx) = new_core(480, 480_000);
        core.start();
        for _ in 0..300 {
            core.tick();
        }
        assert_eq!(rx.try_iter().filter(|n| *n == SyncNotification::Beat).count(), 0);

        // 300 of 480 becomes 60 of 96, so the next tick is still mid-beat
        core.set_resolution(96).unwrap();
        assert_eq!(core.ticks_since_beat, 60);
        core.tick();
        assert_eq!(rx.try_iter().filter(|n| *n == SyncNotification::Beat).count(), 0);
    }

    #[test]
    fn test_resolution_change_keeps_clock_phase_in_range() {
        let (mut core, _rx) = new_core(960, 960_000);
        core.start();
        for _ in 0..39 {
            core.tick();
        }
        assert_eq!(core.ticks_since_clock, 39);
        // 39 of 40 scales to 1, but one tick per clock leaves no remainder
        core.set_resolution(25).unwrap();
        assert_eq!(core.clock.ticks_per_clock(), 1);
        assert_eq!(core.ticks_since_clock, 0);
    }

    #[test]
    fn test_pulses_do_not_record_tempo() {
        let (mut core, rx) = new_core(96, 500_000);
        core.set_mode(SyncMode::ExternalSlave);
        core.attach_sync_input();
        core.start();
        for _ in 0..10 {
            core.pulse();
        }
        assert!(rx
            .try_iter()
            .all(|n| !matches!(n, SyncNotification::TempoRecorded { .. })));
    }
}
