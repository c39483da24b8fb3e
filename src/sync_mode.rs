//! Internal free-running timing versus external MIDI clock slaving.

use crate::clock::TickClock;
use crate::sink::{Diagnostic, NotificationSink};
use log::trace;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// This engine is the clock master.
    #[default]
    Internal,
    /// Tempo follows an incoming MIDI clock stream.
    #[serde(alias = "external")]
    ExternalSlave,
}

/// What one timer step contributes to the elapsed tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance(u64),
    /// Waiting for an overdue external pulse: position is frozen.
    Hold,
}

#[derive(Debug, Clone)]
pub struct SyncModeController {
    mode: SyncMode,
    hold: bool,
    resync_pending: bool,
    // ticks the free-running clock produced since the last pulse
    measured_ticks: u64,
    last_pulse_ticks: u64,
}

impl SyncModeController {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            hold: false,
            resync_pending: false,
            measured_ticks: 0,
            last_pulse_ticks: 0,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn is_slave(&self) -> bool {
        self.mode == SyncMode::ExternalSlave
    }

    pub fn is_holding(&self) -> bool {
        self.hold
    }

    pub fn resync_pending(&self) -> bool {
        self.resync_pending
    }

    /// Elapsed tick value at which the last external pulse was resolved.
    pub fn last_pulse_ticks(&self) -> u64 {
        self.last_pulse_ticks
    }

    pub fn measured_ticks(&self) -> u64 {
        self.measured_ticks
    }

    pub fn reset(&mut self) {
        self.hold = false;
        self.resync_pending = false;
        self.measured_ticks = 0;
        self.last_pulse_ticks = 0;
    }

    /// Computes the ticks to apply for one step at `elapsed_ticks`.
    pub fn step(
        &mut self,
        clock: &mut TickClock,
        elapsed_ticks: u64,
        sink: &dyn NotificationSink,
    ) -> Step {
        if !self.is_slave() {
            return Step::Advance(clock.advance());
        }

        if self.hold {
            self.measured_ticks += clock.advance();
            return Step::Hold;
        }

        let ticks_per_clock = clock.ticks_per_clock();
        let since_pulse = match elapsed_ticks.checked_sub(self.last_pulse_ticks) {
            Some(since) => since,
            None => {
                sink.on_diagnostic(Diagnostic::TickUnderflow {
                    elapsed: elapsed_ticks,
                    last_pulse: self.last_pulse_ticks,
                });
                0
            }
        };

        if self.resync_pending {
            // land exactly on the clock boundary the pulse marks
            self.resync_pending = false;
            clock.reset();
            let nticks = ticks_per_clock.saturating_sub(since_pulse);
            self.last_pulse_ticks = elapsed_ticks + nticks;
            return Step::Advance(nticks);
        }

        let nticks = clock.advance();
        self.measured_ticks += nticks;
        if since_pulse + nticks >= ticks_per_clock {
            // stop one tick short and wait for the pulse
            self.hold = true;
            trace!("external clock overdue, holding at {}", elapsed_ticks);
            return Step::Advance((ticks_per_clock - 1).saturating_sub(since_pulse));
        }
        Step::Advance(nticks)
    }

    /// Called when an external clock pulse arrives, before the step that
    /// generates its ticks.
    pub fn begin_pulse(&mut self) {
        self.resync_pending = true;
        self.hold = false;
    }

    /// Called after the pulse's step. Corrects the tempo by the difference
    /// between the expected and measured ticks per clock and returns it.
    pub fn finish_pulse(&mut self, clock: &mut TickClock) -> u32 {
        let tempo = i64::from(clock.tempo());
        let resolution = i64::from(clock.resolution().max(1));
        let expected = clock.ticks_per_clock() as i64;
        let measured = self.measured_ticks as i64;

        let corrected = tempo - (expected - measured) * (tempo / resolution);
        let corrected = corrected.clamp(1, i64::from(u32::MAX)) as u32;

        clock.set_tempo(corrected);
        self.measured_ticks = 0;
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::time::Duration;

    fn clock(tempo: u32) -> TickClock {
        TickClock::new(96, tempo, Duration::from_millis(1))
    }

    #[test]
    fn test_internal_mode_passes_clock_through() {
        let mut controller = SyncModeController::new(SyncMode::Internal);
        let mut clock = clock(96_000);
        assert_eq!(controller.step(&mut clock, 0, &NullSink), Step::Advance(1));
        assert!(!controller.is_holding());
    }

    #[test]
    fn test_slave_holds_one_tick_short_of_boundary() {
        let mut controller = SyncModeController::new(SyncMode::ExternalSlave);
        // 96 ticks per beat, 4 per clock, one tick per period
        let mut clock = clock(96_000);
        let mut elapsed = 0;
        for _ in 0..3 {
            match controller.step(&mut clock, elapsed, &NullSink) {
                Step::Advance(n) => elapsed += n,
                Step::Hold => panic!("held too early"),
            }
        }
        assert_eq!(elapsed, 3);
        assert_eq!(controller.step(&mut clock, elapsed, &NullSink), Step::Advance(0));
        assert!(controller.is_holding());
        assert_eq!(controller.step(&mut clock, elapsed, &NullSink), Step::Hold);
        assert_eq!(controller.measured_ticks(), 5);
    }

    #[test]
    fn test_pulse_resyncs_to_boundary() {
        let mut controller = SyncModeController::new(SyncMode::ExternalSlave);
        let mut clock = clock(96_000);
        let mut elapsed = 0;
        if let Step::Advance(n) = controller.step(&mut clock, elapsed, &NullSink) {
            elapsed += n;
        }
        controller.begin_pulse();
        assert_eq!(controller.step(&mut clock, elapsed, &NullSink), Step::Advance(3));
        assert_eq!(controller.last_pulse_ticks(), 4);
        assert!(!controller.resync_pending());
    }

    #[test]
    fn test_finish_pulse_corrects_tempo() {
        let mut controller = SyncModeController::new(SyncMode::ExternalSlave);
        let mut clock = clock(96_000);
        // six ticks measured where four were expected: the source is slower
        for _ in 0..6 {
            controller.step(&mut clock, 0, &NullSink);
            controller.hold = true;
        }
        assert_eq!(controller.measured_ticks(), 6);
        let tempo = controller.finish_pulse(&mut clock);
        assert_eq!(tempo, 96_000 + 2 * 1_000);
        assert_eq!(clock.tempo(), tempo);
        assert_eq!(controller.measured_ticks(), 0);
    }

    #[test]
    fn test_finish_pulse_never_reaches_zero() {
        let mut controller = SyncModeController::new(SyncMode::ExternalSlave);
        // one tick per beat and per clock, and no ticks measured
        let mut clock = TickClock::new(1, 500, Duration::from_millis(1));
        assert_eq!(controller.finish_pulse(&mut clock), 1);
    }
}
