// clock.rs

//! Fixed-point tick accounting.
//!
//! Real time is converted to ticks with integer arithmetic only. Each timer
//! period contributes `resolution * period_us` to a numerator; whole multiples
//! of the tempo become ticks and the remainder is carried into the next call,
//! so no time is ever discarded and long runs accumulate zero error.

use std::time::Duration;

/// Highest accepted resolution, in ticks per beat.
pub const MAX_RESOLUTION: u32 = 960;

/// MIDI sends 24 clock messages per quarter note.
pub const CLOCKS_PER_BEAT: u32 = 24;

#[derive(Debug, Clone)]
pub struct TickClock {
    resolution: u64,
    tempo: u64,
    period_us: u64,
    // resolution * period_us, recomputed only when either changes
    product: u64,
    fractional_ticks: u64,
}

impl TickClock {
    /// `tempo` is in microseconds per beat and must be non-zero; the engine
    /// validates it before constructing a clock.
    pub fn new(resolution: u32, tempo: u32, period: Duration) -> Self {
        let resolution = u64::from(resolution);
        let period_us = period.as_micros() as u64;
        Self {
            resolution,
            tempo: u64::from(tempo.max(1)),
            period_us,
            product: resolution * period_us,
            fractional_ticks: 0,
        }
    }

    /// Advances by one timer period and returns the whole ticks elapsed.
    pub fn advance(&mut self) -> u64 {
        let total = self.fractional_ticks + self.product;
        let nticks = total / self.tempo;
        self.fractional_ticks = total - nticks * self.tempo;
        nticks
    }

    /// Advances by an arbitrary span of real time. The cached per-period
    /// product is left untouched.
    pub fn advance_by(&mut self, elapsed: Duration) -> u64 {
        let product = self.resolution as u128 * elapsed.as_micros();
        let total = self.fractional_ticks as u128 + product;
        let nticks = total / self.tempo as u128;
        self.fractional_ticks = (total - nticks * self.tempo as u128) as u64;
        nticks as u64
    }

    pub fn set_resolution(&mut self, resolution: u32) {
        self.resolution = u64::from(resolution);
        self.product = self.resolution * self.period_us;
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period_us = period.as_micros() as u64;
        self.product = self.resolution * self.period_us;
    }

    /// Changes the tempo, rescaling the carried remainder so it keeps the
    /// same fraction of a tick and stays below the new tempo.
    pub fn set_tempo(&mut self, tempo: u32) {
        let tempo = u64::from(tempo.max(1));
        if tempo != self.tempo {
            let scaled = self.fractional_ticks as u128 * tempo as u128 / self.tempo as u128;
            self.fractional_ticks = scaled as u64;
            self.tempo = tempo;
        }
    }

    /// Drops the carried fraction of a tick.
    pub fn reset(&mut self) {
        self.fractional_ticks = 0;
    }

    pub fn tempo(&self) -> u32 {
        self.tempo as u32
    }

    pub fn resolution(&self) -> u32 {
        self.resolution as u32
    }

    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    pub fn fractional_ticks(&self) -> u64 {
        self.fractional_ticks
    }

    /// Ticks between two MIDI clock messages. Never zero, so resolutions below
    /// 24 emit one clock per tick.
    pub fn ticks_per_clock(&self) -> u64 {
        (self.resolution / u64::from(CLOCKS_PER_BEAT)).max(1)
    }
}
