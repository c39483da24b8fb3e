// config.rs

use crate::clock::MAX_RESOLUTION;
use crate::error::{Result, SyncError};
use crate::sync_mode::SyncMode;
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RESOLUTION: u32 = 480;
pub const DEFAULT_TEMPO: u32 = 500_000; // 120 bpm
pub const DEFAULT_TIMER_PERIOD_US: u64 = 1_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;
pub const DEFAULT_SYSEX_CAPACITY: usize = 1_024;

const ENV_PREFIX: &str = "TICKSYNC";

/// Settings for opening a sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Ticks per beat.
    pub resolution: u32,
    /// Microseconds per beat.
    pub tempo: u32,
    pub timer_period_us: u64,
    pub mode: SyncMode,
    /// Events each output channel can hold.
    pub queue_capacity: usize,
    /// Largest SysEx transfer an output channel can assemble, in bytes.
    pub sysex_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            tempo: DEFAULT_TEMPO,
            timer_period_us: DEFAULT_TIMER_PERIOD_US,
            mode: SyncMode::Internal,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sysex_capacity: DEFAULT_SYSEX_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Layers an optional config file and `TICKSYNC_*` environment variables
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = SyncConfig::default();
        let mut builder = config::Config::builder()
            .set_default("resolution", i64::from(defaults.resolution))?
            .set_default("tempo", i64::from(defaults.tempo))?
            .set_default("timer_period_us", defaults.timer_period_us as i64)?
            .set_default("mode", "internal")?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default("sysex_capacity", defaults.sysex_capacity as i64)?;

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: SyncConfig = settings.try_deserialize()?;
        debug!("Resolved configuration: {:?}", config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 || self.resolution > MAX_RESOLUTION {
            return Err(SyncError::InvalidResolution(self.resolution));
        }
        if self.tempo == 0 {
            return Err(SyncError::InvalidTempo(self.tempo));
        }
        if self.timer_period_us == 0 {
            return Err(SyncError::InvalidPeriod(self.timer_period_us));
        }
        Ok(())
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_micros(self.timer_period_us)
    }
}

/// Converts beats per minute to microseconds per beat.
pub fn bpm_to_tempo(bpm: f64) -> Option<u32> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    let tempo = (60_000_000.0 / bpm).round();
    if tempo < 1.0 || tempo > f64::from(u32::MAX) {
        return None;
    }
    Some(tempo as u32)
}

/// Converts microseconds per beat to beats per minute.
pub fn tempo_to_bpm(tempo: u32) -> f64 {
    60_000_000.0 / f64::from(tempo.max(1))
}
