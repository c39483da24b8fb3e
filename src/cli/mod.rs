use crate::config::{bpm_to_tempo, SyncConfig};
use crate::error::{Result, SyncError};
use crate::sync_mode::SyncMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// Send clock and transport to this MIDI output (repeatable)
    #[arg(long = "output", value_name = "NAME")]
    pub outputs: Vec<String>,

    /// Follow the MIDI clock arriving on this input
    #[arg(long, value_name = "NAME")]
    pub sync_input: Option<String>,

    /// Tempo in beats per minute
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Ticks per beat (1-960)
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Timer period in microseconds
    #[arg(long)]
    pub period_us: Option<u64>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log per-tick detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Loads the configuration and applies the command line on top of it.
    pub fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load(self.config.as_deref())?;
        if let Some(bpm) = self.bpm {
            config.tempo = bpm_to_tempo(bpm)
                .ok_or_else(|| SyncError::Config(format!("invalid bpm: {}", bpm)))?;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(period_us) = self.period_us {
            config.timer_period_us = period_us;
        }
        if self.sync_input.is_some() {
            config.mode = SyncMode::ExternalSlave;
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn validate_device(device_name: &str, devices: &[String]) -> std::result::Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}
