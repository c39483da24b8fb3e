// ui.rs

use crate::config::tempo_to_bpm;
use crate::engine::{RunState, SyncEngine, SyncStatus};
use crate::sync_mode::SyncMode;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

fn create_beat_progress(multi_progress: &MultiProgress, resolution: u32) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(u64::from(resolution)));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("⣀⣤⣦⣶⣷⣿ "),
    );
    pb.set_prefix("Beat");
    pb
}

fn create_transport_spinner(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Transport");
    pb
}

/// One-line summary shown next to the transport spinner.
pub fn format_status(status: &SyncStatus) -> String {
    let mode = match status.mode {
        SyncMode::Internal => "master",
        SyncMode::ExternalSlave if status.holding => "slave (waiting)",
        SyncMode::ExternalSlave => "slave",
    };
    format!(
        "BPM: {:.2}, Ticks: {}, Position: {}.{:03}s, State: {:?}, Sync: {}",
        tempo_to_bpm(status.tempo),
        status.elapsed_ticks,
        status.position_ms / 1_000,
        status.position_ms % 1_000,
        status.run_state,
        mode
    )
}

/// Terminal status display for a running engine.
pub struct StatusDisplay {
    #[allow(dead_code)]
    multi_progress: MultiProgress,
    beat_pb: ProgressBar,
    transport_pb: ProgressBar,
}

impl StatusDisplay {
    pub fn new(resolution: u32) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let beat_pb = create_beat_progress(&multi_progress, resolution);
        let transport_pb = create_transport_spinner(&multi_progress);
        Self {
            multi_progress,
            beat_pb,
            transport_pb,
        }
    }

    pub fn update(&self, status: &SyncStatus) {
        let resolution = u64::from(status.resolution.max(1));
        self.beat_pb.set_length(resolution);
        self.beat_pb.set_position(status.elapsed_ticks % resolution);
        self.transport_pb.set_message(format_status(status));
        self.transport_pb.tick();
    }

    /// Refreshes until `running` clears or the engine is closed.
    pub fn run(&self, engine: &SyncEngine, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let status = engine.status();
            if status.run_state == RunState::Closed {
                break;
            }
            self.update(&status);
            thread::sleep(REFRESH_INTERVAL);
        }
        self.finish();
    }

    pub fn finish(&self) {
        self.beat_pb.finish_and_clear();
        self.transport_pb.finish_and_clear();
    }
}
