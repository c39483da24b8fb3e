use crate::engine::{SyncEngine, TickOutcome};
use crate::error::{Result, SyncError};
use log::{error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Drives a [`SyncEngine`] from a dedicated thread, one tick per timer period.
///
/// Deadlines are absolute, so sleep overshoot does not accumulate. When the
/// thread falls more than a period behind, the missed ticks are dropped.
pub struct SyncTimer {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyncTimer {
    pub fn spawn(engine: SyncEngine) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread_handle = thread::Builder::new()
            .name("sync-timer".to_string())
            .spawn(move || run_timer(&engine, &thread_running))
            .map_err(|e| SyncError::AllocationFailure(e.to_string()))?;

        info!("Sync timer started");
        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the timer thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Sync timer thread panicked");
            }
            info!("Sync timer stopped");
        }
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(engine: &SyncEngine, running: &AtomicBool) {
    let mut deadline = Instant::now();
    while running.load(Ordering::SeqCst) {
        match engine.tick() {
            TickOutcome::Ran => {}
            TickOutcome::Skipped => trace!("tick overlapped, dropped"),
            TickOutcome::Closed => break,
        }

        let Ok(period) = engine.timer_period() else {
            break;
        };
        deadline += period;

        let now = Instant::now();
        if now >= deadline {
            if now - deadline > period {
                trace!("timer behind by {:?}, skipping ahead", now - deadline);
                deadline = now;
            }
            continue;
        }
        thread::sleep(deadline - now);
    }
    running.store(false, Ordering::SeqCst);
}
