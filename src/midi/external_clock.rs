use super::device::{MidiError, Result};
use super::message::ClockMessage;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use log::{debug, error, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MESSAGE_BUFFER: usize = 256;

/// Listens for realtime transport messages on a MIDI input port and hands
/// them to a handler on a dedicated thread.
/// The midir callback only parses and forwards.
pub struct ExternalClockInput {
    port_name: String,
    connection: Option<MidiInputConnection<()>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ExternalClockInput {
    /// Connects to the first input port whose name contains `device_name`.
    pub fn connect<F>(device_name: &str, handler: F) -> Result<Self>
    where
        F: FnMut(ClockMessage) + Send + 'static,
    {
        let mut midi_in = MidiInput::new("ticksyncrs-external")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        // realtime messages are filtered by default
        midi_in.ignore(Ignore::None);

        let in_ports = midi_in.ports();
        debug!("Available MIDI input ports:");
        for port in &in_ports {
            if let Ok(port_name) = midi_in.port_name(port) {
                debug!("  - {}", port_name);
            }
        }

        let in_port = in_ports
            .iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| {
                MidiError::ConnectionError(format!("input device '{}' not found", device_name))
            })?;
        let port_name = midi_in
            .port_name(in_port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let (tx, rx) = bounded(MESSAGE_BUFFER);
        let connection = midi_in
            .connect(
                in_port,
                "ticksyncrs-external-conn",
                move |_timestamp, message, _| {
                    let Some(clock_msg) = ClockMessage::parse(message) else {
                        return;
                    };
                    if let Err(TrySendError::Full(_)) = tx.try_send(clock_msg) {
                        warn!("External clock buffer full, dropping {:?}", clock_msg);
                    }
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        info!("Connected to external MIDI clock: {}", port_name);

        let running = Arc::new(AtomicBool::new(true));
        let worker = spawn_worker(rx, handler, running.clone())?;

        Ok(Self {
            port_name,
            connection: Some(connection),
            running,
            worker: Some(worker),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Closes the port and joins the worker.
    pub fn disconnect(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("External clock worker panicked");
            }
        }
        info!("Disconnected from external MIDI clock: {}", self.port_name);
    }
}

impl Drop for ExternalClockInput {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.disconnect();
        }
    }
}

fn spawn_worker<F>(
    rx: Receiver<ClockMessage>,
    handler: F,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>>
where
    F: FnMut(ClockMessage) + Send + 'static,
{
    thread::Builder::new()
        .name("external-clock".to_string())
        .spawn(move || pump_messages(&rx, handler, &running))
        .map_err(|e| MidiError::ConnectionError(e.to_string()))
}

/// Forwards messages until `running` clears or the sender goes away, logging
/// once each time the source falls silent for `INACTIVITY_TIMEOUT`.
pub(crate) fn pump_messages<F>(rx: &Receiver<ClockMessage>, mut handler: F, running: &AtomicBool)
where
    F: FnMut(ClockMessage),
{
    let mut last_message_time = Instant::now();
    let mut timed_out = false;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(msg) => {
                if timed_out {
                    info!("External MIDI clock resumed");
                    timed_out = false;
                }
                last_message_time = Instant::now();
                handler(msg);
            }
            Err(RecvTimeoutError::Timeout) => {
                if !timed_out && last_message_time.elapsed() > INACTIVITY_TIMEOUT {
                    error!(
                        "External MIDI clock connection timeout - no messages received for {:?}",
                        INACTIVITY_TIMEOUT
                    );
                    timed_out = true;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("External clock worker stopping");
}

/// Names of the available MIDI input ports.
#[cfg(not(feature = "test-mock"))]
pub fn list_input_ports() -> Vec<String> {
    match MidiInput::new("ticksyncrs-port-lister") {
        Ok(midi_in) => midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect(),
        Err(e) => {
            error!("Failed to list MIDI input ports: {}", e);
            Vec::new()
        }
    }
}

#[cfg(feature = "test-mock")]
pub fn list_input_ports() -> Vec<String> {
    vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
}
