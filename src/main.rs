use clap::Parser;
use crossbeam::channel::Receiver;
use log::{debug, error, info, trace, warn};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use ticksyncrs::{
    cli::{validate_device, Args},
    logging,
    midi::{list_input_ports, list_output_ports, ExternalClockInput, MidirOutput},
    ui::StatusDisplay,
    ChannelSink, SyncEngine, SyncMode, SyncNotification, SyncTimer,
};

const NOTIFICATION_BUFFER: usize = 1024;

fn main() {
    let args = Args::parse();
    initialize_logging(args.verbose);

    if args.device_list {
        list_available_devices();
        return;
    }

    if let Err(e) = run(&args) {
        let error_msg = format!("Error: {}", e);
        error!("{}", error_msg);
        eprintln!("{}", error_msg);
        std::process::exit(1);
    }
}

fn initialize_logging(verbose: bool) {
    if let Err(e) = logging::init_logger(verbose) {
        eprintln!("Logger initialization failed: {}", e);
    }
    info!("Application starting");
}

fn list_available_devices() {
    println!("Available MIDI outputs:");
    for device in list_output_ports() {
        println!("  - {}", device);
    }
    println!("Available MIDI inputs:");
    for device in list_input_ports() {
        println!("  - {}", device);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = args.resolve_config()?;

    let outputs = list_output_ports();
    for name in &args.outputs {
        validate_device(name, &outputs)?;
    }
    if let Some(name) = &args.sync_input {
        validate_device(name, &list_input_ports())?;
    }

    let (sink, notifications) = ChannelSink::new(NOTIFICATION_BUFFER);
    let engine = SyncEngine::open_with(config.clone(), sink)?;

    for name in &args.outputs {
        let device = MidirOutput::connect(name)?;
        engine.attach_output(Box::new(device), true)?;
        println!("Sending clock to MIDI device: {}", name);
    }

    let sync_input = match &args.sync_input {
        Some(name) => Some(connect_sync_input(name, &engine)?),
        None => None,
    };

    if config.mode == SyncMode::Internal {
        engine.start()?;
    } else {
        info!("Waiting for external Start");
    }

    thread::Builder::new()
        .name("notifications".to_string())
        .spawn(move || log_notifications(&notifications))?;

    let mut timer = SyncTimer::spawn(engine.clone())?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_running.store(false, Ordering::SeqCst);
    })?;

    info!("Application running. Press Ctrl+C to exit...");
    println!("\nPress Ctrl+C to exit...");
    StatusDisplay::new(config.resolution).run(&engine, &running);

    info!("Shutting down");
    drop(sync_input);
    timer.stop();
    engine.shutdown()?;
    Ok(())
}

fn connect_sync_input(name: &str, engine: &SyncEngine) -> Result<ExternalClockInput, Box<dyn Error>> {
    engine.attach_sync_input()?;
    let handler_engine = engine.clone();
    let input = ExternalClockInput::connect(name, move |msg| {
        if let Err(e) = handler_engine.feed_external(msg) {
            warn!("Dropped external {:?}: {}", msg, e);
        }
    })?;
    println!("Following MIDI clock from: {}", input.port_name());
    Ok(input)
}

fn log_notifications(notifications: &Receiver<SyncNotification>) {
    for notification in notifications.iter() {
        match notification {
            SyncNotification::Beat => trace!("beat"),
            SyncNotification::BufferReady(channel) => trace!("buffer ready on {:?}", channel),
            SyncNotification::SyncDone => info!("All outputs drained"),
            SyncNotification::Diagnostic(diagnostic) => warn!("{:?}", diagnostic),
            SyncNotification::TempoRecorded { delta_ticks, tempo } => {
                debug!("Tempo {} us/beat recorded after {} ticks", tempo, delta_ticks)
            }
        }
    }
}
