use std::time::Duration;
use ticksyncrs::midi::RecordingOutput;
use ticksyncrs::{
    logging, ChannelSink, EventKind, NullSink, PositionUnit, RunState, SyncEngine, SyncError,
};

// 100 ticks per beat at 100 ms per beat: exactly one tick per 1 ms period
fn one_tick_per_period() -> SyncEngine {
    logging::init_test_logger();
    SyncEngine::open(100, 100_000, NullSink).unwrap()
}

fn run(engine: &SyncEngine, periods: usize) {
    for _ in 0..periods {
        engine.tick();
    }
}

fn ticks(engine: &SyncEngine) -> u64 {
    engine.get_position(PositionUnit::Ticks).unwrap()
}

#[test]
fn test_opens_stopped() {
    let engine = one_tick_per_period();
    assert_eq!(engine.run_state(), RunState::Stopped);
    run(&engine, 10);
    assert_eq!(ticks(&engine), 0);
}

#[test]
fn test_set_tempo_zero_rejected() {
    let engine = one_tick_per_period();
    assert_eq!(engine.set_tempo(0), Err(SyncError::InvalidTempo(0)));
    assert_eq!(engine.get_tempo(), Ok(100_000));
    engine.set_tempo(200_000).unwrap();
    assert_eq!(engine.get_tempo(), Ok(200_000));
}

#[test]
fn test_set_resolution_bounds() {
    let engine = one_tick_per_period();
    assert_eq!(engine.set_resolution(0), Err(SyncError::InvalidResolution(0)));
    assert_eq!(
        engine.set_resolution(961),
        Err(SyncError::InvalidResolution(961))
    );
    engine.set_resolution(960).unwrap();
    assert_eq!(engine.get_resolution(), Ok(960));
}

#[test]
fn test_pause_and_restart_keep_position() {
    let engine = one_tick_per_period();
    engine.start().unwrap();
    run(&engine, 10);
    assert_eq!(ticks(&engine), 10);

    engine.pause(false).unwrap();
    assert_eq!(engine.run_state(), RunState::Paused);
    run(&engine, 5);
    assert_eq!(ticks(&engine), 10);

    engine.restart().unwrap();
    assert_eq!(engine.run_state(), RunState::Running);
    run(&engine, 5);
    assert_eq!(ticks(&engine), 15);
}

#[test]
fn test_stop_then_start_resets_position() {
    let engine = one_tick_per_period();
    engine.start().unwrap();
    run(&engine, 42);
    engine.stop().unwrap();
    assert_eq!(engine.run_state(), RunState::Stopped);
    assert_eq!(ticks(&engine), 42);

    engine.start().unwrap();
    assert_eq!(ticks(&engine), 0);
    assert_eq!(engine.get_position(PositionUnit::Milliseconds), Ok(0));
    run(&engine, 3);
    assert_eq!(ticks(&engine), 3);
}

#[test]
fn test_restart_from_stopped_resumes() {
    let engine = one_tick_per_period();
    engine.start().unwrap();
    run(&engine, 7);
    engine.stop().unwrap();
    engine.restart().unwrap();
    run(&engine, 3);
    assert_eq!(ticks(&engine), 10);
}

#[test]
fn test_millisecond_position_follows_timer_period() {
    let engine = one_tick_per_period();
    engine.set_timer_period(Duration::from_micros(2_500)).unwrap();
    engine.start().unwrap();
    run(&engine, 4);
    assert_eq!(engine.get_position(PositionUnit::Milliseconds), Ok(10));
    assert_eq!(ticks(&engine), 10);
    assert_eq!(
        engine.set_timer_period(Duration::ZERO),
        Err(SyncError::InvalidPeriod(0))
    );
}

#[test]
fn test_closed_handle_rejects_everything() {
    let engine = one_tick_per_period();
    let channel = engine
        .attach_output(Box::new(RecordingOutput::new("out")), true)
        .unwrap();
    engine.close().unwrap();

    assert!(engine.is_closed());
    assert_eq!(engine.start(), Err(SyncError::InvalidHandle));
    assert_eq!(engine.stop(), Err(SyncError::InvalidHandle));
    assert_eq!(engine.pause(true), Err(SyncError::InvalidHandle));
    assert_eq!(engine.restart(), Err(SyncError::InvalidHandle));
    assert_eq!(engine.set_tempo(500_000), Err(SyncError::InvalidHandle));
    assert_eq!(engine.get_tempo(), Err(SyncError::InvalidHandle));
    assert_eq!(engine.get_resolution(), Err(SyncError::InvalidHandle));
    assert_eq!(
        engine.get_position(PositionUnit::Ticks),
        Err(SyncError::InvalidHandle)
    );
    assert_eq!(
        engine.enqueue(channel, 0, EventKind::TempoChange(1)),
        Err(SyncError::InvalidHandle)
    );
    assert_eq!(engine.close(), Err(SyncError::InvalidHandle));
}

#[test]
fn test_close_silences_sounding_notes() {
    let engine = one_tick_per_period();
    let device = RecordingOutput::new("out");
    let channel = engine.attach_output(Box::new(device.clone()), false).unwrap();
    engine
        .enqueue(channel, 0, EventKind::NoteMessage(vec![0x91, 64, 90]))
        .unwrap();
    engine.start().unwrap();
    run(&engine, 1);
    assert_eq!(engine.sounding_notes(channel), Ok(1));

    engine.close().unwrap();
    assert_eq!(
        device.messages(),
        vec![vec![0x91, 64, 90], vec![0x81, 64, 0]]
    );
}

#[test]
fn test_pause_with_reset_silences_and_stops_clock() {
    let (sink, _rx) = ChannelSink::new(256);
    let engine = SyncEngine::open(100, 100_000, sink).unwrap();
    let device = RecordingOutput::new("out");
    let channel = engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine
        .enqueue(channel, 0, EventKind::NoteMessage(vec![0x90, 60, 100]))
        .unwrap();
    engine
        .enqueue(channel, 50, EventKind::NoteMessage(vec![0x80, 60, 0]))
        .unwrap();

    engine.start().unwrap();
    run(&engine, 1);
    engine.pause(true).unwrap();

    assert_eq!(
        device.non_clock_messages(),
        vec![
            vec![0xFA],
            vec![0x90, 60, 100],
            vec![0xFC],
            vec![0x80, 60, 0],
        ]
    );
    // the queued note off is kept for when playback resumes
    assert_eq!(engine.span(channel), Ok(1));
    assert_eq!(engine.sounding_notes(channel), Ok(0));
}

#[test]
fn test_stop_clears_queues() {
    let engine = one_tick_per_period();
    let channel = engine
        .attach_output(Box::new(RecordingOutput::new("out")), false)
        .unwrap();
    for _ in 0..3 {
        engine
            .enqueue(channel, 1_000, EventKind::NoteMessage(vec![0x90, 1, 1]))
            .unwrap();
    }
    engine.start().unwrap();
    run(&engine, 2);
    assert_eq!(engine.span(channel), Ok(3));
    engine.stop().unwrap();
    assert_eq!(engine.span(channel), Ok(0));
}

#[test]
fn test_shutdown_stops_clock_and_silences() {
    let engine = one_tick_per_period();
    let device = RecordingOutput::new("out");
    let channel = engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine
        .enqueue(channel, 0, EventKind::NoteMessage(vec![0x90, 60, 100]))
        .unwrap();
    engine.start().unwrap();
    run(&engine, 1);

    engine.shutdown().unwrap();
    assert!(engine.is_closed());
    assert_eq!(
        device.non_clock_messages(),
        vec![
            vec![0xFA],
            vec![0x90, 60, 100],
            vec![0xFC],
            vec![0x80, 60, 0],
        ]
    );
    assert_eq!(engine.shutdown(), Err(SyncError::InvalidHandle));
}
