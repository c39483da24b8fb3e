use ticksyncrs::midi::message::{START, STOP, TIMING_CLOCK};
use ticksyncrs::midi::RecordingOutput;
use ticksyncrs::{ChannelSink, NullSink, SyncEngine, SyncNotification};

fn run(engine: &SyncEngine, periods: usize) {
    for _ in 0..periods {
        engine.tick();
    }
}

#[test]
fn test_24_clocks_per_beat_at_480_ppq() {
    let (sink, rx) = ChannelSink::new(1024);
    let engine = SyncEngine::open(480, 500_000, sink).unwrap();
    let device = RecordingOutput::new("clock");
    engine.attach_output(Box::new(device.clone()), true).unwrap();

    engine.start().unwrap();
    // 500 periods of 1 ms at 120 bpm is exactly one beat
    run(&engine, 500);

    let messages = device.messages();
    assert_eq!(messages.first(), Some(&vec![START]));
    assert_eq!(device.count(TIMING_CLOCK), 24);
    assert_eq!(
        rx.try_iter()
            .filter(|n| *n == SyncNotification::Beat)
            .count(),
        1
    );

    engine.stop().unwrap();
    assert_eq!(device.messages().last(), Some(&vec![STOP]));
}

#[test]
fn test_clocks_per_beat_follow_ticks_per_clock() {
    // 100 ticks per beat gives 4 ticks per clock, so 25 clocks per beat
    let engine = SyncEngine::open(100, 100_000, NullSink).unwrap();
    let device = RecordingOutput::new("clock");
    engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine.start().unwrap();
    run(&engine, 100);
    assert_eq!(device.count(TIMING_CLOCK), 25);
}

#[test]
fn test_low_resolution_sends_one_clock_per_tick() {
    let engine = SyncEngine::open(12, 12_000, NullSink).unwrap();
    let device = RecordingOutput::new("clock");
    engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine.start().unwrap();
    run(&engine, 12);
    assert_eq!(device.count(TIMING_CLOCK), 12);
}

#[test]
fn test_several_clocks_in_one_period() {
    // 960 ticks per beat at 10 ms per beat: 96 ticks, so 2.4 clocks, per period
    let engine = SyncEngine::open(960, 10_000, NullSink).unwrap();
    let device = RecordingOutput::new("clock");
    engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine.start().unwrap();
    run(&engine, 10);
    assert_eq!(device.count(TIMING_CLOCK), 24);
}

#[test]
fn test_non_sync_output_gets_no_transport() {
    let engine = SyncEngine::open(96, 500_000, NullSink).unwrap();
    let silent = RecordingOutput::new("notes");
    engine.attach_output(Box::new(silent.clone()), false).unwrap();
    engine.start().unwrap();
    run(&engine, 1_000);
    engine.pause(true).unwrap();
    engine.restart().unwrap();
    engine.stop().unwrap();
    assert!(silent.messages().is_empty());
}

#[test]
fn test_pause_stops_clock_and_restart_resends_start() {
    let engine = SyncEngine::open(96, 500_000, NullSink).unwrap();
    let device = RecordingOutput::new("clock");
    engine.attach_output(Box::new(device.clone()), true).unwrap();
    engine.start().unwrap();
    run(&engine, 100);
    engine.pause(false).unwrap();
    let clocks = device.count(TIMING_CLOCK);
    run(&engine, 100);
    assert_eq!(device.count(TIMING_CLOCK), clocks);

    engine.restart().unwrap();
    assert_eq!(device.non_clock_messages(), vec![vec![START], vec![START]]);
}
