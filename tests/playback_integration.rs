//! Playback and seeking against recordings made by the driver itself

mod common;

use common::builders::{ten_second_recording, three_frame_recording};
use common::mock_helpers::{RecordingSink, SourceHandle};
use common::{assert_float_eq, capture_events, outcome_slot, run_tasks, TICK};
use netdemo_rs::error::{CheckpointError, DemoError, FormatError};
use netdemo_rs::{
    DemoConfig, DemoDriver, DispatchMode, DriverEvent, DriverState, MemoryStorage, ObjectId,
    TaskDiscriminator, TaskOutcome,
};

fn player(storage: &MemoryStorage, name: &str, sink: &RecordingSink) -> DemoDriver {
    let mut driver = DemoDriver::new(DemoConfig::default(), storage.clone());
    driver.start_playback(name, sink.boxed()).unwrap();
    driver
}

fn payloads(list: &[&str]) -> Vec<Vec<u8>> {
    list.iter().map(|s| s.as_bytes().to_vec()).collect()
}

#[test]
fn test_plays_frames_in_order() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    assert_float_eq(driver.total_time(), 10.0, 1e-6);
    assert_eq!(driver.total_frames(), 21);
    for _ in 0..21 {
        driver.tick(0.5).unwrap();
    }

    let log = sink.log();
    let expected: Vec<Vec<u8>> = (0..=20).map(|i| format!("f{}", i).into_bytes()).collect();
    assert_eq!(log.live_payloads(), expected);
    assert_eq!(log.fast_forward_count(), 0);
    let times: Vec<f32> = log.deliveries.iter().map(|d| d.1).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_seek_lands_between_checkpoint_and_next_frame() {
    let storage = MemoryStorage::new();
    three_frame_recording("three").end_at(1.2).record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "three", &sink);
    let events = capture_events(&mut driver);

    let (slot, callback) = outcome_slot();
    driver.seek_to(1.0, Some(callback)).unwrap();
    assert_eq!(driver.state(), DriverState::ScrubbingToTime { target: 1.0 });
    run_tasks(&mut driver);

    assert!(slot.lock().unwrap().as_ref().unwrap().is_completed());
    let log = sink.log();
    assert_eq!(log.restores, vec![0.5]);
    assert!(log.deliveries.is_empty());
    assert_eq!(log.fast_forward_finished, 1);
    assert_eq!(log.objects.get(&ObjectId(1)), Some(&b"after-B".to_vec()));
    assert_eq!(driver.current_time(), 1.0);
    assert_eq!(driver.state(), DriverState::Playing);

    driver.tick(0.25).unwrap();
    assert_eq!(sink.log().live_payloads(), payloads(&["C"]));
    assert_eq!(driver.state(), DriverState::Finished);

    driver.tick(0.25).unwrap();
    let events = events.lock().unwrap();
    assert!(events.contains(&DriverEvent::ScrubComplete { seconds: 1.0 }));
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == DriverEvent::PlaybackEnded)
            .count(),
        1
    );
}

#[test]
fn test_newer_seek_cancels_older_one() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);
    let events = capture_events(&mut driver);

    let (first, first_cb) = outcome_slot();
    let (second, second_cb) = outcome_slot();
    driver.seek_to(5.0, Some(first_cb)).unwrap();
    driver.seek_to(8.0, Some(second_cb)).unwrap();

    assert!(first.lock().unwrap().as_ref().unwrap().is_cancelled());
    assert!(second.lock().unwrap().is_none());
    assert!(driver.is_task_queued(TaskDiscriminator::Seek));

    run_tasks(&mut driver);

    assert!(second.lock().unwrap().as_ref().unwrap().is_completed());
    let log = sink.log();
    assert_eq!(log.restores, vec![7.0]);
    let fast_forwarded: Vec<Vec<u8>> = log
        .deliveries
        .iter()
        .filter(|d| d.2 == DispatchMode::FastForward)
        .map(|d| d.0.clone())
        .collect();
    assert_eq!(fast_forwarded, payloads(&["f15", "f16"]));
    assert_eq!(driver.current_time(), 8.0);

    let scrubs: Vec<DriverEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, DriverEvent::ScrubComplete { .. }))
        .cloned()
        .collect();
    assert_eq!(scrubs, vec![DriverEvent::ScrubComplete { seconds: 8.0 }]);

    sink.clear();
    driver.tick(0.5).unwrap();
    assert_eq!(sink.log().live_payloads(), payloads(&["f17"]));
}

#[test]
fn test_seek_to_same_time_gives_same_state() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    driver.seek_to(6.3, None).unwrap();
    run_tasks(&mut driver);
    let first = sink.log().state();
    assert_eq!(first.0.get(&ObjectId(1)), Some(&b"s8".to_vec()));
    assert_eq!(first.1, payloads(&["f9", "f10", "f11", "f12"]));

    for _ in 0..5 {
        driver.tick(0.5).unwrap();
    }
    driver.seek_to(6.3, None).unwrap();
    run_tasks(&mut driver);
    assert_eq!(sink.log().state(), first);
    assert_eq!(driver.current_time(), 6.3);
}

#[test]
fn test_seek_before_first_checkpoint_matches_plain_playback() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());

    let plain_sink = RecordingSink::new();
    let mut plain = player(&storage, "ten", &plain_sink);
    for _ in 0..4 {
        plain.tick(0.5).unwrap();
    }

    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);
    for _ in 0..18 {
        driver.tick(0.5).unwrap();
    }
    driver.seek_to(2.0, None).unwrap();
    run_tasks(&mut driver);

    assert_eq!(sink.log().restores, vec![0.0]);
    assert_eq!(sink.log().state(), plain_sink.log().state());
}

#[test]
fn test_failed_restore_keeps_previous_time() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);
    let events = capture_events(&mut driver);
    for _ in 0..6 {
        driver.tick(0.5).unwrap();
    }

    sink.fail_restores(true);
    let (slot, callback) = outcome_slot();
    driver.seek_to(8.0, Some(callback)).unwrap();
    run_tasks(&mut driver);

    match slot.lock().unwrap().take() {
        Some(TaskOutcome::Failed(err)) => assert!(matches!(
            err.root(),
            DemoError::Checkpoint(CheckpointError::RestoreFailed(_))
        )),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(driver.current_time(), 3.0);
    assert_eq!(driver.state(), DriverState::Playing);
    assert!(!events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, DriverEvent::ScrubComplete { .. })));

    sink.fail_restores(false);
    sink.clear();
    driver.tick(0.5).unwrap();
    assert_eq!(sink.log().live_payloads(), payloads(&["f7"]));
}

#[test]
fn test_load_checkpoint_with_extra_time() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);
    assert_eq!(driver.checkpoint_count(), 2);

    let (slot, callback) = outcome_slot();
    driver.load_checkpoint(1, 0.5, Some(callback)).unwrap();
    run_tasks(&mut driver);
    assert!(slot.lock().unwrap().as_ref().unwrap().is_completed());
    assert_eq!(sink.log().restores, vec![7.0]);
    assert_eq!(driver.current_time(), 7.5);

    let (missing, callback) = outcome_slot();
    driver.load_checkpoint(5, 0.0, Some(callback)).unwrap();
    run_tasks(&mut driver);
    match missing.lock().unwrap().take() {
        Some(TaskOutcome::Failed(err)) => assert!(matches!(
            err.root(),
            DemoError::Checkpoint(CheckpointError::NotFound(_))
        )),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(driver.current_time(), 7.5);
}

#[test]
fn test_jump_to_end_then_finish() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);
    let events = capture_events(&mut driver);

    driver.jump_to_end(None).unwrap();
    run_tasks(&mut driver);
    assert_eq!(driver.current_time(), 10.0);
    assert_eq!(sink.log().fast_forward_count(), 6);

    driver.tick(TICK).unwrap();
    assert_eq!(driver.state(), DriverState::Finished);
    assert!(events.lock().unwrap().contains(&DriverEvent::PlaybackEnded));
}

#[test]
fn test_skip_time_fast_forwards_without_restore() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    driver.skip_time(3.0).unwrap();
    driver.tick(0.0).unwrap();

    let log = sink.log();
    assert!(log.restores.is_empty());
    assert_eq!(log.fast_forward_count(), 7);
    assert_eq!(log.fast_forward_finished, 1);
    assert_eq!(driver.current_time(), 3.0);
}

#[test]
fn test_time_dilation_and_delta_clamp() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    driver.set_time_dilation(2.0);
    driver.tick(0.25).unwrap();
    assert_eq!(driver.current_time(), 0.5);

    // Deltas above max_delta_seconds are clamped before dilation
    driver.tick(5.0).unwrap();
    assert_eq!(driver.current_time(), 1.5);

    driver.set_time_dilation(-1.0);
    assert_eq!(driver.time_dilation(), 2.0);
}

#[test]
fn test_external_data_and_events_play_back() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten")
        .external_at(1.0, 5, b"loadout")
        .event_at(2.0, "kills", b"red")
        .event_at(3.0, "chat", b"gg")
        .record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    let kills = driver.enumerate_events("kills");
    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].id, "ten_0");
    assert_eq!(kills[0].time_seconds, 2.0);
    assert_eq!(driver.enumerate_events("chat")[0].id, "ten_1");

    driver.tick(0.5).unwrap();
    assert!(sink.log().externals.is_empty());
    driver.tick(0.5).unwrap();
    assert_eq!(
        sink.log().externals,
        vec![(ObjectId(5), b"loadout".to_vec(), DispatchMode::Live)]
    );
}

#[test]
fn test_stop_cancels_pending_seek() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ten", &sink);

    let (slot, callback) = outcome_slot();
    driver.seek_to(9.0, Some(callback)).unwrap();
    driver.stop().unwrap();

    assert!(slot.lock().unwrap().as_ref().unwrap().is_cancelled());
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(driver.current_time(), 0.0);
}

// ── Failed scrubs and size limits ───────────────────────────────

/// Ten second recording with a frame at 5.25 that default playback rejects
fn recording_with_unreadable_frame(storage: &MemoryStorage, name: &str) {
    ten_second_recording(name)
        .config(DemoConfig {
            max_frame_size: 8192,
            enable_checkpoints: false,
            ..DemoConfig::default()
        })
        .frame_at(5.25, &[9; 4096])
        .record(storage.clone());
}

fn is_oversized(err: &DemoError) -> bool {
    matches!(err.root(), DemoError::Format(FormatError::Oversized { .. }))
}

#[test]
fn test_failed_fast_forward_rewinds_sink_to_previous_time() {
    let storage = MemoryStorage::new();
    recording_with_unreadable_frame(&storage, "bad");
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "bad", &sink);
    driver.tick(0.5).unwrap();
    driver.tick(0.5).unwrap();
    let before = sink.log().state();

    let (slot, callback) = outcome_slot();
    driver.seek_to(6.0, Some(callback)).unwrap();
    run_tasks(&mut driver);

    match slot.lock().unwrap().take() {
        Some(TaskOutcome::Failed(err)) => {
            assert!(matches!(err.root(), DemoError::Format(FormatError::Corrupt(_))))
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(driver.current_time(), 1.0);
    assert_eq!(driver.state(), DriverState::Playing);
    let log = sink.log();
    assert_eq!(log.restores, vec![4.0, 0.0]);
    assert_eq!(log.state(), before);

    sink.clear();
    driver.tick(0.5).unwrap();
    assert_eq!(sink.log().live_payloads(), payloads(&["f3"]));
}

#[test]
fn test_unrecoverable_rewind_stops_playback() {
    let storage = MemoryStorage::new();
    recording_with_unreadable_frame(&storage, "bad");
    let sink = RecordingSink::new();
    let mut driver = player(&storage, "bad", &sink);
    driver.tick(0.5).unwrap();
    driver.tick(0.5).unwrap();

    sink.plan_restores(&[true, false]);
    let (slot, callback) = outcome_slot();
    driver.seek_to(6.0, Some(callback)).unwrap();
    let err = driver.tick(TICK).unwrap_err();

    assert!(matches!(
        err.root(),
        DemoError::Checkpoint(CheckpointError::RestoreFailed(_))
    ));
    assert_eq!(driver.state(), DriverState::Idle);
    assert!(matches!(
        slot.lock().unwrap().as_ref(),
        Some(TaskOutcome::Failed(_))
    ));
}

#[test]
fn test_failed_seek_after_preempted_seek_returns_to_original_time() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten").record(storage.clone());
    let sink = RecordingSink::new();
    let config = DemoConfig {
        fast_forward_frames_per_tick: 1,
        ..DemoConfig::default()
    };
    let mut driver = DemoDriver::new(config, storage.clone());
    driver.start_playback("ten", sink.boxed()).unwrap();
    driver.tick(0.5).unwrap();
    driver.tick(0.5).unwrap();
    let before = sink.log().state();

    let (first, first_callback) = outcome_slot();
    driver.seek_to(9.0, Some(first_callback)).unwrap();
    driver.tick(TICK).unwrap();
    driver.tick(TICK).unwrap();
    assert_eq!(driver.current_time(), 8.0);

    sink.plan_restores(&[false]);
    let (second, second_callback) = outcome_slot();
    driver.seek_to(3.0, Some(second_callback)).unwrap();
    run_tasks(&mut driver);

    assert!(first.lock().unwrap().as_ref().unwrap().is_cancelled());
    assert!(matches!(
        second.lock().unwrap().as_ref(),
        Some(TaskOutcome::Failed(_))
    ));
    assert_eq!(driver.current_time(), 1.0);
    assert_eq!(driver.state(), DriverState::Playing);
    let log = sink.log();
    assert_eq!(log.restores, vec![7.0, 0.0]);
    assert_eq!(log.state(), before);
}

#[test]
fn test_batched_fast_forward_keeps_external_data_in_order() {
    let storage = MemoryStorage::new();
    ten_second_recording("ten")
        .external_at(8.5, 3, b"late")
        .record(storage.clone());
    let sink = RecordingSink::new();
    let config = DemoConfig {
        fast_forward_frames_per_tick: 1,
        ..DemoConfig::default()
    };
    let mut driver = DemoDriver::new(config, storage.clone());
    driver.start_playback("ten", sink.boxed()).unwrap();

    driver.seek_to(9.0, None).unwrap();
    run_tasks(&mut driver);

    let log = sink.log();
    assert_eq!(log.restores, vec![7.0]);
    assert_eq!(
        log.externals,
        vec![(ObjectId(3), b"late".to_vec(), DispatchMode::FastForward)]
    );
    assert_eq!(log.arrivals, vec![7.5, 8.0, 8.5, 8.5, 9.0]);
}

#[test]
fn test_oversized_external_data_is_refused_while_recording() {
    let storage = MemoryStorage::new();
    let handle = SourceHandle::new();
    let mut recorder = DemoDriver::new(DemoConfig::default(), storage.clone());
    recorder
        .start_recording("ext", "arena", handle.source())
        .unwrap();
    handle.send(b"a");
    recorder.tick(0.0).unwrap();

    let err = recorder
        .record_external_data(ObjectId(5), vec![7; 4096])
        .unwrap_err();
    assert!(is_oversized(&err));
    recorder
        .record_external_data(ObjectId(5), b"small".to_vec())
        .unwrap();
    handle.send(b"b");
    recorder.tick(1.0).unwrap();
    recorder.stop().unwrap();

    let sink = RecordingSink::new();
    let mut driver = player(&storage, "ext", &sink);
    driver.tick(0.5).unwrap();
    driver.tick(0.5).unwrap();
    let log = sink.log();
    assert_eq!(log.live_payloads(), payloads(&["a", "b"]));
    assert_eq!(
        log.externals,
        vec![(ObjectId(5), b"small".to_vec(), DispatchMode::Live)]
    );
    assert_eq!(driver.state(), DriverState::Finished);
}

#[test]
fn test_oversized_event_is_refused_and_recording_still_opens() {
    let storage = MemoryStorage::new();
    let handle = SourceHandle::new();
    let mut recorder = DemoDriver::new(DemoConfig::default(), storage.clone());
    recorder
        .start_recording("ev", "arena", handle.source())
        .unwrap();
    handle.send(b"a");
    recorder.tick(0.5).unwrap();

    let err = recorder
        .add_side_channel_event("bookmarks", &"m".repeat(70_000), b"")
        .unwrap_err();
    assert!(is_oversized(&err));
    let id = recorder
        .add_side_channel_event("bookmarks", "ok", b"")
        .unwrap();
    assert_eq!(id, "ev_0");
    recorder.stop().unwrap();

    let sink = RecordingSink::new();
    let driver = player(&storage, "ev", &sink);
    let bookmarks = driver.enumerate_events("bookmarks");
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].meta, "ok");
}
