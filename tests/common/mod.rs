//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::sync::{Arc, Mutex};

use netdemo_rs::tasks::DoneCallback;
use netdemo_rs::{DemoDriver, DriverEvent, TaskOutcome};

/// Frame length used when ticking playback
pub const TICK: f64 = 1.0 / 60.0;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Outcome slot filled by a completion callback
pub type OutcomeSlot = Arc<Mutex<Option<TaskOutcome>>>;

pub fn outcome_slot() -> (OutcomeSlot, DoneCallback) {
    let slot: OutcomeSlot = Arc::default();
    let writer = slot.clone();
    let callback: DoneCallback = Box::new(move |outcome| {
        let mut guard = writer.lock().unwrap();
        assert!(guard.is_none(), "completion callback fired twice");
        *guard = Some(outcome);
    });
    (slot, callback)
}

/// Collect every driver event into a shared list
pub fn capture_events(driver: &mut DemoDriver) -> Arc<Mutex<Vec<DriverEvent>>> {
    let events: Arc<Mutex<Vec<DriverEvent>>> = Arc::default();
    let sink = events.clone();
    driver.add_listener(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

/// Tick until no task is running, with an upper bound
pub fn run_tasks(driver: &mut DemoDriver) {
    for _ in 0..1000 {
        if !matches!(driver.state(), netdemo_rs::DriverState::ScrubbingToTime { .. }) {
            return;
        }
        driver.tick(TICK).unwrap();
    }
    panic!("tasks did not finish");
}
