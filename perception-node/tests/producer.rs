mod common;

use std::time::{Duration, Instant};

use common::{producer_for, test_state, CountingSource, ScriptedDetector, Step};
use mitra_common::{BBox, Detection};
use mitra_perception::{
    events::EventPayload,
    processing::{CycleOutcome, ProducerState},
};

fn person() -> Vec<Detection> {
    vec![Detection::new("person", 0.91, BBox::new(1, 2, 3, 4))]
}

#[test]
fn failing_detector_for_one_cycle_does_not_stop_the_loop() {
    let state = test_state();
    let detector = ScriptedDetector::new(vec![
        Step::Detect(person()),
        Step::Fail,
        Step::Detect(person()),
    ]);
    let mut producer = producer_for(&state, CountingSource::new(3), Some(detector));

    assert_eq!(producer.run_cycle().unwrap(), CycleOutcome::Published { detections: 1 });
    assert_eq!(producer.run_cycle().unwrap(), CycleOutcome::Published { detections: 0 });
    assert_eq!(producer.run_cycle().unwrap(), CycleOutcome::Published { detections: 1 });

    let snapshot = state.live.read();
    assert_eq!(snapshot.cycle, 3);
    assert_eq!(snapshot.frame.as_ref().unwrap().sequence, 3);
    assert_eq!(state.metrics.detection_failures.get(), 1);
}

#[test]
fn panicking_detector_is_contained_and_loop_runs_to_source_end() {
    let state = test_state();
    let sub = state.bus.subscribe();
    let detector = ScriptedDetector::new(vec![
        Step::Detect(person()),
        Step::Panic,
        Step::Fail,
        Step::Detect(person()),
    ]);
    let producer = producer_for(&state, CountingSource::new(5), Some(detector));

    let (handle, thread) = producer.spawn().unwrap();
    let started = Instant::now();
    while handle.state() != ProducerState::Stopped && started.elapsed() < Duration::from_secs(10) {
        std::thread::sleep(Duration::from_millis(5));
    }
    thread.join().unwrap();

    assert_eq!(handle.state(), ProducerState::Stopped);
    assert_eq!(handle.cycles(), 5);
    assert_eq!(state.metrics.frames_captured.get(), 5);
    assert_eq!(state.metrics.detection_failures.get(), 2);

    // Only the two detection-bearing cycles produce events.
    let mut events = 0;
    while let Some(event) = sub.try_recv() {
        assert!(matches!(event.payload, EventPayload::Detections(_)));
        events += 1;
    }
    assert_eq!(events, 2);
}

#[test]
fn threshold_change_applies_to_following_cycles() {
    let state = test_state();
    let detector = ScriptedDetector::new(vec![Step::Detect(person()), Step::Detect(person())]);
    let mut producer = producer_for(&state, CountingSource::new(2), Some(detector));

    producer.run_cycle().unwrap();
    assert_eq!(state.live.latest_detections().len(), 1);

    state.live.set_confidence_threshold(0.95);
    producer.run_cycle().unwrap();
    assert!(state.live.latest_detections().is_empty());
    assert_eq!(state.live.confidence_threshold(), 0.95);
}
