use std::sync::{Arc, Mutex, MutexGuard};

use mitra_common::{Detection, DetectionSet};

use crate::camera::Frame;

/// The current (frame, detections) pair. Immutable once published.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: Option<Frame>,
    pub detections: Arc<[Detection]>,
    pub confidence_threshold: f32,
    /// Number of updates applied so far; 0 means no data yet.
    pub cycle: u64,
}

impl Snapshot {
    fn empty(confidence_threshold: f32) -> Self {
        Self {
            frame: None,
            detections: Arc::from(Vec::new()),
            confidence_threshold,
            cycle: 0,
        }
    }

    pub fn has_frame(&self) -> bool {
        self.frame.is_some()
    }
}

/// Single-slot, latest-value store shared by the producer and all readers.
///
/// The lock guards only the `Arc` swap on write and the `Arc` clone on
/// read, so a reader always sees a frame and detection set that were
/// written together, and nobody holds the lock across I/O.
#[derive(Debug)]
pub struct LiveState {
    current: Mutex<Arc<Snapshot>>,
}

impl LiveState {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            current: Mutex::new(Arc::new(Snapshot::empty(clamp_threshold(confidence_threshold)))),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Arc<Snapshot>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically replaces the current frame and detection set.
    pub fn update(&self, frame: Frame, detections: DetectionSet) {
        let detections: Arc<[Detection]> = Arc::from(detections);
        let mut slot = self.slot();
        let next = Snapshot {
            frame: Some(frame),
            detections,
            confidence_threshold: slot.confidence_threshold,
            cycle: slot.cycle + 1,
        };
        *slot = Arc::new(next);
    }

    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&self.slot())
    }

    pub fn latest_detections(&self) -> Arc<[Detection]> {
        Arc::clone(&self.read().detections)
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.slot().confidence_threshold
    }

    pub fn set_confidence_threshold(&self, threshold: f32) {
        let mut slot = self.slot();
        let mut next = Snapshot::clone(&slot);
        next.confidence_threshold = clamp_threshold(threshold);
        *slot = Arc::new(next);
    }
}

impl Default for LiveState {
    fn default() -> Self {
        Self::new(0.5)
    }
}

fn clamp_threshold(threshold: f32) -> f32 {
    if threshold.is_nan() {
        0.0
    } else {
        threshold.clamp(0.0, 1.0)
    }
}
