use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mitra_common::DetectionSet;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::camera::{Frame, FrameSource};
use crate::config::ProducerConfig;
use crate::error::{DetectionError, PerceptionError, Result};
use crate::events::{Event, EventBus};
use crate::inference::{annotate_frame, filter_detections, Detector};
use crate::metrics::Metrics;
use crate::state::LiveState;

/// Longest uninterrupted sleep; bounds shutdown latency during backoff.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ProducerState {
    Starting = 0,
    Capturing = 1,
    Detecting = 2,
    Publishing = 3,
    Stopped = 4,
}

impl ProducerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProducerState::Starting,
            1 => ProducerState::Capturing,
            2 => ProducerState::Detecting,
            3 => ProducerState::Publishing,
            _ => ProducerState::Stopped,
        }
    }
}

/// Read-only view of a running producer, shared with the HTTP layer.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    state: Arc<AtomicU8>,
    cycles: Arc<AtomicU64>,
}

impl ProducerHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ProducerState::Starting as u8)),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> ProducerState {
        ProducerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Completed (published) cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    fn set_state(&self, state: ProducerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source had no frame; nothing was published.
    NotReady,
    Published { detections: usize },
}

/// Single writer of [`LiveState`] and single publisher of detection events.
pub struct ProducerLoop {
    source: Box<dyn FrameSource>,
    detector: Option<Box<dyn Detector>>,
    live: Arc<LiveState>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
    config: ProducerConfig,
    cancel: CancellationToken,
    handle: ProducerHandle,
}

impl ProducerLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Option<Box<dyn Detector>>,
        live: Arc<LiveState>,
        bus: Arc<EventBus>,
        metrics: Arc<Metrics>,
        config: ProducerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            detector,
            live,
            bus,
            metrics,
            config,
            cancel,
            handle: ProducerHandle::new(),
        }
    }

    pub fn handle(&self) -> ProducerHandle {
        self.handle.clone()
    }

    /// Starts the loop on a dedicated `producer` thread.
    pub fn spawn(self) -> Result<(ProducerHandle, JoinHandle<()>)> {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || self.run())?;
        Ok((handle, join))
    }

    /// Runs until the source is lost or the token is cancelled.
    pub fn run(mut self) {
        info!(
            "Producer starting: source {}, detector {}",
            self.source.describe(),
            self.detector.as_ref().map(|d| d.name()).unwrap_or("none")
        );
        self.handle.set_state(ProducerState::Starting);
        self.pause(self.config.warmup());

        while !self.cancel.is_cancelled() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()));

            let delay = match result {
                Ok(Ok(CycleOutcome::NotReady)) => self.config.not_ready_retry(),
                Ok(Ok(CycleOutcome::Published { detections })) => {
                    debug!(detections, "Cycle published");
                    self.config.cycle_delay()
                }
                Ok(Err(PerceptionError::CaptureUnavailable(reason))) => {
                    error!("Capture source lost, producer stopping: {}", reason);
                    break;
                }
                Ok(Err(e)) => {
                    self.metrics.cycles_failed.inc();
                    warn!("Producer cycle failed: {}", e);
                    self.config.error_backoff()
                }
                Err(_) => {
                    self.metrics.cycles_failed.inc();
                    error!("Producer cycle panicked, backing off");
                    self.config.error_backoff()
                }
            };

            self.pause(delay);
        }

        self.handle.set_state(ProducerState::Stopped);
        if self.cancel.is_cancelled() {
            self.bus.close();
        }
        info!("Producer stopped after {} cycles", self.handle.cycles());
    }

    /// One capture, detect, publish pass.
    #[instrument(level = "debug", skip_all)]
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.handle.set_state(ProducerState::Capturing);
        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.is_transient() => return Ok(CycleOutcome::NotReady),
            Err(e) => return Err(e.into()),
        };
        self.metrics.frames_captured.inc();

        self.handle.set_state(ProducerState::Detecting);
        let detections = self.detect(&frame);
        let frame = self.annotate(frame, &detections);

        self.handle.set_state(ProducerState::Publishing);
        let count = detections.len();
        if count > 0 {
            self.live.update(frame, detections.clone());
            self.bus.publish(Event::detections(detections));
        } else {
            self.live.update(frame, detections);
        }
        self.handle.cycles.fetch_add(1, Ordering::AcqRel);

        Ok(CycleOutcome::Published { detections: count })
    }

    /// Failures and panics inside the detector count as an empty result.
    fn detect(&mut self, frame: &Frame) -> DetectionSet {
        let Some(detector) = self.detector.as_mut() else {
            return DetectionSet::new();
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame)))
            .unwrap_or_else(|_| Err(DetectionError::Model("detector panicked".to_string())));

        match result {
            Ok(raw) => filter_detections(
                raw,
                self.live.confidence_threshold(),
                frame.width,
                frame.height,
            ),
            Err(e) => {
                self.metrics.detection_failures.inc();
                warn!(sequence = frame.sequence, "Detection failed, publishing empty set: {}", e);
                DetectionSet::new()
            }
        }
    }

    fn annotate(&self, frame: Frame, detections: &DetectionSet) -> Frame {
        if detections.is_empty() {
            return frame;
        }
        match annotate_frame(&frame, detections) {
            Ok(annotated) => annotated,
            Err(e) => {
                warn!(sequence = frame.sequence, "Annotation failed, publishing raw frame: {}", e);
                frame
            }
        }
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
