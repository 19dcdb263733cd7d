#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use mitra_common::DetectionSet;
use mitra_perception::{
    camera::{Frame, FrameSource},
    config::{PerceptionConfig, ProducerConfig},
    error::{CaptureError, DetectionError},
    inference::Detector,
    metrics::Metrics,
    processing::ProducerLoop,
    AppState,
};
use tokio_util::sync::CancellationToken;

/// Yields frames `1..=count`, then reports the source as exhausted.
pub struct CountingSource {
    next: u64,
    count: u64,
}

impl CountingSource {
    pub fn new(count: u64) -> Self {
        Self { next: 1, count }
    }
}

impl FrameSource for CountingSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.next > self.count {
            return Err(CaptureError::Exhausted);
        }
        let seq = self.next;
        self.next += 1;
        Ok(Frame::new(format!("frame-{}", seq).into_bytes(), 640, 480, seq))
    }

    fn describe(&self) -> String {
        format!("counting source ({} frames)", self.count)
    }
}

pub enum Step {
    Detect(DetectionSet),
    Fail,
    Panic,
}

/// Plays back one step per call; empty results once the script runs out.
pub struct ScriptedDetector {
    steps: VecDeque<Step>,
}

impl ScriptedDetector {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: steps.into() }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<DetectionSet, DetectionError> {
        match self.steps.pop_front() {
            Some(Step::Detect(set)) => Ok(set),
            Some(Step::Fail) => Err(DetectionError::Model("injected failure".to_string())),
            Some(Step::Panic) => panic!("injected detector panic"),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn fast_producer_config() -> ProducerConfig {
    ProducerConfig {
        cycle_delay_ms: 1,
        not_ready_retry_ms: 1,
        error_backoff_ms: 1,
        warmup_ms: 0,
    }
}

/// Address nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/ask", listener.local_addr().unwrap());
    drop(listener);
    url
}

pub fn test_state() -> AppState {
    let mut config = PerceptionConfig::default();
    config.assistant.url = unreachable_url();
    config.assistant.timeout_sec = 1;
    config.streaming.mjpeg_frame_delay_ms = 5;
    config.streaming.mjpeg_idle_poll_ms = 5;
    AppState::new(config, Arc::new(Metrics::new().unwrap()), CancellationToken::new()).unwrap()
}

pub fn producer_for(state: &AppState, source: impl FrameSource + 'static, detector: Option<ScriptedDetector>) -> ProducerLoop {
    ProducerLoop::new(
        Box::new(source),
        detector.map(|d| Box::new(d) as Box<dyn Detector>),
        Arc::clone(&state.live),
        Arc::clone(&state.bus),
        Arc::clone(&state.metrics),
        fast_producer_config(),
        state.shutdown.clone(),
    )
}
