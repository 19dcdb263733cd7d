//! Object detection: the [`Detector`] seam, per-cycle filtering and
//! frame annotation.

use mitra_common::{Detection, DetectionSet};
use tracing::{info, warn};

use crate::camera::Frame;
use crate::config::InferenceConfig;
use crate::error::DetectionError;

pub mod annotate;
#[cfg(feature = "onnx")]
pub mod ort_engine;

pub use annotate::annotate_frame;

/// Turns one frame into detections, in model output order.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, DetectionError>;

    fn name(&self) -> &str;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, DetectionError> {
        (**self).detect(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Drops detections under `threshold` and clamps boxes to the frame.
pub fn filter_detections(raw: DetectionSet, threshold: f32, width: u32, height: u32) -> DetectionSet {
    raw.into_iter()
        .filter(|d| d.confidence.is_finite() && d.confidence >= threshold)
        .map(|d| Detection {
            bbox: d.bbox.clamped(width, height),
            confidence: d.confidence.min(1.0),
            ..d
        })
        .collect()
}

/// Loads the configured detector. Absence is not an error: the node then
/// publishes frames with empty detection sets.
pub fn load_detector(config: &InferenceConfig) -> Option<Box<dyn Detector>> {
    if !config.enabled {
        info!("Detection disabled by configuration");
        return None;
    }

    if !config.model_path.exists() {
        warn!(
            "Model file {} not found, detection disabled",
            config.model_path.display()
        );
        return None;
    }

    load_model(config)
}

#[cfg(feature = "onnx")]
fn load_model(config: &InferenceConfig) -> Option<Box<dyn Detector>> {
    match ort_engine::OrtDetector::load(config) {
        Ok(detector) => Some(Box::new(detector)),
        Err(e) => {
            warn!("Failed to load detection model: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn load_model(config: &InferenceConfig) -> Option<Box<dyn Detector>> {
    warn!(
        "Model {} present but this build has no `onnx` feature, detection disabled",
        config.model_path.display()
    );
    None
}
