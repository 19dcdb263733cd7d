use std::time::Instant;

use image::imageops::{self, FilterType};
use mitra_common::{BBox, Detection, DetectionSet};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info, instrument};

use super::Detector;
use crate::camera::Frame;
use crate::config::InferenceConfig;
use crate::error::DetectionError;

/// Values per SSD detection row: image id, class, confidence, x1, y1, x2, y2.
const SSD_ROW: usize = 7;

/// MobileNet-SSD exported to ONNX. Input `[1, 3, H, W]` in BGR order,
/// normalised as `(pixel - mean) * scale`; output `[1, 1, N, 7]`.
pub struct OrtDetector {
    session: Session,
    input_name: String,
    config: InferenceConfig,
}

impl OrtDetector {
    pub fn load(config: &InferenceConfig) -> Result<Self, DetectionError> {
        info!("Loading detection model {}", config.model_path.display());

        let session = Session::builder()
            .map_err(|e| DetectionError::Model(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectionError::Model(format!("Failed to set optimization level: {}", e)))?
            .commit_from_file(&config.model_path)
            .map_err(|e| DetectionError::Model(format!("Failed to load model: {}", e)))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DetectionError::Model("model has no inputs".to_string()))?;

        info!("Model loaded successfully: {}", config.model_path.display());
        Ok(Self {
            session,
            input_name,
            config: config.clone(),
        })
    }

    fn preprocess(&self, frame: &Frame) -> Result<Vec<f32>, DetectionError> {
        let (w, h) = (self.config.input_width, self.config.input_height);
        let rgb = image::load_from_memory(&frame.data)?.to_rgb8();
        let resized = imageops::resize(&rgb, w, h, FilterType::Triangle);

        let plane = (w * h) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (i, px) in resized.pixels().enumerate() {
            // BGR planes
            data[i] = (px[2] as f32 - self.config.mean) * self.config.scale;
            data[plane + i] = (px[1] as f32 - self.config.mean) * self.config.scale;
            data[2 * plane + i] = (px[0] as f32 - self.config.mean) * self.config.scale;
        }
        Ok(data)
    }

    fn postprocess(config: &InferenceConfig, rows: &[f32], frame: &Frame) -> DetectionSet {
        let (fw, fh) = (frame.width as f32, frame.height as f32);

        rows.chunks_exact(SSD_ROW)
            .filter_map(|row| {
                let class_idx = row[1] as i64;
                if class_idx < 0 || class_idx as usize >= config.class_names.len() {
                    return None;
                }
                let bbox = BBox::new(
                    (row[3] * fw) as i32,
                    (row[4] * fh) as i32,
                    (row[5] * fw) as i32,
                    (row[6] * fh) as i32,
                );
                Some(Detection::new(
                    config.class_names[class_idx as usize].clone(),
                    row[2],
                    bbox,
                ))
            })
            .collect()
    }
}

impl Detector for OrtDetector {
    #[instrument(skip(self, frame), fields(sequence = frame.sequence), level = "debug")]
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, DetectionError> {
        let start = Instant::now();
        let data = self.preprocess(frame)?;
        let shape = [
            1usize,
            3,
            self.config.input_height as usize,
            self.config.input_width as usize,
        ];

        let input = Tensor::from_array((shape, data))
            .map_err(|e| DetectionError::Model(format!("Failed to create input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs! { self.input_name.as_str() => input })
            .map_err(|e| DetectionError::Model(format!("Inference failed: {}", e)))?;

        let (_, rows) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Output(format!("Failed to extract tensor: {}", e)))?;

        // `outputs` still borrows the session, so only the config is passed on.
        let detections = Self::postprocess(&self.config, rows, frame);
        debug!(
            "Inference produced {} raw detections in {:?}",
            detections.len(),
            start.elapsed()
        );
        Ok(detections)
    }

    fn name(&self) -> &str {
        "mobilenet-ssd"
    }
}
