use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{PerceptionError, Result};

/// Environment variable that overrides the assistant endpoint.
pub const ASSISTANT_URL_ENV: &str = "MITRA_MAC_ASSISTANT";
pub const DEFAULT_ASSISTANT_URL: &str = "http://192.168.115.241:6000/ask";

/// MobileNet-SSD (VOC) class table; index 0 is the background class.
pub const MOBILENET_SSD_CLASSES: [&str; 21] = [
    "background", "aeroplane", "bicycle", "bird", "boat", "bottle", "bus", "car", "cat", "chair",
    "cow", "diningtable", "dog", "horse", "motorbike", "person", "pottedplant", "sheep", "sofa",
    "train", "tvmonitor",
];

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PerceptionConfig {
    pub node_id: String,
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub inference: InferenceConfig,
    pub producer: ProducerConfig,
    pub streaming: StreamingConfig,
    pub assistant: AssistantConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// V4L2 device through GStreamer (`gstreamer` feature).
    V4l2,
    /// Synthetic moving pattern, no hardware required.
    TestPattern,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CaptureBackend,
    /// Device indices tried in order until one opens.
    pub indices: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub jpeg_quality: u8,
    /// Explicit GStreamer pipeline; must end in an appsink named `sink`.
    pub pipeline: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub enabled: bool,
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub mean: f32,
    pub class_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProducerConfig {
    pub cycle_delay_ms: u64,
    pub not_ready_retry_ms: u64,
    pub error_backoff_ms: u64,
    pub warmup_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StreamingConfig {
    pub mjpeg_frame_delay_ms: u64,
    pub mjpeg_idle_poll_ms: u64,
    pub mailbox_capacity: usize,
    pub sse_keepalive_sec: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AssistantConfig {
    pub url: String,
    pub timeout_sec: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            node_id: "perception-node-1".to_string(),
            server: ServerConfig::default(),
            camera: CameraConfig::default(),
            inference: InferenceConfig::default(),
            producer: ProducerConfig::default(),
            streaming: StreamingConfig::default(),
            assistant: AssistantConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            workers: 4,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::V4l2,
            indices: vec![0, 1],
            width: 640,
            height: 480,
            framerate: 30,
            jpeg_quality: 80,
            pipeline: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: PathBuf::from("models/mobilenet_ssd.onnx"),
            confidence_threshold: 0.5,
            input_width: 300,
            input_height: 300,
            scale: 0.007843,
            mean: 127.5,
            class_names: MOBILENET_SSD_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            cycle_delay_ms: 20,
            not_ready_retry_ms: 50,
            error_backoff_ms: 500,
            warmup_ms: 500,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mjpeg_frame_delay_ms: 30,
            mjpeg_idle_poll_ms: 50,
            mailbox_capacity: 64,
            sse_keepalive_sec: 15,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ASSISTANT_URL.to_string(),
            timeout_sec: 20,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

impl ProducerConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn not_ready_retry(&self) -> Duration {
        Duration::from_millis(self.not_ready_retry_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

impl StreamingConfig {
    pub fn mjpeg_frame_delay(&self) -> Duration {
        Duration::from_millis(self.mjpeg_frame_delay_ms)
    }

    pub fn mjpeg_idle_poll(&self) -> Duration {
        Duration::from_millis(self.mjpeg_idle_poll_ms)
    }

    pub fn sse_keepalive(&self) -> Duration {
        Duration::from_secs(self.sse_keepalive_sec)
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

impl PerceptionConfig {
    /// Loads an optional YAML file, then `MITRA_*` environment overrides
    /// (`MITRA_SERVER__PORT=5050`), then the assistant URL override.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MITRA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: PerceptionConfig = settings.try_deserialize()?;

        if let Ok(url) = std::env::var(ASSISTANT_URL_ENV) {
            if !url.trim().is_empty() {
                config.assistant.url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.inference.confidence_threshold) {
            return Err(PerceptionError::ConfigError(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.inference.confidence_threshold
            )));
        }
        if self.camera.backend == CaptureBackend::V4l2
            && self.camera.indices.is_empty()
            && self.camera.pipeline.is_none()
        {
            return Err(PerceptionError::ConfigError(
                "camera.indices must list at least one device".to_string(),
            ));
        }
        if self.streaming.mailbox_capacity == 0 {
            return Err(PerceptionError::ConfigError(
                "streaming.mailbox_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
