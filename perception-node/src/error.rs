use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Detection failure: {0}")]
    DetectionFailure(String),

    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    #[error("Remote call failure: {0}")]
    RemoteCallFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Failure reading from a [`FrameSource`](crate::camera::FrameSource).
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No frame is ready yet; the caller retries in place.
    #[error("no frame ready")]
    NotReady,

    #[error("source exhausted")]
    Exhausted,

    #[error("capture device failure: {0}")]
    Device(String),
}

impl CaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::NotReady)
    }
}

/// Failure of a single inference; recovered as an empty detection set.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("model error: {0}")]
    Model(String),

    #[error("frame decode error: {0}")]
    Decode(String),

    #[error("unexpected model output: {0}")]
    Output(String),
}

impl From<CaptureError> for PerceptionError {
    fn from(error: CaptureError) -> Self {
        PerceptionError::CaptureUnavailable(error.to_string())
    }
}

impl From<DetectionError> for PerceptionError {
    fn from(error: DetectionError) -> Self {
        PerceptionError::DetectionFailure(error.to_string())
    }
}

impl From<image::ImageError> for DetectionError {
    fn from(error: image::ImageError) -> Self {
        DetectionError::Decode(error.to_string())
    }
}

impl From<config::ConfigError> for PerceptionError {
    fn from(error: config::ConfigError) -> Self {
        PerceptionError::ConfigError(error.to_string())
    }
}

impl From<serde_json::Error> for PerceptionError {
    fn from(error: serde_json::Error) -> Self {
        PerceptionError::SerializationError(error.to_string())
    }
}

impl From<reqwest::Error> for PerceptionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            PerceptionError::Timeout(error.to_string())
        } else {
            PerceptionError::RemoteCallFailure(error.to_string())
        }
    }
}

impl From<prometheus::Error> for PerceptionError {
    fn from(error: prometheus::Error) -> Self {
        PerceptionError::ConfigError(format!("metrics: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for PerceptionError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        PerceptionError::Timeout(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PerceptionError>;
