use bytes::Bytes;
use chrono::{DateTime, Utc};

use tracing::info;

use crate::config::{CameraConfig, CaptureBackend};
use crate::error::{self, CaptureError};

#[cfg(feature = "gstreamer")]
pub mod gstreamer;
pub mod selection;
pub mod test_pattern;

pub use selection::open_first_available;
pub use test_pattern::TestPatternSource;

/// An encoded (JPEG) frame. Cloning shares the underlying bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            sequence,
            captured_at: Utc::now(),
        }
    }

    /// Same capture metadata, different payload (used after annotation).
    pub fn with_data(&self, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..self.clone()
        }
    }
}

/// A capture device. Reads block until a frame is available or the
/// device reports that none is ready.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        (**self).read_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Opens the configured capture backend. A V4L2 backend tries each
/// configured index in order; failure to open any of them is fatal.
pub fn open_source(config: &CameraConfig) -> error::Result<Box<dyn FrameSource>> {
    match config.backend {
        CaptureBackend::TestPattern => {
            info!("Using synthetic test pattern {}x{}", config.width, config.height);
            Ok(Box::new(TestPatternSource::new(config.width, config.height, config.jpeg_quality)))
        }
        CaptureBackend::V4l2 => open_v4l2(config),
    }
}

#[cfg(feature = "gstreamer")]
fn open_v4l2(config: &CameraConfig) -> error::Result<Box<dyn FrameSource>> {
    // An explicit pipeline ignores the index, so one attempt is enough.
    let indices: &[u32] = if config.pipeline.is_some() && config.indices.is_empty() {
        &[0]
    } else {
        &config.indices
    };

    open_first_available(indices, |index| {
        gstreamer::GStreamerCamera::open(index, config).map(|cam| Box::new(cam) as Box<dyn FrameSource>)
    })
}

#[cfg(not(feature = "gstreamer"))]
fn open_v4l2(config: &CameraConfig) -> error::Result<Box<dyn FrameSource>> {
    tracing::warn!("Built without the `gstreamer` feature, using the test pattern instead of V4L2");
    Ok(Box::new(TestPatternSource::new(config.width, config.height, config.jpeg_quality)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_backend_produces_frames() {
        let config = CameraConfig {
            backend: CaptureBackend::TestPattern,
            width: 64,
            height: 48,
            ..CameraConfig::default()
        };

        let mut source = open_source(&config).unwrap();
        let frame = source.read_frame().unwrap();

        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);
    }
}
