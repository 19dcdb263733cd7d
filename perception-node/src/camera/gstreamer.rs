use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use tracing::{info, warn};

use super::{Frame, FrameSource};
use crate::config::CameraConfig;
use crate::error::{CaptureError, PerceptionError, Result};

const PULL_TIMEOUT_MS: u64 = 100;
const START_TIMEOUT_SEC: u64 = 3;

/// V4L2 camera read through a GStreamer pipeline that emits JPEG samples.
pub struct GStreamerCamera {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    description: String,
    width: u32,
    height: u32,
    sequence: u64,
}

impl GStreamerCamera {
    pub fn open(index: u32, config: &CameraConfig) -> Result<Self> {
        gstreamer::init()
            .map_err(|e| PerceptionError::CaptureUnavailable(format!("GStreamer init failed: {}", e)))?;

        let description = Self::pipeline_description(index, config);
        info!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| PerceptionError::CaptureUnavailable(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| PerceptionError::CaptureUnavailable("Failed to downcast to pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| PerceptionError::CaptureUnavailable("No appsink element found in pipeline".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| PerceptionError::CaptureUnavailable("Failed to downcast to AppSink".to_string()))?;

        appsink.set_drop(true);
        appsink.set_max_buffers(2);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| PerceptionError::CaptureUnavailable(format!("Failed to start pipeline: {}", e)))?;

        let (result, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(START_TIMEOUT_SEC));
        if let Err(e) = result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(PerceptionError::CaptureUnavailable(format!(
                "device {} did not reach playing state: {}",
                index, e
            )));
        }

        Ok(Self {
            pipeline,
            appsink,
            description,
            width: config.width,
            height: config.height,
            sequence: 0,
        })
    }

    fn pipeline_description(index: u32, config: &CameraConfig) -> String {
        if let Some(pipeline) = &config.pipeline {
            return pipeline.clone();
        }
        format!(
            "v4l2src device=/dev/video{} ! videoconvert ! videoscale ! \
             video/x-raw,width={},height={} ! jpegenc quality={} ! \
             appsink name=sink sync=false",
            index, config.width, config.height, config.jpeg_quality
        )
    }

    fn check_bus(&self) -> std::result::Result<(), CaptureError> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(msg) = bus.pop_filtered(&[gstreamer::MessageType::Error, gstreamer::MessageType::Eos]) {
            match msg.view() {
                gstreamer::MessageView::Eos(..) => return Err(CaptureError::Exhausted),
                gstreamer::MessageView::Error(err) => {
                    return Err(CaptureError::Device(err.error().to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FrameSource for GStreamerCamera {
    fn read_frame(&mut self) -> std::result::Result<Frame, CaptureError> {
        let sample = match self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        {
            Some(sample) => sample,
            None => {
                if self.appsink.is_eos() {
                    return Err(CaptureError::Exhausted);
                }
                self.check_bus()?;
                return Err(CaptureError::NotReady);
            }
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| CaptureError::Device("sample without buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| CaptureError::Device("failed to map buffer".to_string()))?;

        let (width, height) = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .map(|(w, h)| (w as u32, h as u32))
            .unwrap_or((self.width, self.height));

        self.sequence += 1;
        Ok(Frame::new(map.as_slice().to_vec(), width, height, self.sequence))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for GStreamerCamera {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        }
        info!("GStreamer camera stopped");
    }
}
