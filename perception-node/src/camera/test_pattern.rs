use image::{codecs::jpeg::JpegEncoder, ColorType, Rgb, RgbImage};

use super::{Frame, FrameSource};
use crate::error::CaptureError;

/// Synthetic source that renders a moving gradient with a bright bar.
/// Used when no capture hardware is attached.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    quality: u8,
    sequence: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality: quality.clamp(1, 100),
            sequence: 0,
        }
    }

    fn render(&self) -> RgbImage {
        let offset = ((self.sequence * 4) % self.width as u64) as u32;
        let bar_x = offset;

        RgbImage::from_fn(self.width, self.height, |x, y| {
            if x.abs_diff(bar_x) < 4 {
                return Rgb([255, 255, 255]);
            }
            let r = ((x + offset) % self.width * 255 / self.width) as u8;
            let g = (y * 255 / self.height) as u8;
            Rgb([r, g, 96])
        })
    }
}

impl FrameSource for TestPatternSource {
    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        self.sequence += 1;
        let img = self.render();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(img.as_raw(), self.width, self.height, ColorType::Rgb8)
            .map_err(|e| CaptureError::Device(format!("jpeg encode failed: {}", e)))?;

        Ok(Frame::new(jpeg, self.width, self.height, self.sequence))
    }

    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}
