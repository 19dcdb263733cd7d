use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Orders the corners and clamps them into a `width` x `height` frame.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = height.saturating_sub(1).min(i32::MAX as u32) as i32;

        let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (y1, y2) = (self.y1.min(self.y2), self.y1.max(self.y2));

        Self {
            x1: x1.clamp(0, max_x),
            y1: y1.clamp(0, max_y),
            x2: x2.clamp(0, max_x),
            y2: y2.clamp(0, max_y),
        }
    }
}

impl From<[i32; 4]> for BBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detected object. Field names match the `/latest_detections` JSON.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_label: String,
    #[serde(rename = "conf")]
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }

    /// `DETECT|<timestamp>|<class>|<conf>` event record.
    pub fn event_record(&self, timestamp: &str) -> String {
        format!("DETECT|{}|{}|{:.3}", timestamp, self.class_label, self.confidence)
    }
}

/// Detections for a single frame, in detector output order.
pub type DetectionSet = Vec<Detection>;
