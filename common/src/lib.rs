//! Types shared by the perception node and the web platform.

pub mod types;
pub mod utils;

pub use types::{BBox, Detection, DetectionSet};
