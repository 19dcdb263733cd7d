use tracing::{info, warn};

use super::FrameSource;
use crate::error::{PerceptionError, Result};

/// Tries each device index in order and returns the first source that opens.
pub fn open_first_available<F>(indices: &[u32], mut open: F) -> Result<Box<dyn FrameSource>>
where
    F: FnMut(u32) -> Result<Box<dyn FrameSource>>,
{
    for &index in indices {
        match open(index) {
            Ok(source) => {
                info!("Camera opened index={} ({})", index, source.describe());
                return Ok(source);
            }
            Err(e) => {
                warn!("Camera index {} failed to open: {}", index, e);
            }
        }
    }

    Err(PerceptionError::CaptureUnavailable(format!(
        "no camera opened for indices {:?}",
        indices
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TestPatternSource;

    #[test]
    fn returns_first_index_that_opens() {
        let mut tried = Vec::new();
        let source = open_first_available(&[0, 1, 2], |idx| {
            tried.push(idx);
            if idx == 1 {
                Ok(Box::new(TestPatternSource::new(32, 24, 80)) as Box<dyn FrameSource>)
            } else {
                Err(PerceptionError::CaptureUnavailable(format!("index {idx} busy")))
            }
        });

        assert!(source.is_ok());
        assert_eq!(tried, vec![0, 1]);
    }

    #[test]
    fn fails_when_no_index_opens() {
        let result = open_first_available(&[0, 1], |idx| {
            Err(PerceptionError::CaptureUnavailable(format!("index {idx} missing")))
        });

        assert!(matches!(result, Err(PerceptionError::CaptureUnavailable(_))));
    }
}
