//! Text detector abstraction.
//!
//! Defines the [`TextDetector`] trait and the [`Detection`] type so the pipeline
//! can run against any OCR backend. The production backend is [`ocrs_engine`];
//! tests plug in fixed detections instead of loading models.

pub mod ocrs_engine;

use image::DynamicImage;

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One OCR-reported text region.
///
/// `region` corners are ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub region: [Point; 4],
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    /// Build a detection from an axis-aligned box.
    pub fn from_box(left: f32, top: f32, right: f32, bottom: f32, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region: [
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
                Point::new(left, bottom),
            ],
            text: text.into(),
            confidence,
        }
    }

    pub fn top_left(&self) -> Point {
        self.region[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.region[2]
    }
}

/// Synchronous text detection backend.
///
/// Implementations are initialized once per process and shared across requests,
/// so `detect` must not mutate shared state.
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_box_corner_order() {
        let d = Detection::from_box(10.0, 20.0, 110.0, 45.0, "RECEIPT", 0.9);
        assert_eq!(d.top_left(), Point::new(10.0, 20.0));
        assert_eq!(d.bottom_right(), Point::new(110.0, 45.0));
        assert_eq!(d.region[1], Point::new(110.0, 20.0));
        assert_eq!(d.region[3], Point::new(10.0, 45.0));
    }
}
