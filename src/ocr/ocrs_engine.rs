//! `ocrs` text detector (pure-Rust detection + recognition models).

use super::{Detection, TextDetector};
use anyhow::{Context, Result};
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::Path;
use tracing::{debug, info};

pub struct OcrsDetector {
    engine: OcrEngine,
}

impl OcrsDetector {
    /// Load the detection and recognition models from `.rten` files.
    ///
    /// Loading takes a while, so build this once at startup and share it.
    pub fn from_model_files(detection_model: &Path, recognition_model: &Path) -> Result<Self> {
        info!(
            "OcrsDetector: loading models (detection={:?}, recognition={:?})",
            detection_model, recognition_model
        );

        let detection_model = Model::load_file(detection_model)
            .with_context(|| format!("Failed to load text detection model: {:?}", detection_model))?;
        let recognition_model = Model::load_file(recognition_model).with_context(|| {
            format!("Failed to load text recognition model: {:?}", recognition_model)
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .context("Failed to initialize OCR engine")?;

        Ok(Self { engine })
    }
}

impl TextDetector for OcrsDetector {
    fn name(&self) -> &str {
        "ocrs"
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let rgb = image.to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .context("Failed to create image source")?;

        let input = self
            .engine
            .prepare_input(source)
            .context("Failed to prepare OCR input")?;
        let word_rects = self
            .engine
            .detect_words(&input)
            .context("Failed to detect words")?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .context("Failed to recognize text")?;

        // ocrs does not report a recognition score, so every line gets 1.0
        let detections: Vec<Detection> = lines
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let rect = line.bounding_rect();
                Some(Detection::from_box(
                    rect.left() as f32,
                    rect.top() as f32,
                    rect.right() as f32,
                    rect.bottom() as f32,
                    text,
                    1.0,
                ))
            })
            .collect();

        debug!(
            "OcrsDetector: {} word regions, {} lines, {} detections",
            word_rects.len(),
            line_rects.len(),
            detections.len()
        );

        Ok(detections)
    }
}
