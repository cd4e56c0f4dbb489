//! Highlight pipeline: decode → detect → filter → annotate, per image and per batch.

use crate::annotate::{annotate_and_save, HighlightStyle};
use crate::error::PipelineError;
use crate::matcher::{filter_matches, SearchQuery};
use crate::ocr::TextDetector;
use crate::storage::remove_quietly;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One image of a batch: where it was saved and where its highlight goes.
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub output_filename: String,
}

/// An annotated output written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub filename: String,
    pub path: PathBuf,
}

/// Runs the pipeline against a shared detector.
#[derive(Clone)]
pub struct Highlighter {
    detector: Arc<dyn TextDetector>,
    style: HighlightStyle,
}

impl Highlighter {
    pub fn new(detector: Arc<dyn TextDetector>) -> Self {
        Self {
            detector,
            style: HighlightStyle::default(),
        }
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.style = style;
        self
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Search `input` for `query` and write an annotated copy to `output`.
    ///
    /// Returns whether anything matched. Nothing is written on `Ok(false)`.
    pub fn highlight_file(
        &self,
        input: &Path,
        query: &SearchQuery,
        output: &Path,
    ) -> Result<bool, PipelineError> {
        // sniff the format from the bytes, not the extension
        let image = image::ImageReader::open(input)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(image::ImageError::IoError)
            .and_then(|reader| reader.decode())
            .map_err(|source| PipelineError::ImageDecode {
                path: input.to_path_buf(),
                source,
            })?;

        let detections = self
            .detector
            .detect(&image)
            .map_err(PipelineError::Detection)?;
        debug!("{:?}: {} detection(s)", input, detections.len());

        let matches = filter_matches(&detections, query);
        for m in &matches {
            debug!("Found text: '{}' (confidence: {:.2})", m.text, m.confidence);
        }

        annotate_and_save(image, &matches, output, &self.style)
    }

    /// Run one job. On no match or failure any stale output is removed, so
    /// the output file exists exactly when `Ok(Some(_))` is returned.
    pub fn process_one(
        &self,
        job: &ImageJob,
        query: &SearchQuery,
    ) -> Result<Option<ProcessedImage>, PipelineError> {
        match self.highlight_file(&job.input_path, query, &job.output_path) {
            Ok(true) => Ok(Some(ProcessedImage {
                filename: job.output_filename.clone(),
                path: job.output_path.clone(),
            })),
            Ok(false) => {
                remove_quietly(&job.output_path);
                Ok(None)
            }
            Err(e) => {
                remove_quietly(&job.output_path);
                Err(e)
            }
        }
    }

    /// Run every job in order and collect the matches.
    ///
    /// Every image is processed even after an earlier one matched. A failing
    /// image is logged and skipped.
    pub fn process_batch(&self, jobs: &[ImageJob], query: &SearchQuery) -> Vec<ProcessedImage> {
        info!(
            "Processing {} image(s) for \"{}\" with detector {}",
            jobs.len(),
            query,
            self.detector_name()
        );

        let mut processed = Vec::new();
        for job in jobs {
            match self.process_one(job, query) {
                Ok(Some(image)) => {
                    info!("Match in {:?} -> {}", job.input_path, image.filename);
                    processed.push(image);
                }
                Ok(None) => debug!("No match in {:?}", job.input_path),
                Err(e) => warn!("Error processing image {:?}: {}", job.input_path, e),
            }
        }

        info!("Batch complete: {}/{} image(s) matched", processed.len(), jobs.len());
        processed
    }
}
