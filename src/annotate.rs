//! Rectangle annotation and atomic image output.

use crate::error::PipelineError;
use crate::ocr::Detection;
use image::{DynamicImage, ImageFormat, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Outline color and stroke width for highlights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub color: Rgba<u8>,
    pub thickness: u32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0, 255, 0, 255]),
            thickness: 3,
        }
    }
}

/// Integer rectangle (inclusive edges) taken from a detection's
/// top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl HighlightBox {
    /// Coordinates are truncated toward zero, then ordered so left <= right
    /// and top <= bottom. Corners 1 and 3 are ignored.
    pub fn from_detection(detection: &Detection) -> Self {
        let tl = detection.top_left();
        let br = detection.bottom_right();
        let (x0, y0) = (tl.x as i32, tl.y as i32);
        let (x1, y1) = (br.x as i32, br.y as i32);
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }
}

/// Draw one outline per box. The stroke is centered on the box edge and
/// clipped to the image.
pub fn draw_highlights(image: &mut DynamicImage, boxes: &[HighlightBox], style: &HighlightStyle) {
    let thickness = style.thickness.max(1) as i32;
    let inner = -(thickness / 2);
    let outer = thickness - 1 + inner;

    for b in boxes {
        for offset in inner..=outer {
            let width = b.width() + 2 * offset;
            let height = b.height() + 2 * offset;
            if width <= 0 || height <= 0 {
                continue;
            }
            let rect = Rect::at(b.left - offset, b.top - offset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, style.color);
        }
    }
}

/// Draw a rectangle around every match and save the result to `output_path`.
///
/// Returns `Ok(false)` without touching the filesystem when `matches` is empty.
pub fn annotate_and_save(
    mut image: DynamicImage,
    matches: &[&Detection],
    output_path: &Path,
    style: &HighlightStyle,
) -> Result<bool, PipelineError> {
    if matches.is_empty() {
        return Ok(false);
    }

    let boxes: Vec<HighlightBox> = matches.iter().map(|d| HighlightBox::from_detection(d)).collect();
    draw_highlights(&mut image, &boxes, style);
    save_atomically(&image, output_path)?;

    debug!("Saved {} highlight(s) to {:?}", boxes.len(), output_path);
    Ok(true)
}

/// Encode `image` in the format implied by the extension of `path`, via a
/// temp file in the same directory that is renamed into place.
pub fn save_atomically(image: &DynamicImage, path: &Path) -> Result<(), PipelineError> {
    let format = ImageFormat::from_path(path).map_err(|source| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".highlight-")
        .tempfile_in(&dir)
        .map_err(|e| PipelineError::io(&dir, e))?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let encoded = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut writer, format),
            _ => image.write_to(&mut writer, format),
        };
        encoded.map_err(|source| PipelineError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}
