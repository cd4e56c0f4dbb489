//! Directory scan: search a folder of images and stop at the first match.

use crate::matcher::SearchQuery;
use crate::pipeline::Highlighter;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Number of images examined before stopping.
    pub scanned: usize,
    pub total: usize,
    /// Source image and highlighted output of the first match.
    pub matched: Option<(PathBuf, PathBuf)>,
}

/// List `.jpg`, `.jpeg` and `.png` files (any case) in `dir`, sorted by path.
pub fn find_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))? {
        let path = entry?.path();
        let is_image = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
        if is_image {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Process `images` in order until one contains `query`.
///
/// Output goes to `output_dir/highlighted_<name>`. Images that fail are
/// logged and skipped.
pub fn scan_images(
    highlighter: &Highlighter,
    images: &[PathBuf],
    query: &SearchQuery,
    output_dir: &Path,
) -> ScanOutcome {
    let total = images.len();
    for (idx, image) in images.iter().enumerate() {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("[{}/{}] Processing: {}", idx + 1, total, name);

        let output = output_dir.join(format!("highlighted_{}", name));
        match highlighter.highlight_file(image, query, &output) {
            Ok(true) => {
                info!("Text found in {}, saved to {:?}", name, output);
                return ScanOutcome {
                    scanned: idx + 1,
                    total,
                    matched: Some((image.clone(), output)),
                };
            }
            Ok(false) => info!("Text not found in {}", name),
            Err(e) => warn!("Error processing image {}: {}", name, e),
        }
    }

    ScanOutcome {
        scanned: total,
        total,
        matched: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::WidthKeyedDetector;
    use crate::ocr::Detection;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, 20, Rgb([255, 255, 255]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_find_images_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "b.PNG", 10);
        write_png(dir.path(), "a.jpeg", 10);
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = find_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpeg", "b.PNG"]);
    }

    #[test]
    fn test_find_images_missing_dir() {
        assert!(find_images(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn test_scan_stops_at_first_match() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("Output");
        let images = vec![
            write_png(dir.path(), "1.png", 30),
            write_png(dir.path(), "2.png", 40),
            write_png(dir.path(), "3.png", 40),
        ];
        let detector = WidthKeyedDetector {
            by_width: vec![(40, vec![Detection::from_box(2.0, 2.0, 20.0, 10.0, "Total Due", 0.9)])],
        };
        let highlighter = Highlighter::new(Arc::new(detector));

        let query = SearchQuery::new("due").unwrap();
        let outcome = scan_images(&highlighter, &images, &query, &out);
        assert_eq!(outcome.scanned, 2);
        assert_eq!(outcome.total, 3);
        assert_eq!(
            outcome.matched,
            Some((images[1].clone(), out.join("highlighted_2.png")))
        );
        assert!(out.join("highlighted_2.png").exists());
        assert!(!out.join("highlighted_3.png").exists());
    }

    #[test]
    fn test_scan_without_match() {
        let dir = TempDir::new().unwrap();
        let images = vec![write_png(dir.path(), "1.png", 30)];
        let highlighter = Highlighter::new(Arc::new(WidthKeyedDetector { by_width: vec![] }));

        let query = SearchQuery::new("due").unwrap();
        let outcome = scan_images(&highlighter, &images, &query, &dir.path().join("Output"));
        assert_eq!(outcome.matched, None);
        assert_eq!(outcome.scanned, 1);
    }
}
