//! Case-insensitive substring matching over OCR detections.

use crate::error::ValidationError;
use crate::ocr::Detection;

/// A trimmed, non-blank search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    needle: String,
}

impl SearchQuery {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ValidationError::BlankQuery);
        }
        Ok(Self {
            text: text.to_string(),
            needle: text.to_lowercase(),
        })
    }

    /// The query as the user typed it (trimmed).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.needle)
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep detections whose text contains the query, in detector order.
pub fn filter_matches<'a>(detections: &'a [Detection], query: &SearchQuery) -> Vec<&'a Detection> {
    detections.iter().filter(|d| query.matches(&d.text)).collect()
}
