//! Temporary file naming and best-effort cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reduce an uploaded filename to `[A-Za-z0-9._-]`.
///
/// Path separators and whitespace runs become `_`, and leading/trailing
/// `.`/`_` are stripped so the result can never escape its directory.
pub fn sanitize_filename(name: &str) -> String {
    let joined = name
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Per-request file names, prefixed with a unique request id so concurrent
/// requests with the same upload names never collide.
#[derive(Debug, Clone)]
pub struct RequestFiles {
    request_id: String,
}

impl RequestFiles {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Upload names that sanitize to nothing fall back to `image`.
    fn safe_name(original: &str) -> String {
        let name = sanitize_filename(original);
        if name.is_empty() {
            "image".to_string()
        } else {
            name
        }
    }

    pub fn input_name(&self, index: usize, original: &str) -> String {
        format!("input_{}_{}_{}", self.request_id, index, Self::safe_name(original))
    }

    pub fn output_name(&self, index: usize, original: &str) -> String {
        format!("highlighted_{}_{}_{}", self.request_id, index, Self::safe_name(original))
    }
}

/// Remove a file, treating "already gone" as success.
///
/// Other failures are logged and swallowed. Returns true if this call
/// actually removed the file.
pub fn remove_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {:?}", path);
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Already removed: {:?}", path);
            false
        }
        Err(e) => {
            warn!("Failed to remove {:?}: {}", path, e);
            false
        }
    }
}

/// Remove `path` after `delay` on a background task. Fire-and-forget; the
/// handle is only useful to tests.
pub fn schedule_delayed_delete(path: PathBuf, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if remove_quietly(&path) {
            info!("Delayed deletion: removed {:?}", path);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("receipt.png"), "receipt.png");
        assert_eq!(sanitize_filename("my receipt (1).JPG"), "my_receipt_1.JPG");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan.jpeg"), "C_Users_me_scan.jpeg");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("ürün.png"), "rn.png");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn test_request_files_are_unique_per_request() {
        let a = RequestFiles::new();
        let b = RequestFiles::new();
        assert_ne!(a.input_name(0, "x.png"), b.input_name(0, "x.png"));
        assert_ne!(a.output_name(0, "x.png"), b.output_name(0, "x.png"));

        let out = a.output_name(2, "my scan.png");
        assert_eq!(out, format!("highlighted_{}_2_my_scan.png", a.request_id()));
        assert_eq!(sanitize_filename(&out), out);
    }

    #[test]
    fn test_empty_name_falls_back() {
        let files = RequestFiles::new();
        assert!(files.input_name(0, "***").ends_with("_0_image"));
    }

    #[test]
    fn test_remove_quietly_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"data").unwrap();

        assert!(remove_quietly(&path));
        assert!(!remove_quietly(&path));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_cleanup_then_delayed_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highlighted.png");
        std::fs::write(&path, b"data").unwrap();

        // post-download cleanup wins the race
        assert!(remove_quietly(&path));
        let handle = schedule_delayed_delete(path.clone(), Duration::from_millis(10));
        handle.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delayed_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unclaimed.png");
        std::fs::write(&path, b"data").unwrap();

        schedule_delayed_delete(path.clone(), Duration::from_millis(5))
            .await
            .unwrap();
        assert!(!path.exists());
        // a later immediate cleanup still tolerates the missing file
        assert!(!remove_quietly(&path));
    }
}
