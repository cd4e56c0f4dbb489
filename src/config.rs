//! Server configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by `main`).
//! Every variable has a default, so an empty environment yields a working
//! local setup.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_UPLOAD_DIR: &str = "tmp";
const DEFAULT_OUTPUT_DIR: &str = "Output";
const DEFAULT_DETECTION_MODEL: &str = "models/text-detection.rten";
const DEFAULT_RECOGNITION_MODEL: &str = "models/text-recognition.rten";
const DEFAULT_DELETE_DELAY_SECS: u64 = 5;
const DEFAULT_UNCLAIMED_TTL_SECS: u64 = 600;
const DEFAULT_MAX_UPLOAD_MB: usize = 100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Where uploads are saved while a request is processed.
    pub upload_dir: PathBuf,
    /// Where annotated images wait for download.
    pub output_dir: PathBuf,
    /// Base for `processedImageUrl`; derived from the Host header when unset.
    pub public_url: Option<String>,
    /// Grace period before the backup deletion after a download.
    pub delete_delay: Duration,
    /// Outputs nobody downloads are removed after this long.
    pub unclaimed_ttl: Duration,
    pub max_upload_bytes: usize,
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            public_url: None,
            delete_delay: Duration::from_secs(DEFAULT_DELETE_DELAY_SECS),
            unclaimed_ttl: Duration::from_secs(DEFAULT_UNCLAIMED_TTL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            detection_model: PathBuf::from(DEFAULT_DETECTION_MODEL),
            recognition_model: PathBuf::from(DEFAULT_RECOGNITION_MODEL),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = parse_or(get("HIGHLIGHTER_BIND"), "HIGHLIGHTER_BIND", DEFAULT_BIND)?;
        let delete_delay_secs: u64 = parse_or(
            get("HIGHLIGHTER_DELETE_DELAY_SECS"),
            "HIGHLIGHTER_DELETE_DELAY_SECS",
            DEFAULT_DELETE_DELAY_SECS,
        )?;
        let unclaimed_ttl_secs: u64 = parse_or(
            get("HIGHLIGHTER_UNCLAIMED_TTL_SECS"),
            "HIGHLIGHTER_UNCLAIMED_TTL_SECS",
            DEFAULT_UNCLAIMED_TTL_SECS,
        )?;
        let max_upload_mb: usize = parse_or(
            get("HIGHLIGHTER_MAX_UPLOAD_MB"),
            "HIGHLIGHTER_MAX_UPLOAD_MB",
            DEFAULT_MAX_UPLOAD_MB,
        )?;

        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .with_context(|| {
                format!("Invalid value for HIGHLIGHTER_MAX_UPLOAD_MB: {} is too large", max_upload_mb)
            })?;

        Ok(Self {
            bind,
            upload_dir: get("HIGHLIGHTER_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            output_dir: get("HIGHLIGHTER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            public_url: get("HIGHLIGHTER_PUBLIC_URL").map(|u| u.trim_end_matches('/').to_string()),
            delete_delay: Duration::from_secs(delete_delay_secs),
            unclaimed_ttl: Duration::from_secs(unclaimed_ttl_secs),
            max_upload_bytes,
            detection_model: get("OCRS_DETECTION_MODEL")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTION_MODEL)),
            recognition_model: get("OCRS_RECOGNITION_MODEL")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECOGNITION_MODEL)),
        })
    }

    /// Create the upload and output directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
            .with_context(|| format!("Failed to create upload dir: {:?}", self.upload_dir))?;
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output dir: {:?}", self.output_dir))?;
        Ok(())
    }
}

fn parse_or<T, D>(value: Option<String>, key: &str, default: D) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    D: ToString,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        let default = ServerConfig::default();
        assert_eq!(config.bind, default.bind);
        assert_eq!(config.upload_dir, PathBuf::from("tmp"));
        assert_eq!(config.output_dir, PathBuf::from("Output"));
        assert_eq!(config.delete_delay, Duration::from_secs(5));
        assert_eq!(config.unclaimed_ttl, Duration::from_secs(600));
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert!(config.public_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HIGHLIGHTER_BIND", "127.0.0.1:8080"),
            ("HIGHLIGHTER_OUTPUT_DIR", "/var/highlights"),
            ("HIGHLIGHTER_PUBLIC_URL", "https://example.com/"),
            ("HIGHLIGHTER_DELETE_DELAY_SECS", "2"),
            ("OCRS_DETECTION_MODEL", "/models/det.rten"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.output_dir, PathBuf::from("/var/highlights"));
        assert_eq!(config.public_url.as_deref(), Some("https://example.com"));
        assert_eq!(config.delete_delay, Duration::from_secs(2));
        assert_eq!(config.detection_model, PathBuf::from("/models/det.rten"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("HIGHLIGHTER_UPLOAD_DIR", "  ")])).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("tmp"));
    }

    #[test]
    fn test_oversized_upload_limit_rejected() {
        let huge = usize::MAX.to_string();
        let err = ServerConfig::from_lookup(lookup(&[("HIGHLIGHTER_MAX_UPLOAD_MB", huge.as_str())]))
            .unwrap_err();
        assert!(err.to_string().contains("HIGHLIGHTER_MAX_UPLOAD_MB"));
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("HIGHLIGHTER_DELETE_DELAY_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("HIGHLIGHTER_DELETE_DELAY_SECS"));
    }
}
