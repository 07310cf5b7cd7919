//! Runtime configuration for the ingest pipeline.
//!
//! Read from an optional JSON file; every field has a default, so an empty
//! object (or no file at all) yields the stock behaviour:
//! ```json
//! {
//!   "max_upload_bytes": 10485760,
//!   "accepted_suffixes": [".gzip", ".gz"],
//!   "accepted_content_types": ["application/gzip", "application/x-gzip"],
//!   "green_threshold": 50.0,
//!   "yellow_threshold": 35.0,
//!   "batch_concurrency": 4,
//!   "upload_dir": "uploads",
//!   "temp_prefix": "hrv"
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::readiness::{GREEN_THRESHOLD, ReadinessThresholds, YELLOW_THRESHOLD};

/// Ceiling on a single payload, checked before decompression.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
    pub accepted_suffixes: Vec<String>,
    pub accepted_content_types: Vec<String>,
    pub green_threshold: f64,
    pub yellow_threshold: f64,
    pub batch_concurrency: usize,
    /// Directory for temporary payload files; payloads stay in memory when unset.
    pub upload_dir: Option<PathBuf>,
    pub temp_prefix: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_suffixes: vec![".gzip".to_string(), ".gz".to_string()],
            accepted_content_types: vec![
                "application/gzip".to_string(),
                "application/x-gzip".to_string(),
            ],
            green_threshold: GREEN_THRESHOLD,
            yellow_threshold: YELLOW_THRESHOLD,
            batch_concurrency: 4,
            upload_dir: None,
            temp_prefix: "hrv".to_string(),
        }
    }
}

impl IngestConfig {
    /// Loads and validates the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: IngestConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds()?;
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be positive");
        }
        if self.batch_concurrency == 0 {
            anyhow::bail!("batch_concurrency must be at least 1");
        }
        if self.accepted_suffixes.iter().any(|s| s.is_empty()) {
            anyhow::bail!("accepted_suffixes must not contain empty entries");
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Result<ReadinessThresholds> {
        ReadinessThresholds::new(self.green_threshold, self.yellow_threshold)
    }

    /// Case-insensitive suffix check against `accepted_suffixes`.
    pub fn accepts_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.accepted_suffixes
            .iter()
            .any(|s| name.ends_with(&s.to_ascii_lowercase()))
    }

    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        // ignore parameters such as `; charset=binary`
        let essence = content_type.split(';').next().unwrap_or("").trim();
        self.accepted_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }
}
