//! Decompress → parse → aggregate → classify for a single session file.

use tracing::debug;

use crate::decompress::decompress;
use crate::error::Result;
use crate::parser::parse_samples;
use crate::readiness::ReadinessThresholds;
use crate::stats::SessionStats;
use crate::types::SessionSummary;

/// Runs the scoring stages over one compressed payload.
///
/// Stages run strictly in order and the first failure is returned as-is, so
/// no summary is ever built from a partial run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPipeline {
    thresholds: ReadinessThresholds,
}

impl SessionPipeline {
    pub fn new(thresholds: ReadinessThresholds) -> Self {
        Self { thresholds }
    }

    #[tracing::instrument(
        name = "session_pipeline",
        skip_all,
        fields(compressed_bytes = compressed.len())
    )]
    pub fn run(&self, compressed: &[u8]) -> Result<SessionSummary> {
        let text = decompress(compressed)?;
        debug!(decompressed_bytes = text.len(), "Decompressed");

        let samples = parse_samples(&text)?;
        debug!(samples = samples.len(), "Parsed");

        let stats = SessionStats::from_samples(&samples)?;
        debug!(average = stats.average, min = stats.min, max = stats.max, "Aggregated");

        let readiness = self.thresholds.classify(stats.average);
        debug!(%readiness, "Classified");

        Ok(SessionSummary {
            sample_count: stats.count,
            average_value: stats.average,
            min_value: stats.min,
            max_value: stats.max,
            readiness,
        })
    }
}
