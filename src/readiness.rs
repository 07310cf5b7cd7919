//! Mapping of a session's average HRV to a readiness class.

use crate::types::ReadinessClass;

/// Lowest average HRV that counts as green.
pub const GREEN_THRESHOLD: f64 = 50.0;
/// Lowest average HRV that counts as yellow.
pub const YELLOW_THRESHOLD: f64 = 35.0;

/// Cut-off points between readiness classes.
///
/// | Average         | Class  |
/// |-----------------|--------|
/// | >= green_min    | green  |
/// | >= yellow_min   | yellow |
/// | otherwise       | red    |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessThresholds {
    pub green_min: f64,
    pub yellow_min: f64,
}

impl Default for ReadinessThresholds {
    fn default() -> Self {
        Self {
            green_min: GREEN_THRESHOLD,
            yellow_min: YELLOW_THRESHOLD,
        }
    }
}

impl ReadinessThresholds {
    pub fn new(green_min: f64, yellow_min: f64) -> anyhow::Result<Self> {
        if !green_min.is_finite() || !yellow_min.is_finite() {
            anyhow::bail!("readiness thresholds must be finite");
        }
        if yellow_min >= green_min {
            anyhow::bail!(
                "yellow threshold ({yellow_min}) must be below green threshold ({green_min})"
            );
        }
        Ok(Self {
            green_min,
            yellow_min,
        })
    }

    pub fn classify(&self, average: f64) -> ReadinessClass {
        match average {
            a if a >= self.green_min => ReadinessClass::Green,
            a if a >= self.yellow_min => ReadinessClass::Yellow,
            _ => ReadinessClass::Red,
        }
    }
}

/// Classifies with the default thresholds.
pub fn classify(average: f64) -> ReadinessClass {
    ReadinessThresholds::default().classify(average)
}
