//! Reduction of parsed readings to session statistics.

use crate::error::{IngestError, Result};
use crate::types::ParsedSample;

/// Count, average and range of one session's readings.
///
/// All values are rounded to two decimal places with [`round2`]. Only
/// [`SessionStats::from_samples`] builds one, and it refuses empty input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl SessionStats {
    pub fn from_samples(samples: &[ParsedSample]) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(IngestError::EmptyDataset);
        };

        let mut min = first.value;
        let mut max = first.value;
        let mut sum = 0.0;

        for s in samples {
            sum += s.value;
            if s.value < min {
                min = s.value;
            }
            if s.value > max {
                max = s.value;
            }
        }

        let count = samples.len();
        let mut mean = sum / count as f64;
        if !mean.is_finite() {
            // the sum overflowed; dividing first keeps every term within range
            mean = samples.iter().map(|s| s.value / count as f64).sum();
        }

        let min = round2(min);
        let max = round2(max);
        // the mean can land an ulp outside the range
        let average = round2(mean).clamp(min, max);

        Ok(SessionStats {
            count,
            average,
            min,
            max,
        })
    }
}

/// Magnitude above which an f64 has no hundredths left to round.
const ROUNDING_LIMIT: f64 = 1e15;

/// Rounds to two decimal places, ties to even.
///
/// Values at or above [`ROUNDING_LIMIT`] in magnitude are returned unchanged,
/// which also keeps huge readings from overflowing when scaled.
pub fn round2(value: f64) -> f64 {
    if value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[f64]) -> Vec<ParsedSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ParsedSample {
                line: i as u64 + 1,
                value,
            })
            .collect()
    }

    #[test]
    fn test_three_readings() {
        let stats = SessionStats::from_samples(&samples(&[60.0, 40.0, 30.0])).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 43.33);
        assert_eq!(stats.min, 30.0);
        assert_eq!(stats.max, 60.0);
    }

    #[test]
    fn test_single_reading() {
        let stats = SessionStats::from_samples(&samples(&[47.126])).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min, stats.max);
        assert_eq!(stats.average, stats.min);
        assert_eq!(stats.average, 47.13);
    }

    #[test]
    fn test_negative_and_duplicate_values() {
        let stats = SessionStats::from_samples(&samples(&[-5.0, -5.0, 5.0, 5.0])).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.min, -5.0);
        assert_eq!(stats.max, 5.0);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let err = SessionStats::from_samples(&[]).unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset));
    }

    #[test]
    fn test_average_stays_within_range() {
        let inputs: Vec<Vec<f64>> = vec![
            vec![0.1, 0.1, 0.1],
            vec![33.333, 33.333, 33.333, 33.333, 33.333, 33.333, 33.333],
            vec![1e-3, 2e-3, 3e-3],
            vec![99.995, 99.995],
            vec![12.0, 88.0, 51.5, 50.0, 49.99],
        ];
        for values in inputs {
            let stats = SessionStats::from_samples(&samples(&values)).unwrap();
            assert_eq!(stats.count, values.len());
            assert!(stats.min <= stats.average, "{stats:?}");
            assert!(stats.average <= stats.max, "{stats:?}");
        }
    }

    #[test]
    fn test_huge_single_reading_stays_finite() {
        let stats = SessionStats::from_samples(&samples(&[1e307])).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.average, 1e307);
        assert_eq!(stats.min, 1e307);
        assert_eq!(stats.max, 1e307);
    }

    #[test]
    fn test_overflowing_sum_stays_finite() {
        let stats = SessionStats::from_samples(&samples(&[1e308, 1e308])).unwrap();
        assert!(stats.average.is_finite());
        assert_eq!(stats.average, 1e308);
        assert_eq!(stats.min, 1e308);
        assert_eq!(stats.max, 1e308);

        let stats = SessionStats::from_samples(&samples(&[1.7e308, 1.7e308, -1.0])).unwrap();
        assert!(stats.average.is_finite());
        assert!(stats.min <= stats.average && stats.average <= stats.max);
    }

    #[test]
    fn test_round2_large_values_unchanged() {
        assert_eq!(round2(1e307), 1e307);
        assert_eq!(round2(-1e308), -1e308);
        assert_eq!(round2(f64::MAX), f64::MAX);
        assert_eq!(round2(1e300), 1e300);
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(43.3333), 43.33);
        assert_eq!(round2(-2.5), -2.5);
        assert_eq!(round2(50.0), 50.0);
    }
}
