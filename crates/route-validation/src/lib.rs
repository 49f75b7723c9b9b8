//! Route Validation - predicted vs measured latency
//!
//! Every validation appends one (predicted, actual) sample to an ordered
//! history. Aggregate statistics are recomputed from the full history on
//! request:
//!
//! | Metric | Definition |
//! |--------|------------|
//! | MAE | mean \|actual - predicted\| |
//! | RMSE | sqrt(mean (actual - predicted)²) |
//! | MAPE | mean \|actual - predicted\| / \|actual\| × 100, zero actuals skipped |
//! | r | Pearson correlation of predicted vs actual, 0 without variance |
//! | R² | 1 - SS_res / SS_tot, 0 when SS_tot = 0 |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default accuracy threshold (percentage error)
pub const DEFAULT_THRESHOLD_PCT: f64 = 10.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("No validations recorded")]
    EmptyHistory,
    #[error("Non-finite sample: predicted {predicted}, actual {actual}")]
    NonFiniteSample { predicted: f64, actual: f64 },
    #[error("Negative latency: predicted {predicted}, actual {actual}")]
    NegativeSample { predicted: f64, actual: f64 },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// One (predicted, actual) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub predicted: f64,
    pub actual: f64,
}

/// Error breakdown of a single prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub predicted: f64,
    pub actual: f64,
    pub absolute_error: f64,
    /// absolute_error / actual, 0 when actual is 0
    pub relative_error: f64,
    pub percentage_error: f64,
    pub within_threshold: bool,
}

/// Statistics over the whole history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub correlation: f64,
    pub r_squared: f64,
    pub sample_size: usize,
    /// Samples that contributed to MAPE (actual > 0)
    pub mape_samples: usize,
}

/// Accumulates predictions and their measured outcomes
#[derive(Debug, Clone)]
pub struct PredictionValidator {
    threshold_pct: f64,
    history: Vec<Sample>,
}

impl PredictionValidator {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD_PCT)
    }

    pub fn with_threshold(threshold_pct: f64) -> Self {
        Self {
            threshold_pct,
            history: Vec::new(),
        }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }

    /// Score one prediction and append it to the history
    pub fn validate(&mut self, predicted: f64, actual: f64) -> Result<ValidationRecord> {
        if !predicted.is_finite() || !actual.is_finite() {
            return Err(ValidationError::NonFiniteSample { predicted, actual });
        }
        if predicted < 0.0 || actual < 0.0 {
            return Err(ValidationError::NegativeSample { predicted, actual });
        }

        let record = self.score(predicted, actual);
        self.history.push(Sample { predicted, actual });

        debug!(
            predicted,
            actual,
            percentage_error = record.percentage_error,
            within_threshold = record.within_threshold,
            "prediction validated"
        );
        Ok(record)
    }

    fn score(&self, predicted: f64, actual: f64) -> ValidationRecord {
        let absolute_error = (actual - predicted).abs();
        let relative_error = if actual > 0.0 {
            absolute_error / actual
        } else {
            0.0
        };
        let percentage_error = relative_error * 100.0;

        ValidationRecord {
            predicted,
            actual,
            absolute_error,
            relative_error,
            percentage_error,
            within_threshold: percentage_error <= self.threshold_pct,
        }
    }

    pub fn history(&self) -> &[Sample] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Aggregate statistics over every sample so far
    pub fn aggregate(&self) -> Result<AggregateMetrics> {
        if self.history.is_empty() {
            return Err(ValidationError::EmptyHistory);
        }

        let n = self.history.len() as f64;
        let residuals = || self.history.iter().map(|s| s.actual - s.predicted);

        let mae = residuals().map(f64::abs).sum::<f64>() / n;
        let ss_res = residuals().map(|r| r * r).sum::<f64>();
        let rmse = (ss_res / n).sqrt();

        let (ape_sum, mape_samples) = self
            .history
            .iter()
            .filter(|s| s.actual > 0.0)
            .fold((0.0, 0usize), |(sum, count), s| {
                (sum + ((s.actual - s.predicted) / s.actual).abs(), count + 1)
            });
        let mape = if mape_samples > 0 {
            ape_sum / mape_samples as f64 * 100.0
        } else {
            0.0
        };

        let mean_actual = self.history.iter().map(|s| s.actual).sum::<f64>() / n;
        let ss_tot = self
            .history
            .iter()
            .map(|s| (s.actual - mean_actual).powi(2))
            .sum::<f64>();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(AggregateMetrics {
            mae,
            rmse,
            mape,
            correlation: pearson(&self.history),
            r_squared,
            sample_size: self.history.len(),
            mape_samples,
        })
    }
}

impl Default for PredictionValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Pearson correlation of predicted vs actual; 0 when either side is constant
fn pearson(samples: &[Sample]) -> f64 {
    let n = samples.len() as f64;
    let mean_p = samples.iter().map(|s| s.predicted).sum::<f64>() / n;
    let mean_a = samples.iter().map(|s| s.actual).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut sum_sq_p = 0.0;
    let mut sum_sq_a = 0.0;

    for s in samples {
        let dp = s.predicted - mean_p;
        let da = s.actual - mean_a;
        numerator += dp * da;
        sum_sq_p += dp * dp;
        sum_sq_a += da * da;
    }

    let denominator = (sum_sq_p * sum_sq_a).sqrt();
    if denominator > 0.0 {
        (numerator / denominator).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_within_threshold() {
        let mut validator = PredictionValidator::new();
        let record = validator.validate(100.0, 110.0).unwrap();

        assert_eq!(record.absolute_error, 10.0);
        assert!((record.percentage_error - 9.0909).abs() < 1e-3);
        assert!(record.within_threshold);
    }

    #[test]
    fn test_outside_threshold() {
        let mut validator = PredictionValidator::new();
        let record = validator.validate(100.0, 150.0).unwrap();

        assert_eq!(record.absolute_error, 50.0);
        assert!((record.percentage_error - 33.333).abs() < 1e-2);
        assert!(!record.within_threshold);
    }

    #[test]
    fn test_zero_actual() {
        let mut validator = PredictionValidator::new();
        let record = validator.validate(5.0, 0.0).unwrap();

        assert_eq!(record.relative_error, 0.0);
        assert_eq!(record.percentage_error, 0.0);
        assert!(record.within_threshold);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut validator = PredictionValidator::new();
        assert!(matches!(
            validator.validate(f64::NAN, 10.0),
            Err(ValidationError::NonFiniteSample { .. })
        ));
        assert!(validator.is_empty());
    }

    #[test]
    fn test_negative_latency_rejected() {
        let mut validator = PredictionValidator::new();
        assert_eq!(
            validator.validate(10.0, -4.0),
            Err(ValidationError::NegativeSample {
                predicted: 10.0,
                actual: -4.0
            })
        );
        assert!(validator.validate(-1.0, 10.0).is_err());
        assert!(validator.is_empty());

        validator.validate(90.0, 100.0).unwrap();
        let m = validator.aggregate().unwrap();
        assert_eq!(m.mape_samples, 1);
        assert!((m.mape - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history() {
        let validator = PredictionValidator::new();
        assert_eq!(validator.aggregate(), Err(ValidationError::EmptyHistory));
    }

    #[test]
    fn test_aggregate_known_values() {
        let mut validator = PredictionValidator::new();
        validator.validate(100.0, 110.0).unwrap();
        validator.validate(100.0, 150.0).unwrap();
        validator.validate(50.0, 40.0).unwrap();

        let m = validator.aggregate().unwrap();
        assert_eq!(m.sample_size, 3);
        assert_eq!(m.mape_samples, 3);
        // residuals 10, 50, -10
        assert!((m.mae - 70.0 / 3.0).abs() < 1e-9);
        assert!((m.rmse - (2700.0f64 / 3.0).sqrt()).abs() < 1e-9);
        let mape = (10.0 / 110.0 + 50.0 / 150.0 + 10.0 / 40.0) / 3.0 * 100.0;
        assert!((m.mape - mape).abs() < 1e-9);
        // actuals mean 100, SS_tot = 100 + 2500 + 3600
        assert!((m.r_squared - (1.0 - 2700.0 / 6200.0)).abs() < 1e-9);
        assert!(m.correlation > 0.0 && m.correlation <= 1.0);
    }

    #[test]
    fn test_perfect_predictions() {
        let mut validator = PredictionValidator::new();
        for v in [10.0, 20.0, 35.0, 80.0] {
            validator.validate(v, v).unwrap();
        }
        let m = validator.aggregate().unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
        assert!((m.correlation - 1.0).abs() < 1e-12);
        assert_eq!(m.r_squared, 1.0);
    }

    #[test]
    fn test_constant_actuals() {
        let mut validator = PredictionValidator::new();
        validator.validate(90.0, 100.0).unwrap();
        validator.validate(110.0, 100.0).unwrap();

        let m = validator.aggregate().unwrap();
        assert_eq!(m.r_squared, 0.0);
        assert_eq!(m.correlation, 0.0);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let mut validator = PredictionValidator::new();
        validator.validate(3.0, 0.0).unwrap();
        validator.validate(90.0, 100.0).unwrap();

        let m = validator.aggregate().unwrap();
        assert_eq!(m.sample_size, 2);
        assert_eq!(m.mape_samples, 1);
        assert!((m.mape - 10.0).abs() < 1e-9);

        let mut only_zero = PredictionValidator::new();
        only_zero.validate(3.0, 0.0).unwrap();
        assert_eq!(only_zero.aggregate().unwrap().mape, 0.0);
    }

    #[test]
    fn test_history_is_append_only() {
        let mut validator = PredictionValidator::new();
        validator.validate(1.0, 2.0).unwrap();
        validator.validate(3.0, 4.0).unwrap();
        assert_eq!(
            validator.history(),
            &[
                Sample { predicted: 1.0, actual: 2.0 },
                Sample { predicted: 3.0, actual: 4.0 },
            ]
        );
    }

    #[test]
    fn test_custom_threshold() {
        let mut validator = PredictionValidator::with_threshold(5.0);
        assert!(!validator.validate(100.0, 110.0).unwrap().within_threshold);
        assert_eq!(validator.threshold_pct(), 5.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // Fuzz: aggregate is a pure read of the history
        #[test]
        fn fuzz_aggregate_idempotent(
            samples in proptest::collection::vec((0.0f64..500.0, 0.0f64..500.0), 1..40),
        ) {
            let mut validator = PredictionValidator::new();
            for (p, a) in samples {
                validator.validate(p, a).unwrap();
            }
            let first = validator.aggregate().unwrap();
            let second = validator.aggregate().unwrap();
            prop_assert_eq!(first, second);
            prop_assert!(first.mae <= first.rmse + 1e-9);
            prop_assert!((-1.0..=1.0).contains(&first.correlation));
            prop_assert!(first.r_squared <= 1.0 + 1e-12);
        }
    }
}
