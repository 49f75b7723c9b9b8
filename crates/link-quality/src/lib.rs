//! Link Quality - fuzzy scoring of server-to-server links
//!
//! Converts raw link metrics into a single edge weight for shortest-path
//! routing. Three input variables are fuzzified into LOW/MEDIUM/HIGH:
//!
//! | Variable | Universe | LOW | MEDIUM | HIGH |
//! |----------|----------|-----|--------|------|
//! | Latency (ms) | 0-200 | [0,0,100] | [50,100,150] | [100,200,200] |
//! | Availability (%) | 0-100 | [0,0,95] | [90,95,99] | [95,100,100] |
//! | Packet loss (%) | 0-10 | [0,0,2] | [1,3,5] | [3,10,10] |
//!
//! Mamdani rules (min for AND, max for OR):
//!
//! ```text
//! Excellent = min(latency LOW,    availability HIGH,   loss LOW)
//! Good      = min(latency MEDIUM, availability MEDIUM, loss LOW)
//! Poor      = max(latency HIGH,   availability LOW,    loss HIGH)
//! ```
//!
//! Each firing strength clips its output triangle over the 0-10 quality
//! universe (Poor [0,3,6], Good [4,7,10], Excellent [7,10,10]); the clipped
//! sets are unioned and defuzzified by centroid. The edge weight is
//! `max(1, 11 - quality)`, so better links are cheaper.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

pub mod membership;

pub use membership::{Degrees, Triangle, Universe, VariableConfig, MAX_SAMPLES};
use membership::{centroid, SampledVariable};

/// Weights are `WEIGHT_CEILING - quality`, floored at `MIN_WEIGHT`
pub const WEIGHT_CEILING: f64 = 11.0;

/// Lower bound of every edge weight
pub const MIN_WEIGHT: f64 = 1.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityError {
    #[error("Invalid membership function: {0}")]
    InvalidMembership(String),
    #[error("Invalid universe: {0}")]
    InvalidDomain(String),
}

pub type Result<T> = std::result::Result<T, QualityError>;

/// Membership-function configuration, built once per evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub latency: VariableConfig,
    pub availability: VariableConfig,
    pub packet_loss: VariableConfig,
    /// Output variable: low = Poor, medium = Good, high = Excellent
    pub quality: VariableConfig,
    /// Quality reported when no rule fires (zero-area output)
    pub fallback_quality: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            latency: VariableConfig {
                universe: Universe::new(0.0, 200.0, 1.0),
                low: Triangle::new(0.0, 0.0, 100.0),
                medium: Triangle::new(50.0, 100.0, 150.0),
                high: Triangle::new(100.0, 200.0, 200.0),
            },
            availability: VariableConfig {
                universe: Universe::new(0.0, 100.0, 1.0),
                low: Triangle::new(0.0, 0.0, 95.0),
                medium: Triangle::new(90.0, 95.0, 99.0),
                high: Triangle::new(95.0, 100.0, 100.0),
            },
            packet_loss: VariableConfig {
                universe: Universe::new(0.0, 10.0, 1.0),
                low: Triangle::new(0.0, 0.0, 2.0),
                medium: Triangle::new(1.0, 3.0, 5.0),
                high: Triangle::new(3.0, 10.0, 10.0),
            },
            quality: VariableConfig {
                universe: Universe::new(0.0, 10.0, 1.0),
                low: Triangle::new(0.0, 3.0, 6.0),
                medium: Triangle::new(4.0, 7.0, 10.0),
                high: Triangle::new(7.0, 10.0, 10.0),
            },
            fallback_quality: 5.0,
        }
    }
}

impl FuzzyConfig {
    pub fn validate(&self) -> Result<()> {
        self.latency.validate("latency")?;
        self.availability.validate("availability")?;
        self.packet_loss.validate("packet_loss")?;
        self.quality.validate("quality")?;

        let q = &self.quality.universe;
        if !(q.start..=q.end).contains(&self.fallback_quality) {
            return Err(QualityError::InvalidDomain(format!(
                "fallback quality {} outside [{}, {}]",
                self.fallback_quality, q.start, q.end
            )));
        }
        Ok(())
    }
}

/// Rule firing strengths (0-1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleStrengths {
    pub excellent: f64,
    pub good: f64,
    pub poor: f64,
}

/// Full result of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub latency: Degrees,
    pub availability: Degrees,
    pub packet_loss: Degrees,
    pub rules: RuleStrengths,
    /// Defuzzified quality (0-10, higher = better)
    pub quality_score: f64,
    /// Edge weight for routing (>= 1, lower = better)
    pub weight: f64,
}

/// Fuzzy link quality evaluator
///
/// Membership tables are read-only after construction, so a single
/// evaluator can be shared across threads.
#[derive(Debug, Clone)]
pub struct FuzzyQualityEvaluator {
    latency: SampledVariable,
    availability: SampledVariable,
    packet_loss: SampledVariable,
    quality: SampledVariable,
    fallback_quality: f64,
}

impl FuzzyQualityEvaluator {
    pub fn new() -> Self {
        Self::sample(&FuzzyConfig::default())
    }

    pub fn with_config(config: FuzzyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::sample(&config))
    }

    fn sample(config: &FuzzyConfig) -> Self {
        Self {
            latency: SampledVariable::from_config(&config.latency),
            availability: SampledVariable::from_config(&config.availability),
            packet_loss: SampledVariable::from_config(&config.packet_loss),
            quality: SampledVariable::from_config(&config.quality),
            fallback_quality: config.fallback_quality,
        }
    }

    /// Edge weight for a link (>= 1)
    pub fn evaluate(&self, latency_ms: f64, availability_pct: f64, packet_loss_pct: f64) -> f64 {
        self.assess(latency_ms, availability_pct, packet_loss_pct).weight
    }

    /// Evaluate a link and keep the intermediate fuzzy values
    pub fn assess(
        &self,
        latency_ms: f64,
        availability_pct: f64,
        packet_loss_pct: f64,
    ) -> QualityAssessment {
        let latency = self.latency.fuzzify(latency_ms);
        let availability = self.availability.fuzzify(availability_pct);
        let packet_loss = self.packet_loss.fuzzify(packet_loss_pct);

        let rules = RuleStrengths {
            excellent: latency.low.min(availability.high).min(packet_loss.low),
            good: latency.medium.min(availability.medium).min(packet_loss.low),
            poor: latency.high.max(availability.low).max(packet_loss.high),
        };

        // Clip each output set by its rule, union with max
        let aggregated: Vec<f64> = (0..self.quality.xs.len())
            .map(|i| {
                let excellent = rules.excellent.min(self.quality.high[i]);
                let good = rules.good.min(self.quality.medium[i]);
                let poor = rules.poor.min(self.quality.low[i]);
                excellent.max(good).max(poor)
            })
            .collect();

        let quality_score = centroid(&self.quality.xs, &aggregated).unwrap_or_else(|| {
            trace!(
                latency_ms,
                availability_pct,
                packet_loss_pct,
                "no rule fired, using fallback quality"
            );
            self.fallback_quality
        });

        QualityAssessment {
            latency,
            availability,
            packet_loss,
            rules,
            quality_score,
            weight: quality_to_weight(quality_score),
        }
    }
}

impl Default for FuzzyQualityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a quality score to a routing weight (>= 1)
#[inline]
pub fn quality_to_weight(quality_score: f64) -> f64 {
    (WEIGHT_CEILING - quality_score).max(MIN_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_excellent_link_is_cheap() {
        let evaluator = FuzzyQualityEvaluator::new();
        let weight = evaluator.evaluate(20.0, 99.9, 0.1);
        assert!((1.0..=3.0).contains(&weight), "weight {weight}");
    }

    #[test]
    fn test_poor_link_is_expensive() {
        let evaluator = FuzzyQualityEvaluator::new();
        let assessment = evaluator.assess(150.0, 90.0, 4.0);
        assert!((assessment.rules.poor - 0.5).abs() < 1e-12);
        assert_eq!(assessment.rules.excellent, 0.0);
        assert_eq!(assessment.rules.good, 0.0);
        assert!((assessment.quality_score - 3.0).abs() < 1e-9);
        assert!(assessment.weight > 8.0 - 1e-9 && assessment.weight <= 10.0);
    }

    #[test]
    fn test_perfect_link() {
        let evaluator = FuzzyQualityEvaluator::new();
        let assessment = evaluator.assess(0.0, 100.0, 0.0);
        assert_eq!(assessment.rules.excellent, 1.0);
        assert!((assessment.quality_score - 9.0).abs() < 1e-9);
        assert!((assessment.weight - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_rule_fired_uses_fallback() {
        let evaluator = FuzzyQualityEvaluator::new();
        // 100ms is neither LOW nor HIGH; availability 100% is not MEDIUM
        let assessment = evaluator.assess(100.0, 100.0, 0.0);
        assert_eq!(assessment.rules, RuleStrengths::default());
        assert_eq!(assessment.quality_score, 5.0);
        assert_eq!(assessment.weight, 6.0);
    }

    #[test]
    fn test_out_of_domain_inputs_clamp() {
        let evaluator = FuzzyQualityEvaluator::new();
        assert_eq!(
            evaluator.evaluate(500.0, 90.0, 4.0),
            evaluator.evaluate(200.0, 90.0, 4.0)
        );
        assert_eq!(
            evaluator.evaluate(-10.0, 150.0, -1.0),
            evaluator.evaluate(0.0, 100.0, 0.0)
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = FuzzyConfig::default();
        assert!(FuzzyQualityEvaluator::with_config(config.clone()).is_ok());

        config.latency.medium = Triangle::new(150.0, 100.0, 50.0);
        assert!(matches!(
            FuzzyQualityEvaluator::with_config(config.clone()),
            Err(QualityError::InvalidMembership(_))
        ));

        let mut config = FuzzyConfig::default();
        config.packet_loss.universe = Universe::new(0.0, 10.0, 0.0);
        assert!(matches!(
            config.validate(),
            Err(QualityError::InvalidDomain(_))
        ));

        let mut config = FuzzyConfig::default();
        config.fallback_quality = 42.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversampled_universe_rejected() {
        let json = r#"{"start": 0.0, "end": 200.0, "step": 1e-12}"#;
        let mut config = FuzzyConfig::default();
        config.latency.universe = serde_json::from_str(json).unwrap();
        assert!(matches!(
            FuzzyQualityEvaluator::with_config(config),
            Err(QualityError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = FuzzyConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: FuzzyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Fuzz: weight floor holds inside and outside the declared universes
        #[test]
        fn fuzz_weight_bounds(
            latency in -1000.0f64..1000.0,
            availability in -50.0f64..200.0,
            loss in -20.0f64..50.0,
        ) {
            let weight = FuzzyQualityEvaluator::new().evaluate(latency, availability, loss);
            prop_assert!(weight >= MIN_WEIGHT, "weight {} below floor", weight);
            prop_assert!(weight <= WEIGHT_CEILING, "weight {} above ceiling", weight);
        }

        // Fuzz: more latency never makes a highly available link cheaper
        #[test]
        fn fuzz_latency_monotonic_high_availability(
            a in -10.0f64..300.0,
            b in -10.0f64..300.0,
            availability in 97.0f64..=100.0,
            loss in 0.0f64..=10.0,
        ) {
            let evaluator = FuzzyQualityEvaluator::new();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let w_lo = evaluator.evaluate(lo, availability, loss);
            let w_hi = evaluator.evaluate(hi, availability, loss);
            prop_assert!(w_lo <= w_hi + 1e-9, "w({})={} > w({})={}", lo, w_lo, hi, w_hi);
        }

        // Fuzz: same for poorly available links
        #[test]
        fn fuzz_latency_monotonic_low_availability(
            a in -10.0f64..300.0,
            b in -10.0f64..300.0,
            availability in 0.0f64..=90.0,
            loss in 0.0f64..=10.0,
        ) {
            let evaluator = FuzzyQualityEvaluator::new();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let w_lo = evaluator.evaluate(lo, availability, loss);
            let w_hi = evaluator.evaluate(hi, availability, loss);
            prop_assert!(w_lo <= w_hi + 1e-9, "w({})={} > w({})={}", lo, w_lo, hi, w_hi);
        }
    }
}
