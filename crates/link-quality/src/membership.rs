//! Triangular membership functions sampled over a discrete universe
//!
//! Each fuzzy variable is sampled once at construction; membership of a
//! crisp input is then read off the sampled curve by linear interpolation.
//! Inputs outside the universe clamp to the boundary sample.

use crate::{QualityError, Result};
use serde::{Deserialize, Serialize};

/// Triangular membership function with feet at `a`, `c` and peak at `b`.
///
/// `a == b` or `b == c` gives a shoulder (the peak sits on the edge).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Triangle {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Degree of membership of `x` (0-1)
    pub fn degree(&self, x: f64) -> f64 {
        if x == self.b {
            return 1.0;
        }
        if self.a != self.b && self.a < x && x < self.b {
            return (x - self.a) / (self.b - self.a);
        }
        if self.b != self.c && self.b < x && x < self.c {
            return (self.c - x) / (self.c - self.b);
        }
        0.0
    }

    fn validate(&self, name: &str, universe: &Universe) -> Result<()> {
        let ordered = self.a <= self.b && self.b <= self.c;
        let finite = self.a.is_finite() && self.b.is_finite() && self.c.is_finite();
        if !ordered || !finite {
            return Err(QualityError::InvalidMembership(format!(
                "{name}: vertices must satisfy a <= b <= c, got [{}, {}, {}]",
                self.a, self.b, self.c
            )));
        }
        if self.a < universe.start || self.c > universe.end {
            return Err(QualityError::InvalidMembership(format!(
                "{name}: [{}, {}, {}] lies outside universe [{}, {}]",
                self.a, self.b, self.c, universe.start, universe.end
            )));
        }
        Ok(())
    }
}

/// Largest number of sample points a universe may have
pub const MAX_SAMPLES: usize = 100_000;

/// Discrete universe of discourse: `start..=end` sampled every `step`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Universe {
    pub const fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        let finite = self.start.is_finite() && self.end.is_finite() && self.step.is_finite();
        if !finite || self.step <= 0.0 || self.end <= self.start {
            return Err(QualityError::InvalidDomain(format!(
                "{name}: universe [{}, {}] step {} is empty",
                self.start, self.end, self.step
            )));
        }
        let count = self.sample_count();
        if count > MAX_SAMPLES {
            return Err(QualityError::InvalidDomain(format!(
                "{name}: step {} gives {} samples, at most {} allowed",
                self.step, count, MAX_SAMPLES
            )));
        }
        Ok(())
    }

    fn sample_count(&self) -> usize {
        ((self.end - self.start) / self.step).floor() as usize + 1
    }

    /// Sample points, end inclusive, truncated at [`MAX_SAMPLES`]
    pub fn samples(&self) -> Vec<f64> {
        let count = self.sample_count().min(MAX_SAMPLES);
        (0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// LOW / MEDIUM / HIGH partition of one variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub universe: Universe,
    pub low: Triangle,
    pub medium: Triangle,
    pub high: Triangle,
}

impl VariableConfig {
    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        self.universe.validate(name)?;
        self.low.validate(&format!("{name}.low"), &self.universe)?;
        self.medium.validate(&format!("{name}.medium"), &self.universe)?;
        self.high.validate(&format!("{name}.high"), &self.universe)?;
        Ok(())
    }
}

/// Membership degrees of one crisp input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Degrees {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// A variable whose three membership curves have been sampled
#[derive(Debug, Clone)]
pub(crate) struct SampledVariable {
    pub xs: Vec<f64>,
    pub low: Vec<f64>,
    pub medium: Vec<f64>,
    pub high: Vec<f64>,
}

impl SampledVariable {
    pub fn from_config(config: &VariableConfig) -> Self {
        let xs = config.universe.samples();
        let curve = |t: &Triangle| xs.iter().map(|&x| t.degree(x)).collect::<Vec<_>>();
        Self {
            low: curve(&config.low),
            medium: curve(&config.medium),
            high: curve(&config.high),
            xs,
        }
    }

    pub fn fuzzify(&self, x: f64) -> Degrees {
        Degrees {
            low: interp(&self.xs, &self.low, x),
            medium: interp(&self.xs, &self.medium, x),
            high: interp(&self.xs, &self.high, x),
        }
    }
}

/// Piecewise-linear interpolation of `ys` over ascending `xs`, clamped at both ends.
///
/// NaN has no membership anywhere.
pub(crate) fn interp(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if x.is_nan() || xs.is_empty() {
        return 0.0;
    }
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    // First sample strictly above x; guaranteed in 1..=last by the clamps above
    let hi = xs.partition_point(|&s| s <= x);
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Centroid of a sampled membership curve, integrating each segment as a trapezoid.
///
/// Returns `None` when the curve encloses no area.
pub(crate) fn centroid(xs: &[f64], mu: &[f64]) -> Option<f64> {
    let mut moment = 0.0;
    let mut area = 0.0;

    for (x, y) in xs.windows(2).zip(mu.windows(2)) {
        let (x1, x2) = (x[0], x[1]);
        let (y1, y2) = (y[0], y[1]);
        if (y1 == 0.0 && y2 == 0.0) || x1 == x2 {
            continue;
        }
        let width = x2 - x1;
        let (center, segment_area) = if y1 == y2 {
            (0.5 * (x1 + x2), width * y1)
        } else if y1 == 0.0 {
            (x1 + 2.0 / 3.0 * width, 0.5 * width * y2)
        } else if y2 == 0.0 {
            (x1 + 1.0 / 3.0 * width, 0.5 * width * y1)
        } else {
            (
                x1 + (2.0 / 3.0 * width * (y2 + 0.5 * y1)) / (y1 + y2),
                0.5 * width * (y1 + y2),
            )
        };
        moment += center * segment_area;
        area += segment_area;
    }

    if area > 0.0 {
        Some(moment / area)
    } else {
        None
    }
}
