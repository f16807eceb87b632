//! Rule-based certainty scoring over relativized features.
//!
//! Certainty is proxied by straighter, faster paths with less hovering and
//! fewer switches of focus than the population. The score is the number of
//! matched certainty rules minus the number of matched uncertainty rules.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;

use crate::stats::RelativizedFeatureSet;

/// Predicates that count toward certainty when they hold.
pub const CERTAIN_WHEN_TRUE: &[&str] = &[
    "averageDivergence_below_1sd",
    "averageSpeed_above_avg",
    "averageSpeed_above_1sd",
    "cumulativeDivergence_below_1sd",
    "lateSpeed_above_avg",
    "lateSpeed_above_1sd",
    "maxDivergence_below_1sd",
    "numBackAndForth_below_1sd",
    "pathCrossing_below_1sd",
    "quadMaxDistance_below_1sd",
    "quadTotalDistance1_below_1sd",
    "quadTotalDistance2_below_1sd",
    "quadTotalDistance3_below_1sd",
    "quadTotalDistance4_below_1sd",
    "totalDistance_below_1sd",
    "variance_below_1sd",
];

/// Negative indicators. Each counts toward certainty when absent and toward
/// uncertainty when present.
pub const NEGATIVE_INDICATORS: &[&str] = &[
    "averageDivergence_above_avg",
    "cumulativeDivergence_above_avg",
    "maxDivergence_above_avg",
    "numBackAndForth_above_avg",
    "numHover_above_avg",
    "otherHover",
    "upperHover",
    "otherQuadLate",
    "pathCrossing_above_avg",
    "quadMaxDistance_above_avg",
    "quadTotalDistance1_above_avg",
    "quadTotalDistance2_above_avg",
    "quadTotalDistance3_above_avg",
    "quadTotalDistance4_above_avg",
    "targetHover",
    "totalDistance_above_avg",
    "variance_above_avg",
];

/// Predicates that count toward uncertainty when they hold, in addition to
/// [`NEGATIVE_INDICATORS`].
pub const UNCERTAIN_WHEN_TRUE: &[&str] = &[
    "averageDivergence_above_1sd",
    "averageSpeed_below_1sd",
    "cumulativeDivergence_above_1sd",
    "lateSpeed_below_1sd",
    "maxDivergence_above_1sd",
    "numBackAndForth_above_1sd",
    "pathCrossing_above_1sd",
    "quadMaxDistance_above_1sd",
    "quadTotalDistance1_above_1sd",
    "quadTotalDistance2_above_1sd",
    "quadTotalDistance3_above_1sd",
    "quadTotalDistance4_above_1sd",
    "totalDistance_above_1sd",
    "variance_above_1sd",
];

/// Predicates that count toward uncertainty when they do not hold.
pub const UNCERTAIN_WHEN_FALSE: &[&str] = &["averageSpeed_above_avg", "lateSpeed_above_avg"];

/// Signed certainty; positive leans certain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertaintyScore(pub i64);

impl CertaintyScore {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CertaintyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CertaintyModel;

impl CertaintyModel {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, relative: &RelativizedFeatureSet) -> Result<CertaintyScore, ModelError> {
        if relative.is_empty() {
            return Err(ModelError::NotRelativized);
        }

        let holding = |labels: &[&str]| labels.iter().filter(|l| relative.holds(l)).count() as i64;
        let missing = |labels: &[&str]| labels.len() as i64 - holding(labels);

        let certain = holding(CERTAIN_WHEN_TRUE) + missing(NEGATIVE_INDICATORS);
        let uncertain = holding(UNCERTAIN_WHEN_TRUE)
            + holding(NEGATIVE_INDICATORS)
            + missing(UNCERTAIN_WHEN_FALSE);

        Ok(CertaintyScore(certain - uncertain))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Path features must be relativized before scoring")]
    NotRelativized,
}

/// Maps raw scores onto tenths within two standard deviations of the
/// population mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertaintyDeciles {
    pub mean: f64,
    pub std_dev: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl CertaintyDeciles {
    /// `None` for an empty population. A single score has zero spread.
    pub fn from_scores(scores: &[CertaintyScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let values: Vec<f64> = scores.iter().map(|s| s.0 as f64).collect();
        let mean = values.iter().mean();
        let std_dev = if values.len() > 1 { values.iter().std_dev() } else { 0.0 };

        Some(Self {
            mean,
            std_dev,
            floor: mean - 2.0 * std_dev,
            ceiling: mean + 2.0 * std_dev,
        })
    }

    /// Tenths of the clamped range needed to reach `score`, in `0.0..=1.0`.
    pub fn decile(&self, score: CertaintyScore) -> f64 {
        let clamped = (score.0 as f64).clamp(self.floor, self.ceiling);
        let step = (self.ceiling - self.floor) / 10.0;

        let mut tenths = 0u8;
        let mut tracker = self.floor;
        while clamped > tracker && tenths < 10 {
            tenths += 1;
            tracker += step;
        }

        f64::from(tenths) / 10.0
    }
}
