//! Population statistics and relativization.
//!
//! [`PopulationStats`] accumulates every feature set of a population and
//! turns a single feature set into boolean predicates relative to that
//! population. It is a two-state machine: any [`PopulationStats::add`] moves
//! it to [`StatsState::Collecting`] and [`PopulationStats::prepare`] derives
//! the series aggregates and moves it to [`StatsState::Prepared`].
//! Relativization is only answered from `Prepared`.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use crate::features::{FeatureKind, FeatureSet, FeatureValue};

pub const PREDOMINANT_SUFFIX: &str = "_predominant";

/// Aggregate readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsState {
    Collecting,
    Prepared,
}

/// Derived aggregates of one series label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub mean: f64,
    /// Sample variance, `n - 1` denominator.
    pub variance: f64,
    pub std_dev: f64,
    /// Sample standard deviation of the per-observation squared deviations.
    pub deviation_std_dev: f64,
}

impl SeriesSummary {
    /// `None` for fewer than two observations.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }

        let mean = values.mean();
        let variance = values.variance();
        let squared: Vec<f64> = values.iter().map(|v| (mean - v) * (mean - v)).collect();

        Some(Self {
            mean,
            variance,
            std_dev: variance.sqrt(),
            deviation_std_dev: squared.std_dev(),
        })
    }

    /// The ten threshold predicates for `value`, as `(suffix, holds)`.
    pub fn thresholds(&self, value: f64) -> [(&'static str, bool); 10] {
        let Self {
            mean,
            variance,
            std_dev: sd,
            deviation_std_dev: vsd,
        } = *self;

        [
            ("_above_avg", value > mean),
            ("_above_1sd", value > mean + sd),
            ("_above_2sd", value > mean + 2.0 * sd),
            ("_below_1sd", value < mean - sd),
            ("_below_2sd", value < mean - 2.0 * sd),
            ("_above_var", value > variance),
            ("_above_var_1sd", value > variance + vsd),
            ("_above_var_2sd", value > variance + 2.0 * vsd),
            ("_below_var_1sd", value < variance - vsd),
            ("_below_var_2sd", value < variance - 2.0 * vsd),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LabelStats {
    Bool {
        true_count: u64,
        false_count: u64,
    },
    Series {
        values: Vec<f64>,
        summary: Option<SeriesSummary>,
    },
    Class {
        counts: BTreeMap<i64, u64>,
    },
}

impl LabelStats {
    fn empty(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Bool => LabelStats::Bool {
                true_count: 0,
                false_count: 0,
            },
            FeatureKind::Series => LabelStats::Series {
                values: Vec::new(),
                summary: None,
            },
            FeatureKind::Class => LabelStats::Class {
                counts: BTreeMap::new(),
            },
        }
    }

    fn kind(&self) -> FeatureKind {
        match self {
            LabelStats::Bool { .. } => FeatureKind::Bool,
            LabelStats::Series { .. } => FeatureKind::Series,
            LabelStats::Class { .. } => FeatureKind::Class,
        }
    }

    fn record(&mut self, value: FeatureValue) {
        match (self, value) {
            (
                LabelStats::Bool {
                    true_count,
                    false_count,
                },
                FeatureValue::Bool(b),
            ) => {
                if b {
                    *true_count += 1;
                } else {
                    *false_count += 1;
                }
            }
            (LabelStats::Series { values, summary }, FeatureValue::Series(v)) => {
                values.push(v);
                *summary = None;
            }
            (LabelStats::Class { counts }, FeatureValue::Class(c)) => {
                *counts.entry(c).or_insert(0) += 1;
            }
            // Kinds are checked before anything is recorded.
            _ => {}
        }
    }
}

/// Population-relative predicates of one feature set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativizedFeatureSet {
    predicates: BTreeMap<String, bool>,
}

impl RelativizedFeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, predicate: impl Into<String>, value: bool) {
        self.predicates.insert(predicate.into(), value);
    }

    pub fn get(&self, predicate: &str) -> Option<bool> {
        self.predicates.get(predicate).copied()
    }

    /// Missing predicates read as false.
    pub fn holds(&self, predicate: &str) -> bool {
        self.get(predicate).unwrap_or(false)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, bool> {
        self.predicates.iter()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl FromIterator<(String, bool)> for RelativizedFeatureSet {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self {
            predicates: iter.into_iter().collect(),
        }
    }
}

/// Per-label distributions over a population of feature sets.
#[derive(Debug, Clone)]
pub struct PopulationStats {
    labels: BTreeMap<String, LabelStats>,
    excluded: BTreeSet<String>,
    observations: usize,
    state: StatsState,
}

impl Default for PopulationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PopulationStats {
    pub fn new() -> Self {
        Self::with_excluded(std::iter::empty::<String>())
    }

    /// Population that ignores the given housekeeping labels.
    pub fn with_excluded<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: BTreeMap::new(),
            excluded: labels.into_iter().map(Into::into).collect(),
            observations: 0,
            state: StatsState::Collecting,
        }
    }

    pub fn state(&self) -> StatsState {
        self.state
    }

    /// Number of feature sets added.
    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        self.excluded.contains(label)
    }

    /// Summary of a series label, present only once prepared.
    pub fn summary(&self, label: &str) -> Option<&SeriesSummary> {
        match self.labels.get(label) {
            Some(LabelStats::Series { summary, .. }) => summary.as_ref(),
            _ => None,
        }
    }

    /// Accumulates one feature set.
    ///
    /// The whole set is rejected, leaving the population untouched, when a
    /// label arrives with a different kind than previously observed.
    pub fn add(&mut self, features: &FeatureSet) -> Result<(), StatsError> {
        for (label, value) in features {
            if let Some(existing) = self.labels.get(label) {
                if existing.kind() != value.kind() {
                    return Err(StatsError::KindMismatch {
                        label: label.clone(),
                        expected: existing.kind(),
                        found: value.kind(),
                    });
                }
            }
        }

        for (label, value) in features {
            if self.excluded.contains(label) {
                continue;
            }
            self.labels
                .entry(label.clone())
                .or_insert_with(|| LabelStats::empty(value.kind()))
                .record(*value);
        }

        self.observations += 1;
        self.state = StatsState::Collecting;
        Ok(())
    }

    /// Derives series aggregates. A no-op when already prepared.
    pub fn prepare(&mut self) {
        if self.state == StatsState::Prepared {
            return;
        }

        let mut prepared = 0;
        for (label, stats) in &mut self.labels {
            if let LabelStats::Series { values, summary } = stats {
                *summary = SeriesSummary::from_values(values);
                if summary.is_some() {
                    prepared += 1;
                } else {
                    log::warn!(
                        "Series {} has {} observation(s), no spread available",
                        label,
                        values.len()
                    );
                }
            }
        }

        log::debug!(
            "Prepared {} series over {} observations ({} labels)",
            prepared,
            self.observations,
            self.labels.len()
        );
        self.state = StatsState::Prepared;
    }

    /// Prepares if needed, then relativizes.
    pub fn relativize(&mut self, features: &FeatureSet) -> Result<RelativizedFeatureSet, StatsError> {
        self.prepare();
        self.relativize_prepared(features)
    }

    /// Relativizes against the current aggregates without mutating them.
    ///
    /// Fails with [`StatsError::NotPrepared`] while collecting.
    pub fn relativize_prepared(
        &self,
        features: &FeatureSet,
    ) -> Result<RelativizedFeatureSet, StatsError> {
        if self.state != StatsState::Prepared {
            return Err(StatsError::NotPrepared);
        }
        if self.observations == 0 {
            return Err(StatsError::EmptyPopulation);
        }

        let mut relative = RelativizedFeatureSet::new();

        for (label, value) in features {
            if self.excluded.contains(label) {
                continue;
            }
            let stats = self
                .labels
                .get(label)
                .ok_or_else(|| StatsError::UnknownLabel(label.clone()))?;

            match (stats, *value) {
                (
                    LabelStats::Bool {
                        true_count,
                        false_count,
                    },
                    FeatureValue::Bool(b),
                ) => {
                    let (same, opposite) = if b {
                        (true_count, false_count)
                    } else {
                        (false_count, true_count)
                    };
                    relative.insert(label.clone(), b);
                    relative.insert(format!("{label}{PREDOMINANT_SUFFIX}"), same > opposite);
                }
                (LabelStats::Series { values, summary }, FeatureValue::Series(v)) => {
                    let summary = summary.as_ref().ok_or_else(|| StatsError::InsufficientData {
                        label: label.clone(),
                        observations: values.len(),
                    })?;
                    for (suffix, holds) in summary.thresholds(v) {
                        relative.insert(format!("{label}{suffix}"), holds);
                    }
                }
                (LabelStats::Class { counts }, FeatureValue::Class(c)) => {
                    for category in counts.keys() {
                        relative.insert(format!("{label}_{category}"), *category == c);
                    }
                    let most = counts.values().copied().max().unwrap_or(0);
                    let own = counts.get(&c).copied().unwrap_or(0);
                    relative.insert(format!("{label}{PREDOMINANT_SUFFIX}"), own == most);
                }
                (stats, value) => {
                    return Err(StatsError::KindMismatch {
                        label: label.clone(),
                        expected: stats.kind(),
                        found: value.kind(),
                    })
                }
            }
        }

        Ok(relative)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("Population is empty")]
    EmptyPopulation,
    #[error("Population statistics are not prepared")]
    NotPrepared,
    #[error("Insufficient population data for {label}: {observations} observation(s)")]
    InsufficientData { label: String, observations: usize },
    #[error("Label {0} was never observed in the population")]
    UnknownLabel(String),
    #[error("Label {label} is {found}, population holds {expected}")]
    KindMismatch {
        label: String,
        expected: FeatureKind,
        found: FeatureKind,
    },
}
