//! Behavioral feature extraction from normalized paths.
//!
//! Four independent analyzers each contribute labeled entries to a single
//! [`FeatureSet`]:
//!
//! - [`divergence`]: distance from the ideal straight answer, crossings and quadrant dwell
//! - [`hover`]: sustained, spatially tight dwell clusters
//! - [`speed`]: instantaneous velocity profile
//! - [`shape`]: 3x3 rasterized stroke patterns
//!
//! Every entry carries a [`FeatureKind`] that tells the population statistics
//! how to accumulate and relativize it.

pub mod divergence;
pub mod hover;
pub mod shape;
pub mod speed;

use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::HoverConfig;
use crate::geometry::Point;
use crate::path::NormalizedPath;

pub use divergence::analyze_divergence;
pub use hover::{analyze_hover, HoverEvent};
pub use shape::{analyze_shape, Grid};
pub use speed::analyze_speed;

/// Accumulation class of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Bool,
    Series,
    Class,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Bool => write!(f, "bool"),
            FeatureKind::Series => write!(f, "series"),
            FeatureKind::Class => write!(f, "class"),
        }
    }
}

/// A single extracted value.
///
/// Serialized as the pair `[value, kind]`, e.g. `[0.42, "series"]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Bool(bool),
    Series(f64),
    Class(i64),
}

impl FeatureValue {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Bool(_) => FeatureKind::Bool,
            FeatureValue::Series(_) => FeatureKind::Series,
            FeatureValue::Class(_) => FeatureKind::Class,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<f64> {
        match self {
            FeatureValue::Series(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<i64> {
        match self {
            FeatureValue::Class(c) => Some(*c),
            _ => None,
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        match self {
            FeatureValue::Bool(b) => pair.serialize_element(b)?,
            FeatureValue::Series(v) => pair.serialize_element(v)?,
            FeatureValue::Class(c) => pair.serialize_element(c)?,
        }
        pair.serialize_element(&self.kind())?;
        pair.end()
    }
}

impl<'de> Deserialize<'de> for FeatureValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (value, kind): (serde_json::Value, FeatureKind) = Deserialize::deserialize(deserializer)?;

        let parsed = match kind {
            FeatureKind::Bool => value.as_bool().map(FeatureValue::Bool),
            // Counts were historically persisted as booleans or integers.
            FeatureKind::Series => value
                .as_f64()
                .or_else(|| value.as_bool().map(|b| if b { 1.0 } else { 0.0 }))
                .map(FeatureValue::Series),
            FeatureKind::Class => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
                .map(FeatureValue::Class),
        };

        parsed.ok_or_else(|| D::Error::custom(format!("invalid {kind} feature value: {value}")))
    }
}

/// Labeled features of one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    entries: BTreeMap<String, FeatureValue>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: FeatureValue) {
        self.entries.insert(label.into(), value);
    }

    pub fn insert_bool(&mut self, label: &str, value: bool) {
        self.insert(label, FeatureValue::Bool(value));
    }

    pub fn insert_series(&mut self, label: &str, value: f64) {
        self.insert(label, FeatureValue::Series(value));
    }

    pub fn insert_class(&mut self, label: impl Into<String>, value: i64) {
        self.insert(label, FeatureValue::Class(value));
    }

    pub fn get(&self, label: &str) -> Option<&FeatureValue> {
        self.entries.get(label)
    }

    pub fn series(&self, label: &str) -> Option<f64> {
        self.get(label).and_then(FeatureValue::as_series)
    }

    pub fn flag(&self, label: &str) -> Option<bool> {
        self.get(label).and_then(FeatureValue::as_bool)
    }

    pub fn class(&self, label: &str) -> Option<i64> {
        self.get(label).and_then(FeatureValue::as_class)
    }

    pub fn merge(&mut self, other: FeatureSet) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FeatureValue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = (&'a String, &'a FeatureValue);
    type IntoIter = btree_map::Iter<'a, String, FeatureValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Screen quadrant of a normalized point, numbered clockwise from the top right.
///
/// The vertical split is at `x = 0`, the horizontal one at `y = 0.5`.
pub fn quadrant_of(point: &Point) -> u8 {
    match (point.x >= 0.0, point.y >= 0.5) {
        (true, true) => 1,
        (true, false) => 2,
        (false, false) => 3,
        (false, true) => 4,
    }
}

/// Whether two quadrants lie on the same side of `x = 0`.
pub(crate) fn same_half(a: u8, b: u8) -> bool {
    (a <= 2) == (b <= 2)
}

/// Runs every analyzer over a path.
#[derive(Debug, Clone, Default)]
pub struct PathFeatures {
    hover: HoverConfig,
}

impl PathFeatures {
    pub fn new(hover: HoverConfig) -> Self {
        Self { hover }
    }

    /// Extracts the full feature set. An empty path yields an empty set.
    pub fn extract(&self, path: &NormalizedPath) -> Result<FeatureSet, FeatureError> {
        let mut features = FeatureSet::new();
        if path.is_empty() {
            return Ok(features);
        }

        features.merge(analyze_divergence(path));
        features.merge(analyze_hover(path, &self.hover));
        features.merge(analyze_speed(path)?);
        features.merge(analyze_shape(path));

        if let Some((label, _)) = features
            .iter()
            .find(|(_, v)| v.as_series().is_some_and(|s| !s.is_finite()))
        {
            return Err(FeatureError::NonFinite {
                label: label.clone(),
            });
        }

        Ok(features)
    }
}

/// Feature extraction failure for a single path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("No samples fall in the {window} third of the path")]
    EmptySpeedWindow { window: &'static str },
    #[error("Feature {label} is not finite")]
    NonFinite { label: String },
}
