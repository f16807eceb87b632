//! Canonical path normalization.
//!
//! A raw capture is recorded in screen space (origin top-left, y growing
//! downward). Normalization maps it into a frame where the stimulus sits at
//! `(0, 0)`, the chosen answer at `(1, 1)` and time starts at zero:
//!
//! 1. mirror y about the midpoint of the first and last sample
//! 2. re-origin timestamps
//! 3. translate the first sample to the origin
//! 4. scale each axis by the first-to-last span
//! 5. mirror x so every path approaches its target from the same side

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::geometry::{rotate_point, Point};

/// Option key assumed to be rendered between the other two in a tripartite layout.
pub const DEFAULT_MIDDLE_OPTION: &str = "option1";

/// Rotation applied to a tripartite capture whose answer is the middle option.
pub const TRIPARTITE_ROTATION_DEGREES: f64 = 45.0;

/// One timestamped screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Milliseconds, any epoch.
    pub timestamp_ms: i64,
    pub x: f64,
    pub y: f64,
}

impl RawSample {
    pub fn new(timestamp_ms: i64, x: f64, y: f64) -> Self {
        Self { timestamp_ms, x, y }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Ordered samples of a single answer.
pub type RawCapture = Vec<RawSample>;

/// Kind of survey question a capture belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    BipartiteChoice,
    TripartiteChoice,
    #[serde(untagged)]
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::BipartiteChoice => "bipartite_choice",
            QuestionType::TripartiteChoice => "tripartite_choice",
            QuestionType::Other(name) => name,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response options as rendered for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Option keys in display order.
    pub options: Vec<String>,
    /// Key of the chosen option.
    pub chosen: String,
    /// Screen midpoint of each option. Informational; screen and capture
    /// coordinates are not guaranteed to share a frame.
    #[serde(default)]
    pub midpoints: BTreeMap<String, Point>,
}

impl Layout {
    pub fn new(options: Vec<String>, chosen: impl Into<String>) -> Self {
        Self {
            options,
            chosen: chosen.into(),
            midpoints: BTreeMap::new(),
        }
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.options.iter().any(|o| o == &self.chosen) {
            Ok(())
        } else {
            Err(NormalizeError::UnknownResponse(self.chosen.clone()))
        }
    }
}

/// One sample of a normalized path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSample {
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the first sample.
    pub t: f64,
}

impl NormalizedSample {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A path in the canonical frame. Empty when the capture had fewer than two samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath {
    samples: Vec<NormalizedSample>,
}

impl NormalizedPath {
    pub fn samples(&self) -> &[NormalizedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&NormalizedSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&NormalizedSample> {
        self.samples.last()
    }

    /// Elapsed milliseconds from first to last sample.
    pub fn duration(&self) -> f64 {
        self.samples.last().map(|s| s.t).unwrap_or(0.0)
    }
}

impl From<Vec<NormalizedSample>> for NormalizedPath {
    fn from(samples: Vec<NormalizedSample>) -> Self {
        Self { samples }
    }
}

/// Normalizes a two-option capture.
pub fn normalize_bipartite(raw: &[RawSample]) -> Result<NormalizedPath, NormalizeError> {
    let (first, last) = match (raw.first(), raw.last()) {
        (Some(first), Some(last)) if raw.len() >= 2 => (*first, *last),
        _ => return Ok(NormalizedPath::default()),
    };

    // Screen y grows downward; mirror about the midpoint of the endpoints.
    let plane = (first.y + last.y) / 2.0;
    let flip = |y: f64| 2.0 * plane - y;

    let offset_x = first.x;
    let offset_y = flip(first.y);
    let scale_x = (first.x - last.x).abs();
    let scale_y = (flip(first.y) - flip(last.y)).abs();

    if scale_x == 0.0 || scale_y == 0.0 {
        return Err(NormalizeError::DegenerateLayout {
            width: scale_x,
            height: scale_y,
        });
    }

    let mirror_x = if last.x < first.x { -1.0 } else { 1.0 };
    let start = first.timestamp_ms;

    let samples = raw
        .iter()
        .map(|s| NormalizedSample {
            x: mirror_x * (s.x - offset_x) / scale_x,
            y: (flip(s.y) - offset_y) / scale_y,
            t: s.timestamp_ms.saturating_sub(start) as f64,
        })
        .collect();

    Ok(NormalizedPath { samples })
}

/// Normalizes a three-option capture.
///
/// When the middle option was chosen the capture is rotated about its first
/// sample so the answer lands on a diagonal like in the two-option layout.
pub fn normalize_tripartite(
    raw: &[RawSample],
    layout: &Layout,
    middle_option: &str,
) -> Result<NormalizedPath, NormalizeError> {
    if layout.option_count() != 3 {
        return Err(NormalizeError::WrongOptionCount {
            expected: 3,
            found: layout.option_count(),
        });
    }

    if layout.chosen != middle_option {
        return normalize_bipartite(raw);
    }

    let Some(pivot) = raw.first().map(RawSample::point) else {
        return Ok(NormalizedPath::default());
    };

    let rotated: Vec<RawSample> = raw
        .iter()
        .map(|s| {
            let p = rotate_point(&s.point(), &pivot, TRIPARTITE_ROTATION_DEGREES);
            RawSample::new(s.timestamp_ms, p.x, p.y)
        })
        .collect();

    normalize_bipartite(&rotated)
}

/// Normalizes a capture according to its question type.
pub fn normalize(
    raw: &[RawSample],
    question_type: &QuestionType,
    layout: &Layout,
    middle_option: &str,
) -> Result<NormalizedPath, NormalizeError> {
    layout.validate()?;
    match question_type {
        QuestionType::TripartiteChoice => normalize_tripartite(raw, layout, middle_option),
        _ => normalize_bipartite(raw),
    }
}

/// Terminal normalization failures. None of these are retryable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("Invalid layout detected: answers stacked (span {width} x {height})")]
    DegenerateLayout { width: f64, height: f64 },
    #[error("Incorrect number of options: expected {expected}, found {found}")]
    WrongOptionCount { expected: usize, found: usize },
    #[error("Chosen option {0:?} is not part of the layout")]
    UnknownResponse(String),
}
