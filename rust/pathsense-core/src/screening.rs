//! Heuristic screen for scripted answers.
//!
//! A mouse path that is near-perfectly straight and completed quickly is
//! unlikely to come from a human hand.

use crate::config::ScreeningConfig;
use crate::features::divergence::MAX_DIVERGENCE;
use crate::features::FeatureSet;
use crate::path::QuestionType;

/// Whether an answer looks automated.
///
/// Only choice questions captured with more than `min_samples` samples are
/// screened; short touch captures never qualify. A feature set without a
/// divergence measurement is not flagged.
pub fn is_suspect_automation(
    question_type: &QuestionType,
    sample_count: usize,
    features: &FeatureSet,
    duration_ms: i64,
    config: &ScreeningConfig,
) -> bool {
    if !matches!(
        question_type,
        QuestionType::BipartiteChoice | QuestionType::TripartiteChoice
    ) {
        return false;
    }

    if sample_count <= config.min_samples {
        return false;
    }

    let Some(max_divergence) = features.series(MAX_DIVERGENCE) else {
        return false;
    };

    max_divergence <= config.max_divergence && duration_ms <= config.max_duration_ms
}
