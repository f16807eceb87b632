//! Two-phase batch processing of a survey population.
//!
//! Phase one extracts a feature set for every record, in parallel, and feeds
//! each one into a single [`PopulationStats`]. Phase two only starts once
//! every record has been added: the population is prepared, every scored
//! record is relativized and scored, and the scores are mapped to deciles
//! and attached to participant profiles.
//!
//! A failing record is logged, marked on its outcome and skipped. It never
//! aborts the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{BatchConfig, PathsenseConfig, ScreeningConfig};
use crate::features::{FeatureError, FeatureSet, PathFeatures};
use crate::model::{CertaintyDeciles, CertaintyModel, CertaintyScore, ModelError};
use crate::path::{normalize, Layout, NormalizeError, QuestionType, RawCapture};
use crate::profile::{ParticipantProfile, ProfileError, QuestionKey};
use crate::screening::is_suspect_automation;
use crate::stats::{PopulationStats, RelativizedFeatureSet, StatsError};

const PROGRESS_EVERY: usize = 100;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub unique_id: i64,
    pub participant: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub question_stimulus: String,
    #[serde(default)]
    pub response: String,
    pub qlabel: String,
    pub input: RecordInput,
}

/// Where a record's features come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordInput {
    /// Raw capture, normalized and extracted in-process.
    Capture {
        samples: RawCapture,
        layout: Layout,
        /// Question duration; the capture span when absent.
        #[serde(default)]
        duration_ms: Option<i64>,
    },
    /// Features extracted and persisted earlier.
    Features(FeatureSet),
}

/// Result of phase one for a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub features: FeatureSet,
    /// Only known for raw captures.
    pub suspect_automation: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub unique_id: i64,
    pub participant: String,
    pub qlabel: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<RelativizedFeatureSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<CertaintyScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decile: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspect_automation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordOutcome {
    fn pending(record: &SurveyRecord) -> Self {
        Self {
            unique_id: record.unique_id,
            participant: record.participant.clone(),
            qlabel: record.qlabel.clone(),
            question_type: record.question_type.clone(),
            features: None,
            relative: None,
            score: None,
            decile: None,
            suspect_automation: None,
            error: None,
        }
    }

    fn fail(&mut self, err: RecordError) {
        log::warn!(
            "Skipping record {} ({}, {}): {}",
            self.unique_id,
            self.participant,
            self.qlabel,
            err
        );
        self.error = Some(err.to_string());
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed_at: DateTime<Utc>,
    pub total_records: usize,
    pub extracted: usize,
    pub scored: usize,
    pub failures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deciles: Option<CertaintyDeciles>,
    pub outcomes: Vec<RecordOutcome>,
    pub profiles: BTreeMap<String, ParticipantProfile>,
}

impl BatchReport {
    pub fn outcome(&self, unique_id: i64) -> Option<&RecordOutcome> {
        self.outcomes.iter().find(|o| o.unique_id == unique_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("feature extraction failed: {0}")]
    Feature(#[from] FeatureError),
    #[error("relativization failed: {0}")]
    Stats(#[from] StatsError),
    #[error("scoring failed: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("extraction worker panicked")]
    WorkerPanicked,
}

/// Runs a population through extraction, relativization and scoring.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    features: PathFeatures,
    model: CertaintyModel,
    middle_option: String,
    excluded_labels: Vec<String>,
    batch: BatchConfig,
    screening: ScreeningConfig,
}

impl BatchProcessor {
    pub fn new(config: &PathsenseConfig) -> Self {
        Self {
            features: PathFeatures::new(config.hover.clone()),
            model: CertaintyModel::new(),
            middle_option: config.layout.middle_option.clone(),
            excluded_labels: config.stats.excluded_labels.clone(),
            batch: config.batch.clone(),
            screening: config.screening.clone(),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.batch.worker_threads = threads;
        self
    }

    /// Phase one for a single record.
    pub fn extract(&self, record: &SurveyRecord) -> Result<Extraction, RecordError> {
        match &record.input {
            RecordInput::Features(features) => Ok(Extraction {
                features: features.clone(),
                suspect_automation: None,
            }),
            RecordInput::Capture {
                samples,
                layout,
                duration_ms,
            } => {
                let path = normalize(samples, &record.question_type, layout, &self.middle_option)?;
                let features = self.features.extract(&path)?;
                let duration = duration_ms.unwrap_or_else(|| match (samples.first(), samples.last()) {
                    (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
                    _ => 0,
                });
                let suspect = is_suspect_automation(
                    &record.question_type,
                    samples.len(),
                    &features,
                    duration,
                    &self.screening,
                );
                log::debug!(
                    "Record {} extracted {} features from {} samples",
                    record.unique_id,
                    features.len(),
                    samples.len()
                );
                Ok(Extraction {
                    features,
                    suspect_automation: Some(suspect),
                })
            }
        }
    }

    fn extract_all(&self, records: &[SurveyRecord]) -> Vec<Result<Extraction, RecordError>> {
        if records.is_empty() {
            return Vec::new();
        }
        let threads = self.batch.effective_threads().max(1);
        let chunk_size = records.len().div_ceil(threads);

        std::thread::scope(|scope| {
            let workers: Vec<_> = records
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move || {
                        chunk.iter().map(|r| self.extract(r)).collect::<Vec<_>>()
                    });
                    (chunk.len(), handle)
                })
                .collect();

            workers
                .into_iter()
                .flat_map(|(len, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        log::error!("Extraction worker panicked, {} records lost", len);
                        (0..len).map(|_| Err(RecordError::WorkerPanicked)).collect()
                    })
                })
                .collect()
        })
    }

    fn score(
        &self,
        stats: &PopulationStats,
        features: &FeatureSet,
    ) -> Result<(RelativizedFeatureSet, CertaintyScore), RecordError> {
        let relative = stats.relativize_prepared(features)?;
        let score = self.model.score(&relative)?;
        Ok((relative, score))
    }

    pub fn run(&self, records: &[SurveyRecord], key: &QuestionKey) -> BatchReport {
        let processed_at = Utc::now();
        log::info!(
            "Processing {} records with {} extraction threads",
            records.len(),
            self.batch.effective_threads()
        );

        let mut outcomes: Vec<RecordOutcome> = records.iter().map(RecordOutcome::pending).collect();
        let mut profiles: BTreeMap<String, ParticipantProfile> = BTreeMap::new();
        let mut stats = PopulationStats::with_excluded(self.excluded_labels.iter().cloned());

        // Phase one: every record joins the population before any is relativized.
        let extractions = self.extract_all(records);
        for ((record, extraction), outcome) in records.iter().zip(extractions).zip(&mut outcomes) {
            let profile = profiles
                .entry(record.participant.clone())
                .or_insert_with(|| ParticipantProfile::new(record.participant.clone()));
            if let Err(err) = profile.add_result(key, record) {
                outcome.fail(err.into());
                continue;
            }

            let added = extraction.and_then(|e| {
                stats.add(&e.features)?;
                Ok(e)
            });
            match added {
                Ok(e) => {
                    outcome.features = Some(e.features);
                    outcome.suspect_automation = e.suspect_automation;
                }
                Err(err) => outcome.fail(err),
            }
        }
        log::info!(
            "Population collected: {} feature sets, {} labels, {} participants",
            stats.observations(),
            stats.label_count(),
            profiles.len()
        );

        // Phase two.
        stats.prepare();

        let mut by_participant: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            by_participant.entry(record.participant.as_str()).or_default().push(i);
        }

        let mut scores: Vec<(usize, CertaintyScore)> = Vec::new();
        for (n, indices) in by_participant.values().enumerate() {
            for &i in indices {
                if !self.batch.is_scored(&records[i].question_type) {
                    continue;
                }
                let outcome = &mut outcomes[i];
                let result = match outcome.features.as_ref() {
                    Some(features) => self.score(&stats, features),
                    None => continue,
                };
                match result {
                    Ok((relative, score)) => {
                        outcome.relative = Some(relative);
                        outcome.score = Some(score);
                        scores.push((i, score));
                    }
                    Err(err) => outcome.fail(err),
                }
            }

            if (n + 1) % PROGRESS_EVERY == 0 {
                log::info!(
                    "Participants processed {}, records scored {}",
                    n + 1,
                    scores.len()
                );
            }
        }

        let population: Vec<CertaintyScore> = scores.iter().map(|(_, s)| *s).collect();
        let deciles = CertaintyDeciles::from_scores(&population);
        if let Some(deciles) = &deciles {
            for &(i, score) in &scores {
                let decile = deciles.decile(score);
                outcomes[i].decile = Some(decile);
                if let Some(profile) = profiles.get_mut(&records[i].participant) {
                    profile.add_certainty(key, &records[i].qlabel, decile);
                }
            }
        }

        for (participant, indices) in &by_participant {
            let Some(profile) = profiles.get_mut(*participant) else {
                continue;
            };
            let Some(benchmark) = profile.benchmark(&self.batch.benchmark_category) else {
                continue;
            };
            for &i in indices {
                if self.batch.is_scored(&records[i].question_type) {
                    profile.add_relative(key, benchmark, &records[i].qlabel);
                }
            }
        }

        let report = BatchReport {
            processed_at,
            total_records: records.len(),
            extracted: outcomes.iter().filter(|o| o.features.is_some()).count(),
            scored: scores.len(),
            failures: outcomes.iter().filter(|o| o.is_failed()).count(),
            deciles,
            outcomes,
            profiles,
        };
        log::info!(
            "Batch complete: {} extracted, {} scored, {} failed",
            report.extracted,
            report.scored,
            report.failures
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::RawSample;
    use crate::profile::QuestionInfo;

    /// Screen-space capture from the stimulus at the bottom to an answer at
    /// the top right, bowing sideways by `bow` pixels.
    fn capture(bow: f64, steps: i64) -> RawCapture {
        (0..=steps)
            .map(|i| {
                let f = i as f64 / steps as f64;
                let sway = bow * (f * std::f64::consts::PI).sin();
                RawSample::new(i * 40, 400.0 + 200.0 * f + sway, 600.0 - 400.0 * f)
            })
            .collect()
    }

    fn record(id: i64, participant: &str, qlabel: &str, samples: RawCapture) -> SurveyRecord {
        SurveyRecord {
            unique_id: id,
            participant: participant.into(),
            question_type: QuestionType::BipartiteChoice,
            question_stimulus: "Pick one".into(),
            response: "yes".into(),
            qlabel: qlabel.into(),
            input: RecordInput::Capture {
                samples,
                layout: Layout::new(vec!["option0".into(), "option1".into()], "option0"),
                duration_ms: None,
            },
        }
    }

    fn key() -> QuestionKey {
        [("q1", "trust", "opinion"), ("b1", "sky", "benchmark")]
            .into_iter()
            .map(|(label, code, category)| {
                (
                    label.to_string(),
                    QuestionInfo {
                        short_code: code.into(),
                        category: category.into(),
                        title: String::new(),
                    },
                )
            })
            .collect()
    }

    fn processor() -> BatchProcessor {
        BatchProcessor::new(&PathsenseConfig::default()).with_threads(2)
    }

    #[test]
    fn test_population_scored() {
        let records: Vec<_> = (0..6)
            .flat_map(|p| {
                let participant = format!("p{p}");
                [
                    record(p * 2, &participant, "q1", capture(p as f64 * 15.0, 20)),
                    record(p * 2 + 1, &participant, "b1", capture(30.0 - p as f64 * 5.0, 20)),
                ]
            })
            .collect();

        let report = processor().run(&records, &key());

        assert_eq!(report.total_records, 12);
        assert_eq!(report.extracted, 12);
        assert_eq!(report.scored, 12);
        assert_eq!(report.failures, 0);
        assert_eq!(report.profiles.len(), 6);
        assert!(report.deciles.is_some());

        let outcome = report.outcome(0).unwrap();
        assert!(outcome.relative.as_ref().is_some_and(|r| !r.is_empty()));
        assert!(outcome.decile.is_some_and(|d| (0.0..=1.0).contains(&d)));
        assert_eq!(outcome.suspect_automation, Some(true));

        let profile = &report.profiles["p3"];
        assert!(profile.entries["opinion"]["trust"].certainty.is_some());
        assert!(profile.entries["benchmark"]["sky"].certainty.is_some());
    }

    #[test]
    fn test_bad_record_is_skipped() {
        let mut records: Vec<_> = (0..4)
            .map(|i| record(i, &format!("p{i}"), "q1", capture(i as f64 * 10.0, 20)))
            .collect();
        // Stacked answers: no horizontal span.
        let stacked = (0..=20).map(|i| RawSample::new(i * 40, 400.0, 600.0 - i as f64 * 20.0)).collect();
        records.push(record(99, "p9", "q1", stacked));

        let report = processor().run(&records, &key());

        assert_eq!(report.total_records, 5);
        assert_eq!(report.failures, 1);
        assert_eq!(report.scored, 4);
        let failed = report.outcome(99).unwrap();
        assert!(failed.error.as_deref().unwrap().contains("stacked"));
        assert!(failed.features.is_none());
    }

    #[test]
    fn test_unscored_types_feed_population_only() {
        let mut records: Vec<_> = (0..3)
            .map(|i| record(i, "p0", "q1", capture(i as f64 * 10.0, 20)))
            .collect();
        records[2].question_type = QuestionType::Other("slider".into());

        let report = processor().run(&records, &key());
        assert_eq!(report.extracted, 3);
        assert_eq!(report.scored, 2);
        assert!(report.outcome(2).unwrap().score.is_none());
    }

    #[test]
    fn test_persisted_features_input() {
        let extracted = processor()
            .extract(&record(1, "p0", "q1", capture(20.0, 20)))
            .unwrap();
        let mut persisted = record(2, "p1", "q1", Vec::new());
        persisted.input = RecordInput::Features(extracted.features.clone());

        let again = processor().extract(&persisted).unwrap();
        assert_eq!(again.features, extracted.features);
        assert_eq!(again.suspect_automation, None);
    }

    #[test]
    fn test_empty_batch() {
        let report = processor().run(&[], &QuestionKey::default());
        assert_eq!(report.total_records, 0);
        assert!(report.deciles.is_none());
        assert!(report.outcomes.is_empty());
    }
}
