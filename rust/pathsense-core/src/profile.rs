//! Per-participant answer and certainty bookkeeping.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::batch::SurveyRecord;

/// What a question label stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionInfo {
    pub short_code: String,
    pub category: String,
    #[serde(default)]
    pub title: String,
}

/// Immutable lookup from question label to its short code and category.
///
/// Built once per batch by the caller and shared by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionKey {
    questions: BTreeMap<String, QuestionInfo>,
}

impl QuestionKey {
    pub fn new(questions: BTreeMap<String, QuestionInfo>) -> Self {
        Self { questions }
    }

    pub fn get(&self, qlabel: &str) -> Option<&QuestionInfo> {
        self.questions.get(qlabel)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl FromIterator<(String, QuestionInfo)> for QuestionKey {
    fn from_iter<I: IntoIterator<Item = (String, QuestionInfo)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<f64>,
}

/// Answers of one participant grouped as `category -> short_code -> entry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub participant: String,
    pub entries: BTreeMap<String, BTreeMap<String, ProfileEntry>>,
}

impl ParticipantProfile {
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Records the answer of a keyed question. Unkeyed questions are ignored.
    pub fn add_result(&mut self, key: &QuestionKey, record: &SurveyRecord) -> Result<(), ProfileError> {
        if record.participant != self.participant {
            return Err(ProfileError::ParticipantMismatch {
                expected: self.participant.clone(),
                found: record.participant.clone(),
            });
        }

        if let Some(info) = key.get(&record.qlabel) {
            self.entries.entry(info.category.clone()).or_default().insert(
                info.short_code.clone(),
                ProfileEntry {
                    answer: record.response.clone(),
                    ..ProfileEntry::default()
                },
            );
        }
        Ok(())
    }

    pub fn entry(&self, key: &QuestionKey, qlabel: &str) -> Option<&ProfileEntry> {
        let info = key.get(qlabel)?;
        self.entries.get(&info.category)?.get(&info.short_code)
    }

    fn entry_mut(&mut self, key: &QuestionKey, qlabel: &str) -> Option<&mut ProfileEntry> {
        let info = key.get(qlabel)?;
        self.entries
            .get_mut(&info.category)?
            .get_mut(&info.short_code)
    }

    /// Attaches a decile certainty. Returns whether the question had an entry.
    pub fn add_certainty(&mut self, key: &QuestionKey, qlabel: &str, certainty: f64) -> bool {
        match self.entry_mut(key, qlabel) {
            Some(entry) => {
                entry.certainty = Some(certainty);
                true
            }
            None => false,
        }
    }

    /// Sets `relative = certainty / benchmark` when both exist and the
    /// benchmark is non-zero.
    pub fn add_relative(&mut self, key: &QuestionKey, benchmark: f64, qlabel: &str) {
        if benchmark == 0.0 {
            return;
        }
        if let Some(entry) = self.entry_mut(key, qlabel) {
            if let Some(certainty) = entry.certainty {
                entry.relative = Some(certainty / benchmark);
            }
        }
    }

    /// Mean certainty across a category, typically the benchmark questions.
    pub fn benchmark(&self, category: &str) -> Option<f64> {
        let certainties: Vec<f64> = self
            .entries
            .get(category)?
            .values()
            .filter_map(|e| e.certainty)
            .collect();

        if certainties.is_empty() {
            None
        } else {
            Some(certainties.mean())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Incorrect participant id {found}, profile belongs to {expected}")]
    ParticipantMismatch { expected: String, found: String },
}
