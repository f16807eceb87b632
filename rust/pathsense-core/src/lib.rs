pub mod batch;
pub mod config;
pub mod features;
pub mod geometry;
pub mod model;
pub mod path;
pub mod profile;
pub mod screening;
pub mod stats;

// Re-export common types
pub use crate::batch::{
    BatchProcessor, BatchReport, Extraction, RecordError, RecordInput, RecordOutcome, SurveyRecord,
};
pub use crate::config::PathsenseConfig;
pub use crate::features::{
    FeatureError, FeatureKind, FeatureSet, FeatureValue, PathFeatures,
};
pub use crate::geometry::{Point, Segment};
pub use crate::model::{CertaintyDeciles, CertaintyModel, CertaintyScore, ModelError};
pub use crate::path::{
    normalize, Layout, NormalizeError, NormalizedPath, NormalizedSample, QuestionType, RawCapture,
    RawSample,
};
pub use crate::profile::{ParticipantProfile, ProfileEntry, ProfileError, QuestionInfo, QuestionKey};
pub use crate::screening::is_suspect_automation;
pub use crate::stats::{PopulationStats, RelativizedFeatureSet, StatsError, StatsState};
