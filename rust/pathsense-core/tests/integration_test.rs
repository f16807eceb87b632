use pathsense_core::features::{divergence, hover};
use pathsense_core::{
    normalize, BatchProcessor, BatchReport, CertaintyModel, FeatureSet, Layout, PathFeatures,
    PathsenseConfig, PopulationStats, QuestionInfo, QuestionKey, QuestionType, RawSample,
    RecordInput, SurveyRecord,
};
use tempfile::TempDir;

fn two_options(chosen: &str) -> Layout {
    Layout::new(vec!["option0".into(), "option1".into()], chosen)
}

/// Screen capture heading up and to the left, with a sideways wobble.
fn capture(wobble: f64) -> Vec<RawSample> {
    (0..=30)
        .map(|i| {
            let f = f64::from(i) / 30.0;
            let drift = wobble * (f * std::f64::consts::TAU).sin();
            RawSample::new(1_700_000_000_000 + i64::from(i) * 35, 800.0 - 300.0 * f + drift, 700.0 - 350.0 * f)
        })
        .collect()
}

fn extract(samples: &[RawSample]) -> FeatureSet {
    let path = normalize(samples, &QuestionType::BipartiteChoice, &two_options("option0"), "option1").unwrap();
    PathFeatures::default().extract(&path).unwrap()
}

#[test]
fn test_normalized_endpoints() {
    let path = normalize(&capture(12.0), &QuestionType::BipartiteChoice, &two_options("option0"), "option1").unwrap();

    let first = path.first().unwrap();
    let last = path.last().unwrap();
    assert_eq!((first.x, first.y, first.t), (0.0, 0.0, 0.0));
    assert!((last.x.abs() - 1.0).abs() < 1e-9);
    assert!((last.y.abs() - 1.0).abs() < 1e-9);
    // Leftward answers are mirrored onto the positive side.
    assert!(last.x > 0.0);
    assert_eq!(last.t, 30.0 * 35.0);
}

#[test]
fn test_straight_capture_features() {
    let features = extract(&capture(0.0));
    assert!(features.series(divergence::MAX_DIVERGENCE).unwrap() < 1e-9);
    assert_eq!(features.series(divergence::PATH_CROSSING), Some(0.0));
    assert_eq!(features.series(divergence::NUM_BACK_AND_FORTH), Some(0.0));
    assert_eq!(features.series(hover::NUM_HOVER), Some(0.0));
}

#[test]
fn test_dwell_capture_single_hover() {
    // 1200 ms parked near the stimulus, then a quick move to the answer.
    let mut samples: Vec<RawSample> = (0..=24)
        .map(|i| {
            let jitter = if i % 2 == 0 { 2.0 } else { -2.0 };
            RawSample::new(i * 50, 500.0 + jitter, 700.0)
        })
        .collect();
    samples.extend((1..=30).map(|i| {
        let f = i as f64 / 30.0;
        RawSample::new(1200 + i * 100, 500.0 + 300.0 * f, 700.0 - 400.0 * f)
    }));

    let features = extract(&samples);
    assert_eq!(features.series(hover::NUM_HOVER), Some(1.0));
    assert_eq!(features.flag(hover::EARLY_HOVER), Some(true));
    assert_eq!(features.flag(hover::LATE_HOVER), Some(false));
    assert_eq!(features.flag(hover::STIMULUS_HOVER), Some(true));
}

#[test]
fn test_population_pipeline() {
    let population: Vec<FeatureSet> = [0.0, 8.0, 16.0, 24.0, 32.0, 60.0]
        .iter()
        .map(|w| extract(&capture(*w)))
        .collect();

    let mut stats = PopulationStats::new();
    for features in &population {
        stats.add(features).unwrap();
    }

    let model = CertaintyModel::new();
    let straight = model.score(&stats.relativize(&population[0]).unwrap()).unwrap();
    let wobbly = model.score(&stats.relativize(&population[5]).unwrap()).unwrap();
    assert!(straight > wobbly, "straight {straight} vs wobbly {wobbly}");
}

#[test]
fn test_batch_report_round_trips_through_json() {
    let key: QuestionKey = [(
        "q1".to_string(),
        QuestionInfo {
            short_code: "trust".into(),
            category: "opinion".into(),
            title: "Do you trust it?".into(),
        },
    )]
    .into_iter()
    .collect();

    let records: Vec<SurveyRecord> = (0..5)
        .map(|i| SurveyRecord {
            unique_id: i,
            participant: format!("p{i}"),
            question_type: QuestionType::BipartiteChoice,
            question_stimulus: "Do you trust it?".into(),
            response: "yes".into(),
            qlabel: "q1".into(),
            input: RecordInput::Capture {
                samples: capture(i as f64 * 10.0),
                layout: two_options("option0"),
                duration_ms: Some(1500),
            },
        })
        .collect();

    let dir = TempDir::new().unwrap();
    let config = PathsenseConfig::load_or_default(dir.path()).unwrap();
    let report = BatchProcessor::new(&config).run(&records, &key);
    assert_eq!(report.scored, 5);

    let out = dir.path().join("report.json");
    std::fs::write(&out, serde_json::to_string_pretty(&report).unwrap()).unwrap();
    let loaded: BatchReport = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(loaded.total_records, 5);
    assert_eq!(loaded.outcomes.len(), 5);
    assert_eq!(loaded.outcomes[3].score, report.outcomes[3].score);
    assert_eq!(loaded.profiles.keys().collect::<Vec<_>>(), report.profiles.keys().collect::<Vec<_>>());

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    let features = &json["outcomes"][0]["features"];
    assert_eq!(features["pathCrossing"][1], "series");
    assert_eq!(json["profiles"]["p2"]["entries"]["opinion"]["trust"]["answer"], "yes");
}
