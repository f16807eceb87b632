use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

/// Helper struct for CLI test utilities
struct CliTestEnv {
    dir: tempfile::TempDir,
    bin: &'static str,
}

impl CliTestEnv {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            bin: env!("CARGO_BIN_EXE_pathsense"),
        }
    }

    fn run(&self, args: &[&str]) -> (bool, String, String) {
        let output = Command::new(self.bin)
            .args(args)
            .env("PATHSENSE_DATA_DIR", self.dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to spawn process");
        (
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }

    fn run_expect_success(&self, args: &[&str]) -> String {
        let (success, stdout, stderr) = self.run(args);
        assert!(
            success,
            "Command failed: pathsense {}\nSTDOUT: {}\nSTDERR: {}",
            args.join(" "),
            stdout,
            stderr
        );
        stdout
    }

    fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }
}

/// Screen capture from the bottom centre to the top right, bowing by `bow` pixels.
fn samples(bow: f64) -> Value {
    let points: Vec<Value> = (0..=25)
        .map(|i| {
            let f = i as f64 / 25.0;
            let sway = bow * (f * std::f64::consts::PI).sin();
            json!({
                "timestamp_ms": 1_000 + i * 40,
                "x": 400.0 + 250.0 * f + sway,
                "y": 650.0 - 420.0 * f,
            })
        })
        .collect();
    Value::Array(points)
}

fn layout() -> Value {
    json!({"options": ["option0", "option1"], "chosen": "option1"})
}

#[test]
fn test_config_init_and_show() {
    let env = CliTestEnv::new();

    let stdout = env.run_expect_success(&["config", "init"]);
    assert!(stdout.contains("Configuration written to"));
    assert!(env.dir.path().join("pathsense.json").exists());

    let stdout = env.run_expect_success(&["config", "show"]);
    let config: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(config["hover"]["period_ms"], 1000.0);
    assert_eq!(config["layout"]["middle_option"], "option1");
}

#[test]
fn test_extract_prints_feature_set() {
    let env = CliTestEnv::new();
    let capture = env.write_json(
        "capture.json",
        &json!({"question_type": "bipartite_choice", "samples": samples(0.0), "layout": layout()}),
    );

    let stdout = env.run_expect_success(&["extract", capture.to_str().unwrap()]);
    let features: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(features["pathCrossing"], json!([0.0, "series"]));
    assert_eq!(features["otherQuadrant"], json!([false, "bool"]));
    assert_eq!(features["numHover"][1], "series");
}

#[test]
fn test_extract_rejects_stacked_layout() {
    let env = CliTestEnv::new();
    let stacked: Vec<Value> = (0..10)
        .map(|i| json!({"timestamp_ms": i * 50, "x": 300.0, "y": 600.0 - 30.0 * i as f64}))
        .collect();
    let capture = env.write_json("stacked.json", &json!({"samples": stacked, "layout": layout()}));

    let (success, _, stderr) = env.run(&["extract", capture.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Failed to normalize capture"));
}

#[test]
fn test_process_population() {
    let env = CliTestEnv::new();

    let records: Vec<Value> = (0..8)
        .flat_map(|p| {
            let participant = format!("participant-{p}");
            [
                json!({
                    "unique_id": p * 2,
                    "participant": participant,
                    "question_type": "bipartite_choice",
                    "question_stimulus": "Would you recommend us?",
                    "response": "Yes",
                    "qlabel": "recommend",
                    "input": {"capture": {"samples": samples(p as f64 * 12.0), "layout": layout()}},
                }),
                json!({
                    "unique_id": p * 2 + 1,
                    "participant": participant,
                    "question_type": "bipartite_choice",
                    "question_stimulus": "Is the sky blue?",
                    "response": "Yes",
                    "qlabel": "sky",
                    "input": {"capture": {"samples": samples(40.0 - p as f64 * 4.0), "layout": layout()}},
                }),
            ]
        })
        .collect();
    let input = env.write_json("survey.json", &Value::Array(records));
    let key = env.write_json(
        "key.json",
        &json!({
            "recommend": {"short_code": "nps", "category": "opinion", "title": "Would you recommend us?"},
            "sky": {"short_code": "sky", "category": "benchmark"},
        }),
    );

    let stdout = env.run_expect_success(&[
        "process",
        input.to_str().unwrap(),
        "--question-key",
        key.to_str().unwrap(),
        "--threads",
        "3",
    ]);
    assert!(stdout.contains("=== Batch Summary ==="));
    assert!(stdout.contains("Scored:       16"));
    assert!(stdout.contains("Failures:     0"));

    let report_path = env.dir.path().join("survey.report.json");
    assert!(report_path.exists());
    let report: Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["total_records"], 16);
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 16);

    let entry = &report["profiles"]["participant-3"]["entries"]["opinion"]["nps"];
    assert_eq!(entry["answer"], "Yes");
    assert!(entry["certainty"].is_f64());
    let benchmark = &report["profiles"]["participant-3"]["entries"]["benchmark"]["sky"];
    assert!(benchmark["certainty"].is_f64());
}

#[test]
fn test_process_missing_input_fails() {
    let env = CliTestEnv::new();
    let (success, _, stderr) = env.run(&["process", "/nonexistent/survey.json"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read survey records"));
}
