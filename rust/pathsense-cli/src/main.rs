use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pathsense_core::config::PathsenseConfig;
use pathsense_core::{
    normalize, BatchProcessor, BatchReport, Layout, PathFeatures, QuestionKey, QuestionType,
    RawCapture, SurveyRecord,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Decision certainty from cursor trajectories", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a population of survey records
    Process {
        /// JSON array of survey records
        input: PathBuf,
        /// Output file (default: <input>.report.json)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Question key mapping qlabel to short code and category
        #[arg(long)]
        question_key: Option<PathBuf>,
        /// Extraction threads (default: from config)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Extract the feature set of a single capture
    Extract {
        /// Capture file with question_type, samples and layout
        capture: PathBuf,
    },
    /// Show or initialize the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the configuration file to the data directory
    Init,
}

/// A single capture as accepted by `extract`.
#[derive(Deserialize)]
struct CaptureFile {
    #[serde(default = "default_question_type")]
    question_type: QuestionType,
    samples: RawCapture,
    layout: Layout,
}

fn default_question_type() -> QuestionType {
    QuestionType::BipartiteChoice
}

/// Get the pathsense data directory
fn pathsense_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PATHSENSE_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".pathsense"))
}

fn load_config() -> Result<PathsenseConfig> {
    let dir = pathsense_dir()?;
    PathsenseConfig::load_or_default(&dir)
        .with_context(|| format!("Failed to load configuration from {:?}", dir))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {what}: {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {what}: {:?}", path))
}

fn default_report_path(input: &Path) -> PathBuf {
    input.with_extension("report.json")
}

// =============================================================================
// Command Implementations
// =============================================================================

fn cmd_process(
    input: &Path,
    output: Option<PathBuf>,
    question_key: Option<PathBuf>,
    threads: Option<usize>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(threads) = threads {
        config.batch.worker_threads = threads;
    }

    let records: Vec<SurveyRecord> = read_json(input, "survey records")?;
    let key: QuestionKey = match &question_key {
        Some(path) => read_json(path, "question key")?,
        None => QuestionKey::default(),
    };
    tracing::info!(
        records = records.len(),
        questions = key.len(),
        "Loaded survey records from {:?}",
        input
    );

    let report = BatchProcessor::new(&config).run(&records, &key);

    let out_path = output.unwrap_or_else(|| default_report_path(input));
    let raw = serde_json::to_string_pretty(&report)?;
    fs::write(&out_path, raw).with_context(|| format!("Failed to write report: {:?}", out_path))?;

    print_summary(&report);
    println!("Report written to: {}", out_path.display());
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!("=== Batch Summary ===");
    println!();
    println!("Processed at: {}", report.processed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Records:      {}", report.total_records);
    println!("Extracted:    {}", report.extracted);
    println!("Scored:       {}", report.scored);
    println!("Failures:     {}", report.failures);
    println!("Participants: {}", report.profiles.len());

    if let Some(deciles) = &report.deciles {
        println!(
            "Certainty:    mean {:.2}, sd {:.2}",
            deciles.mean, deciles.std_dev
        );
    }

    let suspects = report
        .outcomes
        .iter()
        .filter(|o| o.suspect_automation == Some(true))
        .count();
    if suspects > 0 {
        println!("Suspect automation: {}", suspects);
    }
    println!();
}

fn cmd_extract(capture: &Path) -> Result<()> {
    let config = load_config()?;
    let file: CaptureFile = read_json(capture, "capture")?;

    let path = normalize(
        &file.samples,
        &file.question_type,
        &file.layout,
        &config.layout.middle_option,
    )
    .context("Failed to normalize capture")?;
    let features = PathFeatures::new(config.hover.clone())
        .extract(&path)
        .context("Failed to extract features")?;

    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let config = load_config()?;
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Init => {
            config.persist()?;
            println!(
                "Configuration written to: {}",
                config.data_dir.join(pathsense_core::config::CONFIG_FILE).display()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            input,
            output,
            question_key,
            threads,
        } => {
            cmd_process(&input, output, question_key, threads)?;
        }
        Commands::Extract { capture } => {
            cmd_extract(&capture)?;
        }
        Commands::Config { action } => {
            cmd_config(action)?;
        }
    }

    Ok(())
}
