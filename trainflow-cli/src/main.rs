//! trainflow CLI entry point.
//!
//! Resolves settings, initialises logging and runs one training pipeline.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use trainflow::config::{DatasetSchema, Settings};
use trainflow::connectors::Connectors;
use trainflow::observability::logging;
use trainflow::pipeline::TrainPipeline;

/// Exit code when the candidate was rejected and `--fail-on-reject` is set.
const EXIT_REJECTED: u8 = 2;

/// Staged training pipeline for the vehicle-insurance classifier.
#[derive(Parser, Debug)]
#[command(name = "trainflow")]
#[command(about = "Train, evaluate and publish a tabular classifier")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once and print the run report as JSON.
    Run(RunArgs),

    /// Print the resolved settings with secrets redacted.
    ShowConfig(EnvArgs),
}

#[derive(Args, Debug)]
struct EnvArgs {
    /// Env file layered under the process environment (default: ./.env if present).
    #[arg(long, env = "TRAINFLOW_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    env: EnvArgs,

    /// Dataset schema YAML, overriding SCHEMA_FILE_PATH.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Emit JSON lines on the console.
    #[arg(long)]
    json_logs: bool,

    /// Exit with code 2 when the candidate model is not accepted.
    #[arg(long)]
    fail_on_reject: bool,
}

fn resolve_settings(args: &EnvArgs) -> anyhow::Result<Settings> {
    Settings::from_env(args.env_file.as_deref()).context("failed to resolve settings")
}

async fn execute(settings: Settings, fail_on_reject: bool) -> anyhow::Result<ExitCode> {
    let schema_path = settings.pipeline.schema_file_path.clone();
    let schema = DatasetSchema::from_yaml_file(&schema_path)
        .with_context(|| format!("failed to load schema {}", schema_path.display()))?;
    let connectors = Connectors::from_settings(&settings);

    let mut pipeline = TrainPipeline::new(settings, schema, connectors);
    match pipeline.run().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            if fail_on_reject && !report.outcome.is_pushed() {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if let Some(failure) = pipeline.failure() {
                println!("{}", serde_json::to_string_pretty(failure)?);
            }
            Err(err).context("training pipeline failed")
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut settings = resolve_settings(&args.env)?;
    if let Some(schema) = args.schema {
        settings.pipeline.schema_file_path = schema;
    }
    if args.json_logs {
        settings.logging.json = true;
    }

    let guard = logging::init(&settings.logging).context("failed to initialise logging")?;
    let result = execute(settings, args.fail_on_reject).await;
    if let Err(err) = &result {
        error!(error = format!("{err:#}"), "Run failed");
    }
    guard.shutdown().context("failed to flush log file")?;
    result
}

fn show_config(args: &EnvArgs) -> anyhow::Result<ExitCode> {
    let settings = resolve_settings(args)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::ShowConfig(args) => show_config(&args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
