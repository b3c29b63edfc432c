//! churn-pipeline entrypoint: train, monitor drift, or score one user's events.
//! Reports go to stdout as JSON lines; logs go to stderr.

use churn_pipeline::{
    events::load_event_log,
    monitoring::run_monitoring,
    storage::load_model,
    PipelineConfig, PredictionService, StructuredLogger, TrainingOrchestrator,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "churn-pipeline")]
#[command(about = "Customer churn feature pipeline, training and drift monitoring", long_about = None)]
struct Cli {
    /// Pipeline config (JSON); defaults apply when the file is missing
    #[arg(long, global = true, env = "CHURN_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build features, split, fit and persist artifacts
    Train {
        /// Event log to train on, overriding data_path
        #[arg(long)]
        data: Option<PathBuf>,

        /// Copy the fitted model into the registry
        #[arg(long)]
        register: bool,
    },

    /// Compare baseline and current feature tables (and metrics)
    Monitor,

    /// Score one user's events against the trained model
    Predict {
        /// NDJSON events for a single user
        #[arg(long)]
        events: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let mut config = PipelineConfig::load(&cli.config)?;
    StructuredLogger::init(config.log.json, &config.log.level)?;
    info!(config = %cli.config.display(), "churn-pipeline starting");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Train { data, register } => {
            if let Some(path) = data {
                config.data_path = path;
            }
            let report = TrainingOrchestrator::new()
                .with_registration(register)
                .run(&config)?;
            StructuredLogger::emit_json(&report, &mut stdout)?;
        }
        Commands::Monitor => {
            let outcome = run_monitoring(&config.monitoring)?;
            StructuredLogger::emit_json(&outcome, &mut stdout)?;
        }
        Commands::Predict { events } => {
            let model = load_model(&config.artifacts_dir.join(churn_pipeline::storage::MODEL_FILE))?;
            let service = PredictionService::install(PredictionService::new(
                config.features.clone(),
                Box::new(model),
                config.serving.decision_threshold,
            ))?;
            let response = service.predict(&load_event_log(&events)?)?;
            StructuredLogger::emit_json(&response, &mut stdout)?;
        }
    }
    Ok(())
}
