//! codecheck CLI - runs one submission against a set of test cases.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use codecheck::config::{self, Config};
use codecheck::event::{EventPublisher, KafkaPublisher, LoggingPublisher};
use codecheck::harness::cpp::CppDoctestGenerator;
use codecheck::model::ExecutionRequest;
use codecheck::pipeline::Coordinator;
use codecheck::repository::{
    InMemoryExecutionRepository, InMemoryHarnessRepository, InMemoryTestResultRepository,
};
use codecheck::sandbox::docker::DockerProvider;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "codecheck")]
#[command(about = "Runs a submission against a set of test cases in a sandboxed container")]
#[command(version)]
struct Cli {
    /// Path to a JSON file containing an ExecutionRequest.
    request: PathBuf,

    /// Configuration file path.
    #[arg(short, long, default_value = "codecheck.toml")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = if cli.config.exists() {
        config::load_config(&cli.config)
            .with_context(|| format!("failed to load config from {}", cli.config.display()))?
    } else {
        info!("no config file found at {}, using defaults", cli.config.display());
        Config::default()
    };

    let request_json = std::fs::read_to_string(&cli.request)
        .with_context(|| format!("failed to read request file {}", cli.request.display()))?;
    let request: ExecutionRequest = serde_json::from_str(&request_json)
        .context("request file is not a valid ExecutionRequest")?;

    let events: Arc<dyn EventPublisher> = if config.event_bus.enabled {
        Arc::new(
            KafkaPublisher::new(&config.event_bus.bootstrap_servers, &config.event_bus.topic)
                .context("failed to initialize Kafka publisher")?,
        )
    } else {
        Arc::new(LoggingPublisher)
    };

    let sandbox_provider =
        DockerProvider::connect_local().context("failed to connect to the Docker daemon")?;

    let coordinator = Coordinator::new(
        Arc::new(InMemoryExecutionRepository::new()),
        Arc::new(InMemoryHarnessRepository::new()),
        Arc::new(InMemoryTestResultRepository::new()),
        events,
        Arc::new(CppDoctestGenerator),
        sandbox_provider,
        config.server_instance.clone(),
    );

    let outcome = coordinator.run(request, CancellationToken::new()).await?;

    info!(
        execution_id = %outcome.execution_id,
        success = outcome.success,
        "execution finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn outcome_json(outcome: &codecheck::PipelineOutcome) -> serde_json::Value {
    serde_json::json!({
        "execution_id": outcome.execution_id,
        "success": outcome.success,
        "message": outcome.message,
        "approved_test_ids": outcome.approved_test_ids,
    })
}
