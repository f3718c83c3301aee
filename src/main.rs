use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qaflow::agent::claude::ClaudeClient;
use qaflow::agent::{ClaudeExecutor, FixtureExecutor, TaskExecutor};
use qaflow::config::{AppConfig, AutoDecision, ReviewMode};
use qaflow::review::{AutoReviewer, ConsoleReviewer, Reviewer};
use qaflow::shutdown::wait_for_shutdown;
use qaflow::workflow::{execute, WorkflowRun};
use qaflow::workspace::RunStore;

#[derive(Parser)]
#[command(name = "qaflow", about = "Run phased QA-automation processes")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available processes
    List,
    /// Run a process to completion
    Run {
        /// Process id, e.g. api-testing
        process: String,
        /// JSON file with the process inputs
        #[arg(short, long)]
        inputs: Option<PathBuf>,
        /// Answer tasks from canned JSON files instead of calling Claude
        #[arg(long)]
        fixtures: Option<PathBuf>,
        /// Approve every breakpoint without prompting
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the run record.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Command::List => {
            for process in qaflow::processes::all() {
                println!("{:<24} {}", process.id(), process.description());
            }
            Ok(())
        }
        Command::Run {
            process,
            inputs,
            fixtures,
            auto_approve,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            run(&config, &process, inputs, fixtures, auto_approve).await
        }
    }
}

async fn run(
    config: &AppConfig,
    process_id: &str,
    inputs: Option<PathBuf>,
    fixtures: Option<PathBuf>,
    auto_approve: bool,
) -> anyhow::Result<()> {
    let process = qaflow::processes::find(process_id)?;

    let inputs: Value = match inputs {
        Some(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading inputs from {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing inputs from {}", path.display()))?
        }
        None => Value::Null,
    };

    let executor: Arc<dyn TaskExecutor> = match fixtures {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Replaying task fixtures");
            Arc::new(FixtureExecutor::new(dir))
        }
        None => {
            let client = ClaudeClient::from_config(&config.claude, config.claude_api_key()?);
            Arc::new(ClaudeExecutor::new(client, config.claude.max_turns))
        }
    };

    let reviewer: Arc<dyn Reviewer> = if auto_approve {
        Arc::new(AutoReviewer::new(AutoDecision::Approve))
    } else if config.review.mode == ReviewMode::Auto {
        Arc::new(AutoReviewer::new(config.review.auto_decision))
    } else {
        Arc::new(ConsoleReviewer::stdio())
    };

    let run = WorkflowRun::new(process.id(), executor, reviewer);
    let store = RunStore::create(&config.runner, process.id(), run.run_id()).await?;
    tracing::info!(
        process = process.id(),
        run_id = %run.run_id(),
        dir = %store.root().display(),
        "Starting run"
    );
    let run = run.with_store(store);

    let record = tokio::select! {
        record = execute(process.as_ref(), inputs, run) => record?,
        _ = wait_for_shutdown() => {
            anyhow::bail!("Run interrupted before completion");
        }
    };

    println!("{}", serde_json::to_string_pretty(&record)?);

    if !record.success {
        std::process::exit(1);
    }
    Ok(())
}
