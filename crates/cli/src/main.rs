//! The `stride` binary: run one step of agent work from the command line
//! and print the event stream.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stride_client::{ModelClient, OpenAiCompatBackend};
use stride_config::AppConfig;
use stride_core::{AgentEvent, Step};
use stride_engine::{StepEngine, TaskContext};
use stride_sandbox::Sandbox;

#[derive(Parser, Debug)]
#[command(name = "stride", version, about = "Run one step of agent work in a local sandbox")]
struct Cli {
    /// What the step should accomplish
    description: String,

    /// Extra context passed alongside the step
    #[arg(short, long, default_value = "")]
    message: String,

    /// Path to a TOML config file; falls back to environment variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit a closing summary after the step finishes
    #[arg(long)]
    summarize: bool,

    /// Print events as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::from_env().context("loading config from environment")?,
    };

    let api_key = config
        .api_key
        .clone()
        .context("no API key configured; set STRIDE_API_KEY or api_key in the config file")?;

    let backend = OpenAiCompatBackend::new("openai-compat", config.api_base.clone(), api_key)
        .context("building completion backend")?;
    let client = ModelClient::new(Arc::new(backend), config.model.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    let sandbox = Arc::new(
        Sandbox::new(&config.sandbox_root)
            .with_context(|| format!("creating sandbox at {}", config.sandbox_root))?,
    );
    info!(id = sandbox.id(), root = %sandbox.root().display(), "sandbox ready");

    let registry = stride_tools::builtin_registry(sandbox.clone());
    let engine = StepEngine::new(client, registry).with_sandbox(sandbox.clone());
    let ctx = TaskContext::new().with_working_language(config.working_language.clone());

    let step = Step::new(cli.description.clone());
    let mut events = ReceiverStream::new(engine.execute_step(&ctx, step, &cli.message));
    while let Some(event) = events.next().await {
        print_event(&event, cli.json)?;
    }

    if cli.summarize {
        let mut events = ReceiverStream::new(engine.summarize(&ctx));
        while let Some(event) = events.next().await {
            print_event(&event, cli.json)?;
        }
    }

    sandbox.destroy().await;
    Ok(())
}

fn print_event(event: &AgentEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        AgentEvent::Step { status, step } => {
            println!("[step {status:?}] {}", step.description);
            if let Some(error) = &step.error {
                println!("  error: {error}");
            }
        }
        AgentEvent::Message { text, attachments } => {
            println!("{text}");
            for file in attachments {
                println!("  attachment: {}", file.path);
            }
        }
        AgentEvent::Tool { name, status, .. } => {
            println!("[tool {status:?}] {name}");
        }
        AgentEvent::Error { error } => {
            eprintln!("error: {error}");
        }
        AgentEvent::Wait => {
            println!("[waiting for user input]");
        }
        AgentEvent::Done => {}
    }
    Ok(())
}
