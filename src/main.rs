use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowwatch_core::config::AppConfig;
use flowwatch_core::traits::EngineApi;
use flowwatch_core::types::{RunId, RunRecord, WorkflowId};
use flowwatch_sync::{OutputExtractor, SessionSettings, WatchSession};

const DEFAULT_CONFIG: &str = "flowwatch.toml";
const DEFAULT_FILTER: &str = "flowwatch=info,warn";

#[derive(Parser)]
#[command(name = "flowwatch", version, about = "Watch and re-run workflow executions")]
struct Cli {
    /// Path to config file (default: flowwatch.toml, optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine base URL, overriding the config file
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflows
    List,
    /// Create the example article-summarizer workflow
    Example,
    /// Watch a workflow's runs in the terminal UI
    Watch {
        /// Workflow ID
        workflow_id: String,
    },
    /// Start a run with trigger data
    Start {
        /// Workflow ID
        workflow_id: String,
        /// Raw trigger data as JSON
        #[arg(long, conflicts_with = "url")]
        data: Option<String>,
        /// Article URL (repeatable), sent as {"article_urls": [...]}
        #[arg(long)]
        url: Vec<String>,
        /// Open the watch UI after starting
        #[arg(long)]
        watch: bool,
    },
    /// Start a new run with the trigger input of an earlier run
    Rerun {
        /// Run ID to take the trigger input from
        run_id: String,
    },
    /// Show per-node status of a run
    Status {
        /// Run ID
        run_id: String,
    },
    /// Print a run's output as text
    Output {
        /// Run ID
        run_id: String,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "flowwatch", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.engine.base_url = url.clone();
    }

    let tui = matches!(
        cli.command,
        Commands::Watch { .. } | Commands::Start { watch: true, .. }
    );
    init_tracing(&config, tui)?;

    let engine = flowwatch_client::create_client(&config.engine)?;
    info!(base_url = %config.engine.base_url, "Using engine");

    match cli.command {
        Commands::List => {
            let workflows = engine.list_workflows().await?;
            if workflows.is_empty() {
                println!("No workflows. Create one with `flowwatch example`.");
            }
            for wf in workflows {
                let created = wf.created_at.map(|t| t.to_string()).unwrap_or_default();
                println!("{:<38} {:<30} {}", wf.id, wf.name, created);
                if let Some(desc) = wf.description.filter(|d| !d.is_empty()) {
                    println!("{:<38} {}", "", desc);
                }
            }
        }
        Commands::Example => {
            let wf = engine.create_example_workflow().await?;
            println!("Created workflow {} ({})", wf.id, wf.name);
        }
        Commands::Watch { workflow_id } => {
            watch(engine, &config, WorkflowId::from_str(&workflow_id)).await?;
        }
        Commands::Start {
            workflow_id,
            data,
            url,
            watch: open_watch,
        } => {
            let workflow_id = WorkflowId::from_str(&workflow_id);
            let trigger_data = trigger_data(data.as_deref(), &url)?;
            let started = engine.start_run(&workflow_id, trigger_data).await?;
            if !open_watch {
                println!("Started run {} ({})", started.id, started.status);
                if let Some(message) = started.message {
                    println!("{message}");
                }
            }
            info!(run = %started.id, "Run started");
            if open_watch {
                watch(engine, &config, workflow_id).await?;
            }
        }
        Commands::Rerun { run_id } => {
            let record = engine.get_run(&RunId::from_str(&run_id)).await?;
            let workflow_id = record
                .workflow_id
                .clone()
                .with_context(|| format!("run {run_id} has no workflow id"))?;
            let input = trigger_input(&record, &config.output.trigger_node_type);
            let new_run = engine.run_workflow(&workflow_id, input).await?;
            println!("Started run {new_run} of workflow {workflow_id}");
        }
        Commands::Status { run_id } => {
            let record = engine.get_run(&RunId::from_str(&run_id)).await?;
            print_status(&record);
        }
        Commands::Output { run_id } => {
            let record = engine.get_run(&RunId::from_str(&run_id)).await?;
            let extractor = OutputExtractor::new(config.output.summarizer_node_id.clone());
            let view = extractor
                .from_snapshot(&record.node_executions, &config.output.output_node_type)
                .with_context(|| format!("run {run_id} has no output yet ({})", record.status))?;
            print!("{}", view.to_text());
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(Path::new(DEFAULT_CONFIG))?,
    };
    Ok(config)
}

/// Log to stderr, or to the log file while the terminal UI owns the screen.
fn init_tracing(config: &AppConfig, tui: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if tui {
        let path = config.log_file();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log dir {}", dir.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
    Ok(())
}

async fn watch(
    engine: Arc<dyn EngineApi>,
    config: &AppConfig,
    workflow_id: WorkflowId,
) -> anyhow::Result<()> {
    let session = WatchSession::new(engine, workflow_id, SessionSettings::from_config(config));
    flowwatch_tui::run_tui(session).await
}

fn trigger_data(data: Option<&str>, urls: &[String]) -> anyhow::Result<serde_json::Value> {
    if let Some(raw) = data {
        return serde_json::from_str(raw).context("--data is not valid JSON");
    }
    if urls.is_empty() {
        return Ok(serde_json::json!({}));
    }
    Ok(serde_json::json!({ "article_urls": urls }))
}

fn trigger_input(record: &RunRecord, trigger_type: &str) -> serde_json::Value {
    record
        .node_executions
        .iter()
        .find(|ex| ex.node_type == trigger_type)
        .and_then(|ex| ex.input_data.clone())
        .or_else(|| record.trigger_data.clone())
        .unwrap_or_else(|| serde_json::json!({}))
}

fn print_status(record: &RunRecord) {
    let duration = flowwatch_core::types::elapsed_secs(record.started_at, record.completed_at)
        .map(|s| format!(" in {s}s"))
        .unwrap_or_default();
    println!("Run {} {}{}", record.id, record.status, duration);
    if let Some(err) = &record.error_message {
        println!("  error: {err}");
    }
    if record.node_executions.is_empty() {
        println!("  (no node executions yet)");
    }
    for ex in &record.node_executions {
        let secs = ex
            .duration_secs()
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<20} {:<12} {:<10} {:>5}", ex.node_id, ex.node_type, ex.status, secs);
        if let Some(err) = &ex.error_message {
            println!("    error: {err}");
        }
    }
}
