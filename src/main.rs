use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use docflow_core::config::AppConfig;
use docflow_core::event::EventBus;
use docflow_core::types::DocumentationState;

use docflow_agent::{Collaborators, DocumentationWorkflow, ExecutionResult, QualityGate, RunLogger};
use docflow_tools::{FilePublisher, SimulatedModel, WorkspaceScanner};

#[derive(Parser)]
#[command(
    name = "docflow",
    version,
    about = "Quality-gated documentation generation across a workspace of repositories"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "docflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a workspace and generate documentation for every repository
    Run {
        /// Workspace directory (defaults to `workflow.workspace` from config)
        workspace: Option<PathBuf>,
        /// Abort after this many node invocations (0 = no limit)
        #[arg(long)]
        max_steps: Option<usize>,
        /// Print the final state and trace as JSON
        #[arg(long)]
        json: bool,
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
    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run {
        workspace: None,
        max_steps: None,
        json: false,
    });

    match command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docflow", &mut std::io::stdout());
        }
        Commands::Config => {
            let config = load_config(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run {
            workspace,
            max_steps,
            json,
        } => {
            let config = load_config(&cli.config)?;
            let workspace = workspace.unwrap_or_else(|| config.workspace_dir());
            run(&config, &workspace, max_steps, json).await?;
        }
    }

    Ok(())
}

/// Load the config file, falling back to `~/.docflow/config.toml`, then to defaults.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    if let Some(home_config) = dirs_home().map(|h| h.join(".docflow").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    info!("No config file found, using defaults");
    Ok(AppConfig::default())
}

async fn run(
    config: &AppConfig,
    workspace: &Path,
    max_steps: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    if !workspace.is_dir() {
        anyhow::bail!("workspace {} is not a directory", workspace.display());
    }
    let output_dir = workspace.join(&config.output.dir_name);

    let model = Arc::new(SimulatedModel::from_config(
        &config.model,
        config.quality.default_score,
    ));
    let collaborators = Collaborators {
        scanner: Arc::new(
            WorkspaceScanner::new(workspace).skip_dir(config.output.dir_name.clone()),
        ),
        generator: model.clone(),
        assessor: model.clone(),
        improver: model,
        publisher: Arc::new(
            FilePublisher::new(&output_dir).with_quality(config.quality.clone()),
        ),
    };
    let workflow = DocumentationWorkflow::new(collaborators, QualityGate::from(&config.quality));

    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    // Graceful shutdown on Ctrl-C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("Interrupted, cancelling run");
        cancel_clone.cancel();
    });

    let mut executor = workflow
        .compile()?
        .with_cancel_token(cancel.clone())
        .with_event_bus(event_bus.clone());
    let limit = match max_steps {
        Some(0) => None,
        Some(n) => Some(n),
        None => config.step_limit(),
    };
    if let Some(limit) = limit {
        executor = executor.with_max_steps(limit);
    }

    // The logger stops by itself on RunComplete or RunError.
    let logger = config.log_dir(workspace).map(|log_dir| {
        let level = config.log.as_ref().map(|l| l.level).unwrap_or(2);
        info!(dir = %log_dir.display(), level, "Run log enabled");
        RunLogger::new(log_dir, level).spawn(&event_bus, CancellationToken::new())
    });

    info!(workspace = %workspace.display(), "Starting documentation run");
    let outcome = executor.execute(DocumentationState::new()).await;

    if let Some(handle) = logger {
        handle.await.ok();
    }

    match outcome {
        Ok(result) => {
            if json {
                print_json(&result)?;
            } else {
                print_summary(&result, &output_dir);
            }
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            error!("Run cancelled before completion");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(result: &ExecutionResult<DocumentationState>, output_dir: &Path) {
    let state = &result.state;
    let stats = &state.stats;

    println!(
        "Run {} finished in {} steps ({} ms)",
        result.run_id,
        result.steps(),
        result.total_elapsed_ms
    );
    if let Some(strategy) = &state.documentation_strategy {
        println!("  Strategy:      {}", strategy);
    }
    println!(
        "  Repositories:  {} scanned, {} documented, {} skipped",
        stats.repositories_scanned,
        state.generated_docs.len(),
        stats.forced_skips
    );
    println!(
        "  Documents:     {} generated, {} improvement passes, {} tokens",
        stats.documents_generated, stats.improvement_passes, stats.total_tokens_used
    );
    match state.average_quality() {
        Some(avg) => println!("  Avg quality:   {:.2}", avg),
        None => println!("  Avg quality:   n/a"),
    }
    for (repo, score) in &state.quality_scores {
        println!("    {:<24} {:.2}", repo, score);
    }
    for problem in &state.error_log {
        println!("  ! {}", problem);
    }
    println!("  Output:        {}", output_dir.display());
}

fn print_json(result: &ExecutionResult<DocumentationState>) -> anyhow::Result<()> {
    let value = serde_json::json!({
        "run_id": result.run_id.to_string(),
        "steps": result.steps(),
        "elapsed_ms": result.total_elapsed_ms,
        "trace": result.trace,
        "state": result.state,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
