use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agent_coord::config::{CoordConfig, CoordPaths};
use agent_coord::error::Result;
use agent_coord::hooks::{
    self, run_communication_hook, run_learning_hook, run_plan_tracker_hook,
};
use agent_coord::{CommunicationEngine, LearningEngine};

#[derive(Parser)]
#[command(name = "agent-coord", about = "Filesystem-backed coordination hooks for multi-agent orchestration")]
struct Cli {
    /// Coordination directory (default: <project root>/.coord)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable debug logging (stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Agent-communication hook: JSON on stdin, JSON on stdout
    Communication,
    /// Plan-tracker hook: JSON on stdin, JSON on stdout
    PlanTracker,
    /// Learning-engine hook: JSON on stdin, JSON on stdout
    LearningEngine,
    /// Periodic retention sweep over audit logs and learning history
    SweepLogs,
}

impl Commands {
    fn hook_name(&self) -> Option<&'static str> {
        match self {
            Self::Communication => Some(hooks::COMMUNICATION_HOOK),
            Self::PlanTracker => Some(hooks::PLAN_TRACKER_HOOK),
            Self::LearningEngine => Some(hooks::LEARNING_HOOK),
            Self::SweepLogs => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("agent-coord: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logging goes to stderr: stdout is reserved for the hook's JSON response.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("agent_coord=debug")
    } else {
        EnvFilter::new("agent_coord=info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(hook) = cli.command.hook_name() {
        return run_hook(hook, &cli.command, cli.dir).await;
    }

    let paths = CoordPaths::discover(cli.dir)?;
    let config = CoordConfig::load(&paths.coord_dir).await?;
    let comms = CommunicationEngine::new(&paths, &config);
    let mut learning = LearningEngine::new(&paths, &config);
    let removed = comms.sweep_logs().await? + learning.compact_history().await?;
    println!("{}", serde_json::json!({"success": true, "removed": removed}));
    Ok(())
}

/// Drive one hook invocation. Setup failures become structured JSON on
/// stdout, not a non-zero exit; the orchestrating caller always gets
/// parseable output for non-empty input.
async fn run_hook(hook: &'static str, command: &Commands, dir: Option<PathBuf>) -> Result<()> {
    let input = read_stdin().await?;
    if input.trim().is_empty() {
        return Ok(());
    }

    let response = match setup(dir).await {
        Ok((paths, config)) => match command {
            Commands::Communication => run_communication_hook(&paths, &config, &input).await,
            Commands::PlanTracker => run_plan_tracker_hook(&paths, &input).await,
            Commands::LearningEngine => run_learning_hook(&paths, &config, &input).await,
            Commands::SweepLogs => unreachable!("sweep-logs is not a hook"),
        },
        Err(e) => Some(hooks::error_response(hook, &e)),
    };

    if let Some(response) = response {
        print_response(&response)?;
    }
    Ok(())
}

async fn setup(dir: Option<PathBuf>) -> Result<(CoordPaths, CoordConfig)> {
    let paths = CoordPaths::discover(dir)?;
    let config = CoordConfig::load(&paths.coord_dir).await?;
    Ok((paths, config))
}

async fn read_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(input)
}

fn print_response(response: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}
