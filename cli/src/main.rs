//! Petriflow CLI - runs a workflow description through the stage pipeline.
//!
//! ```text
//! main() -> load config -> Workspace::new(HttpStageBackend)
//!        -> parse -> build -> validate -> simulate   (advance after each success)
//!        -> print mutation commands until the scheduler is idle
//!        -> export the filtered trace
//! ```
//!
//! Logs go to `~/.petriflow/logs/petriflow.log` so stdout carries only the
//! command stream and the export.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use petriflow_config::PetriflowConfig;
use petriflow_engine::petriflow_stages::HttpStageBackend;
use petriflow_engine::petriflow_types::{AnimationSpeed, MutationCommand, Stage};
use petriflow_engine::{
    EngineSettings, EventTypeFilter, ExportError, ExportFormat, StageCompletion, StageInput,
    TraceFilter, Workspace,
};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Turn natural-language workflows into verified, animated Petri nets.
#[derive(Parser)]
#[command(name = "petriflow", version, about)]
struct Cli {
    /// Config file (defaults to ~/.petriflow/config.toml or $PETRIFLOW_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all four stages for a workflow description
    Run(RunArgs),
    /// Print the config file location in use
    ConfigPath,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Workflow description, e.g. "run tests then deploy"
    prompt: String,
    /// Simulation seed for reproducible traces
    #[arg(long)]
    seed: Option<u64>,
    /// Upper bound on simulation steps
    #[arg(long)]
    max_steps: Option<u32>,
    /// Animation speed multiplier
    #[arg(long)]
    speed: Option<f64>,
    /// Export the trace after the run (ndjson, json, csv)
    #[arg(long)]
    export: Option<ExportFormat>,
    /// Write the export here instead of stdout
    #[arg(long, requires = "export")]
    out: Option<PathBuf>,
    /// Case-insensitive search over transition name, id and event type
    #[arg(long, default_value = "")]
    filter: String,
    /// Only export events of this type ("all" for every type)
    #[arg(long, default_value = "all")]
    event_type: String,
    /// Do not print mutation commands
    #[arg(long)]
    quiet: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Stdout is reserved for output; fall back to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_path) = PetriflowConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("petriflow.log"));
    }

    candidates.push(PathBuf::from(".petriflow").join("logs").join("petriflow.log"));

    candidates
}

fn load_config(explicit: Option<&Path>) -> Result<PetriflowConfig> {
    if let Some(path) = explicit {
        return PetriflowConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }
    Ok(PetriflowConfig::load()?.unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::ConfigPath => {
            let path = cli
                .config
                .or_else(PetriflowConfig::path)
                .context("no home directory to hold the config file")?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            tokio::select! {
                result = run(&config, args) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    eprintln!("Interrupted");
                    Ok(())
                }
            }
        }
    }
}

async fn run(config: &PetriflowConfig, args: RunArgs) -> Result<()> {
    let settings = EngineSettings::from_config(config).context("invalid engine settings")?;
    let backend = HttpStageBackend::from_config(&config.service)
        .context("invalid stage service configuration")?;
    tracing::info!(base_url = backend.base_url(), "Using stage service");

    let (mut workspace, commands) = Workspace::new(Arc::new(backend), settings);
    if let Some(speed) = args.speed {
        workspace.set_speed(AnimationSpeed::new(speed)?);
    }
    let printer = tokio::spawn(print_commands(commands, args.quiet));

    for stage in Stage::ALL {
        let input = match stage {
            Stage::Parse => StageInput::parse(args.prompt.as_str()),
            Stage::Build => StageInput::Build,
            Stage::Validate => StageInput::Validate,
            Stage::Simulate => StageInput::Simulate {
                seed: args.seed,
                max_steps: args.max_steps,
            },
        };
        eprintln!("{}...", stage.display_name());
        let completion = workspace.run_current_stage(input).await?;
        report(&completion)?;
        if stage.next().is_some() {
            workspace.advance()?;
        }
    }

    while workspace.scheduler().is_dispatching() {
        tokio::time::sleep(IDLE_POLL).await;
    }

    if let Some(format) = args.export {
        let filter = TraceFilter::new(&args.filter, EventTypeFilter::parse(&args.event_type));
        let exported = match workspace.trace().export(&filter, format) {
            Ok(exported) => exported,
            Err(ExportError::NothingToExport) => {
                eprintln!("Nothing to export: no trace events match the filter");
                return finish(workspace, printer).await;
            }
            Err(e) => return Err(e.into()),
        };
        match &args.out {
            Some(path) => {
                fs::write(path, exported)
                    .with_context(|| format!("writing export to {}", path.display()))?;
                eprintln!("Wrote {} ({})", path.display(), format.mime_type());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(exported.as_bytes())?;
                stdout.flush()?;
            }
        }
    }

    finish(workspace, printer).await
}

/// Drop the workspace so the command stream closes, then drain the printer.
async fn finish(workspace: Workspace, printer: JoinHandle<()>) -> Result<()> {
    drop(workspace);
    printer.await?;
    Ok(())
}

fn report(completion: &StageCompletion) -> Result<()> {
    match completion {
        StageCompletion::Succeeded { stage, duration } => {
            eprintln!("{stage} done in {} ms", duration.as_millis());
            Ok(())
        }
        StageCompletion::Failed { stage, error, .. } => {
            eprintln!("{stage} failed: {}", error.message);
            for suggestion in &error.suggestions {
                eprintln!("  - {suggestion}");
            }
            bail!("{stage} failed")
        }
    }
}

async fn print_commands(mut commands: mpsc::UnboundedReceiver<MutationCommand>, quiet: bool) {
    while let Some(command) = commands.recv().await {
        if quiet {
            continue;
        }
        let transition = command
            .transition_id
            .as_ref()
            .map(|id| format!(" via {id}"))
            .unwrap_or_default();
        println!(
            "#{} {} {} {:+} -> {}{transition}",
            command.sequence,
            command.kind.as_str(),
            command.place_id,
            command.delta(),
            command.place_tokens,
        );
    }
}
