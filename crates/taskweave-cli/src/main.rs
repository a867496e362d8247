//! Taskweave CLI — run declarative agent workflows and inspect their tasks.
//!
//! Reuses the taskweave-core registry, ledger and workflow engine; the only
//! agents wired in here are the built-ins from `commands::agents`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use taskweave_cli::commands;
use taskweave_core::Settings;

/// Taskweave — workflow orchestration for agent pipelines
#[derive(Parser)]
#[command(name = "taskweave", version, about = "Taskweave — workflow orchestration for agent pipelines")]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(long, env = "TASKWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Task ledger file (overrides the settings file)
    #[arg(long, env = "TASKWEAVE_LEDGER")]
    ledger: Option<PathBuf>,

    /// Workflow directories, comma-separated (overrides the settings file)
    #[arg(long = "workflows", env = "TASKWEAVE_WORKFLOWS", value_delimiter = ',')]
    workflow_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List, validate and run workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Inspect and cancel tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// List workflows found in the workflow directories
    List,
    /// Validate a workflow YAML file without executing it
    Validate {
        /// Path to the workflow YAML file
        file: PathBuf,
    },
    /// Start a workflow and wait for it to finish
    Run {
        /// Workflow name
        name: String,
        /// Task parameter as key=value (repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        /// Print only the task id instead of the final status report
        #[arg(long)]
        detach: bool,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List active tasks
    List {
        /// Include completed, failed and cancelled tasks
        #[arg(long)]
        all: bool,
    },
    /// Show status, progress and step records of a task
    Status {
        /// Task ID
        id: String,
    },
    /// Show the full ledger record of a task
    Show {
        /// Task ID
        id: String,
    },
    /// Show the results of a completed task
    Artifacts {
        /// Task ID
        id: String,
    },
    /// Cancel a pending or running task
    Cancel {
        /// Task ID
        id: String,
    },
}

fn load_settings(cli: &Cli) -> Result<Settings, String> {
    let mut settings = Settings::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(ledger) = &cli.ledger {
        settings.ledger_path = ledger.clone();
    }
    if !cli.workflow_dirs.is_empty() {
        settings.workflow_dirs = cli.workflow_dirs.clone();
    }
    Ok(settings)
}

async fn dispatch(cli: Cli) -> Result<(), String> {
    let Some(command) = cli.command.as_ref() else {
        // No subcommand — show help
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        return Ok(());
    };

    // `validate` works on a file and needs neither ledger nor catalog.
    if let Commands::Workflow {
        action: WorkflowAction::Validate { file },
    } = command
    {
        return commands::workflow::validate(file);
    }

    let settings = load_settings(&cli)?;
    let registry = commands::init_registry(&settings)?;

    let result = match command {
        Commands::Workflow { action } => match action {
            WorkflowAction::List => commands::workflow::list(&registry),
            WorkflowAction::Validate { file } => commands::workflow::validate(file),
            WorkflowAction::Run {
                name,
                params,
                detach,
            } => {
                let params = commands::parse_params(params)?;
                commands::workflow::run(&registry, name, params, *detach).await
            }
        },
        Commands::Task { action } => match action {
            TaskAction::List { all } => commands::task::list(&registry, *all),
            TaskAction::Status { id } => commands::task::status(&registry, id),
            TaskAction::Show { id } => commands::task::show(&registry, id),
            TaskAction::Artifacts { id } => commands::task::artifacts(&registry, id),
            TaskAction::Cancel { id } => commands::task::cancel(&registry, id).await,
        },
    };

    registry.shutdown().await;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskweave_core=warn,taskweave_cli=info".into()),
        )
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
