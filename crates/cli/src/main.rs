use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use output::OutputFormat;

/// upcheck - incremental up-to-date checks for multi-project builds
#[derive(Parser)]
#[command(name = "upcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Directory holding persisted check state (overrides UPCHECK_STATE_DIR)
  #[arg(long, global = true, value_name = "DIR")]
  state_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Check whether projects of a solution are up to date
  Check {
    /// Path to the solution file
    solution: PathBuf,

    /// Only check these projects (path, file name or stem)
    #[arg(short, long = "project", value_name = "PROJECT")]
    projects: Vec<String>,

    /// Validation run: never copy, never fail for lack of a recorded build
    #[arg(long)]
    validate: bool,

    /// Treat the build as a rebuild
    #[arg(long, conflicts_with = "validate")]
    rebuild: bool,

    /// Only check configurations with this target framework
    #[arg(long, value_name = "TFM")]
    target_framework: Option<String>,

    /// Item kinds to leave out of the input/output comparison
    #[arg(long, value_delimiter = ',', value_name = "KINDS")]
    ignore_kinds: Vec<String>,

    /// Enable build acceleration for projects that do not set it
    #[arg(long)]
    accelerate: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Record a successful build of a project
  Built {
    /// Path to the solution file
    solution: PathBuf,

    /// The project that was built (path, file name or stem)
    #[arg(short, long)]
    project: String,

    /// When the build started (RFC 3339, defaults to now)
    #[arg(long, value_name = "TIME")]
    started_at: Option<String>,
  },

  /// Inspect or prune persisted check state
  State {
    #[command(subcommand)]
    command: StateCommands,
  },
}

#[derive(Subcommand)]
enum StateCommands {
  /// List recorded projects and configurations
  List {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Remove records whose last successful build is older than a duration
  Prune {
    /// Maximum age, e.g. "30d" or "12h"
    #[arg(long, value_name = "DURATION")]
    older_than: humantime::Duration,
  },

  /// Remove every record
  Clear,
}

fn main() {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("upcheck_lib=debug,upcheck=debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    output::print_error(&format!("{err:#}"));
    std::process::exit(2);
  }
}

fn run(cli: Cli) -> Result<()> {
  let state_dir = cli.state_dir.as_deref();
  match cli.command {
    Commands::Check {
      solution,
      projects,
      validate,
      rebuild,
      target_framework,
      ignore_kinds,
      accelerate,
      output,
    } => cmd::cmd_check(
      &solution,
      cmd::CheckArgs {
        projects,
        validate,
        rebuild,
        target_framework,
        ignore_kinds,
        accelerate,
        verbose: cli.verbose,
      },
      state_dir,
      output,
    ),
    Commands::Built {
      solution,
      project,
      started_at,
    } => cmd::cmd_built(&solution, &project, started_at.as_deref(), state_dir),
    Commands::State { command } => match command {
      StateCommands::List { output } => cmd::cmd_state_list(state_dir, output),
      StateCommands::Prune { older_than } => cmd::cmd_state_prune(state_dir, older_than.into()),
      StateCommands::Clear => cmd::cmd_state_clear(state_dir),
    },
  }
}
