//! # flow-cli
//!
//! Command-line interface for Initiative Flow.
//!
//! Inspects and advances initiatives under `openspec/initiatives/`:
//! - `flow init <id> --title` - create an initiative in `draft`
//! - `flow list` - every initiative with its current stage
//! - `flow status/tier/gate/stage/next` - artifact, tier, gate, and stage queries
//! - `flow transition <id> <from> <to>` - apply a gated stage transition
//! - `flow workitems init/generate/validate/tree/watch` - manage work items
//!
//! Every command accepts `--json` for machine-readable output. Logs go to
//! stderr and are controlled by `RUST_LOG`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flow_initiative::FlowConfig;
use tracing_subscriber::EnvFilter;

use commands::Context;

const DEFAULT_LOG_DIRECTIVES: &str = "flow_engine=warn,flow_workitems=info";

/// Initiative Flow CLI - track initiatives through their tiers and gates.
#[derive(Parser)]
#[command(name = "flow", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new initiative.
    Init {
        /// Initiative ID (e.g., "INI-001").
        id: String,
        /// Initiative title.
        #[arg(long)]
        title: String,
    },
    /// List initiatives and their stages.
    List,
    /// Show full initiative status.
    Status {
        /// Initiative ID.
        id: String,
    },
    /// Show one tier's artifacts and completion.
    Tier {
        /// Initiative ID.
        id: String,
        /// Tier (tier1, tier2, tier3, tier4).
        tier: String,
    },
    /// Check a gate's criteria.
    Gate {
        /// Initiative ID.
        id: String,
        /// Gate (strategic, product, design, implementation).
        gate: String,
    },
    /// Show the current stage and where it can go next.
    Stage {
        /// Initiative ID.
        id: String,
    },
    /// Show the next artifact to work on.
    Next {
        /// Initiative ID.
        id: String,
    },
    /// Apply a stage transition.
    Transition {
        /// Initiative ID.
        id: String,
        /// Stage the initiative is expected to be in.
        from: String,
        /// Destination stage.
        to: String,
        /// Who is making the transition, recorded in history.
        #[arg(long)]
        actor: Option<String>,
    },
    /// Manage universal work items.
    Workitems {
        #[command(subcommand)]
        command: commands::workitems::WorkItemCommands,
    },
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let project_root = cli
        .project_root
        .canonicalize()
        .unwrap_or_else(|_| cli.project_root.clone());
    let ctx = Context::new(FlowConfig::for_project(&project_root), cli.json);

    match run(&cli.command, &ctx) {
        Ok(code) => code,
        Err(e) => {
            if ctx.json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Commands, ctx: &Context) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Init { id, title } => commands::initiative::init(ctx, id, title),
        Commands::List => commands::initiative::list(ctx),
        Commands::Status { id } => commands::initiative::status(ctx, id),
        Commands::Tier { id, tier } => commands::initiative::tier(ctx, id, tier),
        Commands::Gate { id, gate } => commands::initiative::gate(ctx, id, gate),
        Commands::Stage { id } => commands::initiative::stage(ctx, id),
        Commands::Next { id } => commands::initiative::next(ctx, id),
        Commands::Transition {
            id,
            from,
            to,
            actor,
        } => commands::initiative::transition(ctx, id, from, to, actor.as_deref()),
        Commands::Workitems { command } => commands::workitems::execute(command, ctx),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs stay on stderr so `--json` output on stdout is parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
