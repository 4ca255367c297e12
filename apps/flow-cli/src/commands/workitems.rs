// workitems.rs - Work-item subcommands: init, generate, validate, tree, watch.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::Subcommand;
use flow_initiative::ProjectConfig;
use flow_workitems::{
    auto_generate_enabled, read_manifest, GenerationResult, Status, TreeNode, WorkItemGenerator,
    WorkItemValidator, WorkItemWatcher,
};

use super::Context;

#[derive(Subcommand)]
pub enum WorkItemCommands {
    /// Generate work items and enable auto-generation for the initiative.
    Init {
        /// Initiative ID.
        id: String,
    },
    /// Regenerate work items from the tier artifacts.
    Generate {
        /// Initiative ID.
        id: String,
    },
    /// Check the generated tree's structure.
    Validate {
        /// Initiative ID.
        id: String,
    },
    /// Print the generated work-item tree.
    Tree {
        /// Initiative ID.
        id: String,
    },
    /// Regenerate whenever epics, stories, or tasks change.
    Watch {
        /// Initiative ID.
        id: String,
        /// Watch even when auto-generation is not enabled.
        #[arg(long)]
        force: bool,
        /// Quiet period before regenerating, in milliseconds.
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },
}

pub fn execute(cmd: &WorkItemCommands, ctx: &Context) -> anyhow::Result<ExitCode> {
    match cmd {
        WorkItemCommands::Init { id } => init(ctx, id),
        WorkItemCommands::Generate { id } => generate(ctx, id),
        WorkItemCommands::Validate { id } => validate(ctx, id),
        WorkItemCommands::Tree { id } => tree(ctx, id),
        WorkItemCommands::Watch {
            id,
            force,
            debounce_ms,
        } => watch(ctx, id, *force, Duration::from_millis(*debounce_ms)),
    }
}

fn generator(ctx: &Context) -> WorkItemGenerator {
    WorkItemGenerator::new(&ctx.config).with_dispatcher(ctx.dispatcher())
}

/// Turn an unsuccessful generation into an error.
fn ensure_generated(result: &GenerationResult) -> anyhow::Result<()> {
    if !result.success {
        anyhow::bail!("Work item generation failed: {}", result.errors.join(", "));
    }
    Ok(())
}

fn print_generation(result: &GenerationResult) {
    let counts = &result.items_generated;
    println!("  Path:  {}", result.path.display());
    println!(
        "  Items: {} epics, {} stories, {} tasks",
        counts.epics, counts.stories, counts.tasks
    );
    for warning in &result.warnings {
        println!("  Warning: {}", warning);
    }
}

fn init(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let result = generator(ctx).generate(id)?;
    ensure_generated(&result)?;

    let mut project = ProjectConfig::load(&ctx.config.config_file)?;
    project.enable_workitems(id);
    project.save(&ctx.config.config_file)?;

    if ctx.json {
        ctx.print_json(&result)?;
        return Ok(ExitCode::SUCCESS);
    }
    println!("Work items initialized for {}", id);
    print_generation(&result);
    println!("  Auto-generation enabled.");
    Ok(ExitCode::SUCCESS)
}

fn generate(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let result = generator(ctx).generate(id)?;
    ensure_generated(&result)?;

    if ctx.json {
        ctx.print_json(&result)?;
        return Ok(ExitCode::SUCCESS);
    }
    println!("Work items generated for {}", id);
    print_generation(&result);
    Ok(ExitCode::SUCCESS)
}

fn validate(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let result = WorkItemValidator::new(&ctx.config).validate(id)?;

    if ctx.json {
        ctx.print_json(&result)?;
    } else {
        for warning in &result.warnings {
            println!("warning: {}: {}", warning.path, warning.message);
        }
        for error in &result.errors {
            println!("error: {}: [{}] {}", error.path, error.rule, error.message);
        }
        if result.valid {
            println!("Work items for {} are valid.", id);
        } else {
            println!("{} error(s) in work items for {}.", result.errors.len(), id);
        }
    }

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn tree(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let manifest = read_manifest(&ctx.config, id).with_context(|| {
        format!("no work items for '{}'; run `flow workitems init {}` first", id, id)
    })?;

    if ctx.json {
        ctx.print_json(&manifest)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", manifest.project.title);
    println!("{}", "═".repeat(50));
    let mut lines = Vec::new();
    render_tree(&manifest.tree, "", &mut lines);
    for line in &lines {
        println!("{}", line);
    }
    println!("{}", "─".repeat(50));
    println!(
        "{} items | Done: {} | In progress: {}",
        manifest.summary.total_items,
        manifest.summary.count_status(Status::Done),
        manifest.summary.count_status(Status::InProgress)
    );
    Ok(ExitCode::SUCCESS)
}

/// Render nodes with box-drawing connectors, one line per node.
fn render_tree(nodes: &[TreeNode], indent: &str, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let (branch, child_indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        lines.push(format!(
            "{}{}{} [{}] {}",
            indent, branch, node.level, node.status.as_str(), node.title
        ));
        render_tree(&node.children, &format!("{}{}", indent, child_indent), lines);
    }
}

fn watch(ctx: &Context, id: &str, force: bool, debounce: Duration) -> anyhow::Result<ExitCode> {
    if !force && !auto_generate_enabled(&ctx.config, id)? {
        anyhow::bail!(
            "auto-generation is not enabled for '{}'; run `flow workitems init {}` or pass --force",
            id,
            id
        );
    }

    let mut watcher = WorkItemWatcher::new(&ctx.config, id)?
        .with_debounce(debounce)
        .with_generator(generator(ctx));
    if watcher.watched_dirs().is_empty() {
        anyhow::bail!("no epics, stories, or tasks directories to watch for '{}'", id);
    }

    if !ctx.json {
        println!("Watching {} (Ctrl-C to stop):", id);
        for dir in watcher.watched_dirs() {
            println!("  {}", dir.display());
        }
    }

    let json = ctx.json;
    watcher.run(
        || false,
        |result| match result {
            Ok(result) if json => match serde_json::to_string(&result) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "could not serialize generation result"),
            },
            Ok(result) if result.success => {
                let counts = &result.items_generated;
                println!(
                    "Regenerated: {} epics, {} stories, {} tasks",
                    counts.epics, counts.stories, counts.tasks
                );
            }
            Ok(result) => eprintln!("Regeneration failed: {}", result.errors.join(", ")),
            Err(e) => eprintln!("Regeneration failed: {}", e),
        },
    );
    Ok(ExitCode::SUCCESS)
}
