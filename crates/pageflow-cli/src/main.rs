mod dryrun;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dryrun::DryRunBrowser;
use pageflow_core::{ExecutionEvent, ProxySettings, WorkflowDefinition};
use pageflow_runtime::{SchedulerConfig, StrategyRegistry, Workflow, WorkflowScheduler};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pageflow")]
#[command(about = "Browser automation workflow engine", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run workflows from a file or a directory of *.json files
    Run {
        path: PathBuf,

        /// Run only this workflow
        #[arg(long, conflicts_with_all = ["names", "pending"])]
        name: Option<String>,

        /// Run these workflows (comma separated)
        #[arg(long, value_delimiter = ',', conflicts_with = "pending")]
        names: Vec<String>,

        /// Run only workflows that have never run
        #[arg(long)]
        pending: bool,

        /// Concurrency ceiling (defaults to PAGEFLOW_MAX_CONCURRENT or 5)
        #[arg(short = 'c', long)]
        max_concurrent: Option<usize>,

        /// JSON file with proxy settings applied to every workflow
        #[arg(long)]
        proxy: Option<PathBuf>,
    },

    /// Build a workflow file and report graph problems
    Validate { file: PathBuf },

    /// List available node types
    Nodes,

    /// Load workflows and print their status
    Status { path: PathBuf },

    /// Write an example workflow
    Init {
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            path,
            name,
            names,
            pending,
            max_concurrent,
            proxy,
        } => {
            let selection = match (name, names.is_empty(), pending) {
                (Some(name), _, _) => Selection::One(name),
                (None, false, _) => Selection::Many(names),
                (None, true, true) => Selection::Pending,
                (None, true, false) => Selection::Runnable,
            };
            run_workflows(&path, selection, max_concurrent, proxy.as_deref()).await
        }
        Commands::Validate { file } => validate_workflow(&file).map(|_| ExitCode::SUCCESS),
        Commands::Nodes => {
            list_nodes();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { path } => show_status(&path).await.map(|_| ExitCode::SUCCESS),
        Commands::Init { output, force } => {
            create_example_workflow(&output, force).map(|_| ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

enum Selection {
    One(String),
    Many(Vec<String>),
    Pending,
    Runnable,
}

fn registry() -> Arc<StrategyRegistry> {
    Arc::new(pageflow_nodes::default_registry())
}

fn read_proxy(path: &Path) -> Result<ProxySettings> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading proxy settings from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing proxy settings in {}", path.display()))
}

/// Load a single file or every workflow in a directory
async fn load(scheduler: &WorkflowScheduler, path: &Path, proxy: Option<ProxySettings>) -> Result<usize> {
    if path.is_dir() {
        Ok(scheduler.load_workflows_from_dir(path, proxy).await?)
    } else {
        scheduler.load_workflow(path, proxy, None).await?;
        Ok(1)
    }
}

async fn run_workflows(
    path: &Path,
    selection: Selection,
    max_concurrent: Option<usize>,
    proxy: Option<&Path>,
) -> Result<ExitCode> {
    let mut config = SchedulerConfig::from_env();
    if let Some(max) = max_concurrent {
        config = config.with_max_concurrent(max);
    }
    let proxy = proxy.map(read_proxy).transpose()?;

    let scheduler = WorkflowScheduler::new(config, Arc::new(DryRunBrowser), registry());
    let loaded = load(&scheduler, path, proxy).await?;
    if loaded == 0 {
        bail!("no workflows loaded from {}", path.display());
    }

    println!("🚀 Loaded {} workflow(s) from {}", loaded, path.display());
    println!("   Max concurrent: {}", scheduler.max_concurrent());
    println!();

    let mut events = scheduler.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { workflow, .. } => {
                    println!("▶️  {} started", workflow);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::WorkflowCompleted {
                    workflow,
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ {} completed in {}ms", workflow, duration_ms);
                    } else {
                        println!("💥 {} failed after {}ms", workflow, duration_ms);
                    }
                }
                ExecutionEvent::BatchProgress {
                    total,
                    completed,
                    failed,
                    ..
                } if completed + failed > 0 => {
                    println!("   [{}/{}] finished, {} failed", completed + failed, total, failed);
                }
                _ => {}
            }
        }
    });

    let results: HashMap<String, bool> = match selection {
        Selection::One(name) => {
            let ok = scheduler.run_workflow(&name).await;
            HashMap::from([(name, ok)])
        }
        Selection::Many(names) => scheduler.run_multiple(&names).await,
        Selection::Pending => scheduler.run_all_pending().await,
        Selection::Runnable => scheduler.run_all_runnable().await,
    };

    // let the printer drain
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Summary:");
    let mut names: Vec<&String> = results.keys().collect();
    names.sort();
    for name in names {
        let status = scheduler.workflow_status(name).await;
        let error = status.as_ref().and_then(|s| s.last_error_message.clone());
        match (results[name], error) {
            (true, _) => println!("   ✅ {}", name),
            (false, Some(error)) => println!("   ❌ {}: {}", name, error),
            (false, None) => println!("   ❌ {}", name),
        }
    }

    if results.is_empty() {
        println!("   nothing to run");
    }
    if results.values().all(|ok| *ok) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let json = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let definition = WorkflowDefinition::from_json(&json)?;
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string());
    let workflow = Workflow::build(name, &definition, None)?;

    println!("✅ Workflow builds:");
    println!("   Name: {}", workflow.name());
    println!("   Nodes: {}", definition.nodes.len());
    println!("   Connections: {}", definition.connections.len());
    println!("   Start: {}", workflow.start_node_id());

    let registry = registry();
    let mut problems = 0;
    for spec in &definition.nodes {
        if !registry.contains(&spec.node_type) {
            println!("   ⚠️  node '{}' has unknown type '{}'", spec.id, spec.node_type);
            problems += 1;
        }
    }

    let report = workflow.analyze();
    for id in &report.unreachable {
        println!("   ⚠️  node '{}' is unreachable from start", id);
    }
    for edge in &report.dangling {
        println!(
            "   ⚠️  {}.{} points at missing node '{}'",
            edge.from_node, edge.from_port, edge.to_node
        );
    }
    if report.has_cycles {
        println!("   ℹ️  graph contains cycles; traversal stops when a node repeats");
    }
    problems += report.unreachable.len() + report.dangling.len();

    if problems > 0 {
        println!("   {} problem(s) found", problems);
    }
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for node_type in registry.list_node_types() {
        let Some(metadata) = registry.metadata(node_type) else {
            println!("  • {}", node_type);
            continue;
        };
        println!("  • {} ({})", node_type, metadata.category);
        println!("    {}", metadata.description);
        for param in &metadata.params {
            let default = param
                .default
                .as_deref()
                .map(|d| format!(" [default: {d}]"))
                .unwrap_or_default();
            let required = if param.required { " (required)" } else { "" };
            println!("      - {}{}{}: {}", param.name, required, default, param.description);
        }
    }
}

async fn show_status(path: &Path) -> Result<()> {
    let scheduler = WorkflowScheduler::new(SchedulerConfig::from_env(), Arc::new(DryRunBrowser), registry());
    load(&scheduler, path, None).await?;

    for status in scheduler.list_workflows().await {
        println!(
            "{:<24} {:<10} nodes={:<4} proxy={}",
            status.name, status.state, status.node_count, status.has_proxy
        );
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&scheduler.status().await)?);
    Ok(())
}

fn create_example_workflow(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let json = serde_json::to_string_pretty(&WorkflowDefinition::sample())?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  pageflow run {}", output.display());
    Ok(())
}
