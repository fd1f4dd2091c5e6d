//! A thin command-line front end for the agent workbench: create and run
//! agents against a real directory on disk, without an editor shell.
//!
//! Grounded on `astrid-cli::main`'s shape (a `clap` derive `Cli` over a
//! `Subcommand` enum, `tokio::main`, one handler function per command) and
//! `machi-bot`'s direct `tracing_subscriber::fmt()` logging setup — this
//! binary is small enough that neither needs the daemon/session-store
//! machinery `astrid-cli` layers on top.

mod fs_host;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, AgentRecord};
use wbench_llm::{LlmProvider, OpenAiCompatProvider};
use wbench_orchestrator::{AgentFileStore, AgentRegistry, ForkSessionManager, Orchestrator};
use wbench_runtime::{CellExecution, Controller, RuntimeConfig};
use wbench_tools::{ChildSpec, ForkSpawner, TaskFinishReporter, ToolRegistry};

use fs_host::FsHost;

/// The agent workbench command-line client.
#[derive(Parser)]
#[command(name = "wbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Workspace directory agent documents are read from and written to
    #[arg(long, global = true, default_value = "./wbench-workspace")]
    root: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a root agent and run its first cell against a live model
    Run {
        /// The agent's initial prompt
        #[arg(short, long)]
        prompt: String,

        /// Path prefixes the agent is authorized to touch (repeatable;
        /// defaults to "/" — the whole workspace — if omitted)
        #[arg(long = "allow")]
        allowed_paths: Vec<String>,

        /// Model identifier to request
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        /// API key; falls back to the OPENAI_API_KEY environment variable
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: Option<String>,

        /// Base URL for an OpenAI-compatible endpoint (e.g. a local server)
        #[arg(long)]
        base_url: Option<String>,

        /// Maximum LLM round-trips before the cell gives up
        #[arg(long, default_value_t = 30)]
        max_loops: u32,
    },

    /// Spawn two child agents under a fresh root and join on their reports,
    /// without calling a real model — exercises the fork/join tree end to
    /// end (spec's `fork` and `task_finish` tools, driven directly).
    ForkDemo,

    /// Print the sidebar tree (registry + pending approvals) for every
    /// agent document currently under `--root`
    Sidebar,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { prompt, allowed_paths, model, api_key, base_url, max_loops } => {
            run_cell(&cli.root, prompt, allowed_paths, model, api_key, base_url, max_loops).await
        }
        Commands::ForkDemo => fork_demo(&cli.root).await,
        Commands::Sidebar => sidebar(&cli.root).await,
    }
}

fn init_logging(verbosity: u8) {
    let level = if verbosity >= 2 { "debug" } else if verbosity == 1 { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("wbench_cli={level},wbench_runtime={level},wbench_orchestrator={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(verbosity >= 2).init();
}

fn build_orchestrator(host: Arc<FsHost>) -> Orchestrator {
    let registry = AgentRegistry::new();
    let file_store = AgentFileStore::new(host.clone());
    let fork_sessions = ForkSessionManager::new(registry.clone());
    Orchestrator::new(registry, file_store, fork_sessions, host)
}

#[allow(clippy::too_many_arguments)]
async fn run_cell(
    root: &str,
    prompt: String,
    allowed_paths: Vec<String>,
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    max_loops: u32,
) -> Result<()> {
    let Some(api_key) = api_key else {
        bail!("no API key given: pass --api-key or set OPENAI_API_KEY");
    };
    let allowed_paths = if allowed_paths.is_empty() { vec!["/".to_string()] } else { allowed_paths };

    let host = Arc::new(FsHost::new(root).await.context("setting up the workspace directory")?);
    let orchestrator = build_orchestrator(host.clone());

    let id = AgentId::new();
    let location = orchestrator
        .file_store()
        .create(id.clone(), None, Some(prompt.clone()), allowed_paths.clone(), Some(model.clone()))
        .await
        .context("creating the agent document")?;
    let mut record = AgentRecord::new(id.clone(), None, format!("agent-{}", id.short()), location.to_string(), allowed_paths, Some(model.clone()), Some(prompt.clone()));
    record.window_open = true;
    orchestrator.registry().insert(record).await;
    info!(%id, %location, "created agent");

    let llm: Arc<dyn LlmProvider> = match &base_url {
        Some(base_url) => Arc::new(OpenAiCompatProvider::custom(base_url.clone(), Some(api_key.clone()), model.clone())),
        None => Arc::new(OpenAiCompatProvider::openai(api_key.clone(), model.clone())),
    };

    let config = RuntimeConfig { api_key: Some(api_key), base_url, default_model: model, max_loops, ..RuntimeConfig::default() };
    let controller = Controller::new(orchestrator, llm, None, Arc::new(ToolRegistry::with_defaults()), ApprovalGate::new(), host, config);

    let execution = CellExecution { agent_id: id, location, cell_index: 0, cell_text: prompt };
    let result = controller.run_cell(execution, CancellationToken::new()).await.context("running the cell")?;

    for round in &result.transcript.committed_rounds {
        println!("{round}");
    }
    if !result.transcript.live_content.is_empty() {
        println!("{}", result.transcript.live_content);
    }
    for card in &result.transcript.live_tool_cards {
        let name = card.name.as_deref().unwrap_or("?");
        println!("  [{name}] {} -> {}", card.arguments_preview, card.result.as_deref().unwrap_or("(pending)"));
    }
    for badge in &result.transcript.error_badges {
        eprintln!("error: {badge}");
    }
    for badge in &result.transcript.diagnostic_badges {
        eprintln!("note: {badge}");
    }

    if !result.success {
        bail!("the cell did not complete successfully");
    }
    Ok(())
}

async fn fork_demo(root: &str) -> Result<()> {
    let host = Arc::new(FsHost::new(root).await.context("setting up the workspace directory")?);
    let orchestrator = build_orchestrator(host.clone());

    let root_id = AgentId::new();
    let location = orchestrator.file_store().create(root_id.clone(), None, Some("coordinate two workers".to_string()), vec!["/".to_string()], None).await?;
    orchestrator.registry().insert(AgentRecord::new(root_id.clone(), None, "coordinator", location.to_string(), vec!["/".to_string()], None, None)).await;

    let children = vec![
        ChildSpec { prompt: "summarize notes/a.md".to_string(), allowed_paths: vec!["/notes/a.md".to_string()], model: None },
        ChildSpec { prompt: "summarize notes/b.md".to_string(), allowed_paths: vec!["/notes/b.md".to_string()], model: None },
    ];

    let root_for_fork = orchestrator.clone();
    let root_id_for_fork = root_id.clone();
    let join = tokio::spawn(async move { ForkSpawner::fork(&root_for_fork, root_id_for_fork, None, children).await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let child_ids: Vec<AgentId> = orchestrator.registry().all().await.into_iter().filter(|record| record.parent_id.as_ref() == Some(&root_id)).map(|record| record.id).collect();
    if child_ids.len() != 2 {
        bail!("expected two children to be spawned, found {}", child_ids.len());
    }

    TaskFinishReporter::report_task_finish(&orchestrator, child_ids[0].clone(), "notes/a.md is about onboarding".to_string()).await;
    TaskFinishReporter::report_task_finish(&orchestrator, child_ids[1].clone(), "notes/b.md is about release notes".to_string()).await;

    let report = join.await.context("joining the fork task")?.context("fork/join failed")?;
    println!("{report}");
    Ok(())
}

async fn sidebar(root: &str) -> Result<()> {
    let host = Arc::new(FsHost::new(root).await.context("setting up the workspace directory")?);
    let orchestrator = build_orchestrator(host.clone());

    let agents_dir = std::path::Path::new(root).join("agents");
    let mut entries = match tokio::fs::read_dir(&agents_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            println!("{{\"roots\":[],\"pendingApprovals\":[],\"autoApproveEnabled\":false}}");
            return Ok(());
        }
        Err(err) => return Err(err).context("reading the agents directory"),
    };

    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let location = wbench_core::DocumentLocation::bare(format!("agents/{}", entry.file_name().to_string_lossy()));
        let document = orchestrator.file_store().load(&location).await.context("loading an agent document")?;
        let metadata = serde_json::to_value(&document.metadata)?;
        orchestrator.document_opened(location, metadata).await.context("hydrating the agent tree")?;
    }

    let gate = ApprovalGate::new();
    let snapshot = wbench_runtime::sidebar_snapshot(&orchestrator, &gate).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
