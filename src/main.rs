#![forbid(unsafe_code)]

//! `reorder-gate`: inventory reorder engine and approval callback server.
//!
//! Loads configuration, opens the pending action store, the recompute
//! outbox and the action log, then either serves the callback endpoints
//! (optionally with the periodic decision cycle), runs one cycle, or prunes
//! expired actions and acknowledged recompute tasks.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use reorder_gate::actions::{ActionLog, JsonlActionLog};
use reorder_gate::collaborators::Collaborators;
use reorder_gate::config::GlobalConfig;
use reorder_gate::http::{self, AppState};
use reorder_gate::orchestrator::scheduler;
use reorder_gate::orchestrator::ReorderCycle;
use reorder_gate::outbox::writer::JsonlOutboxWriter;
use reorder_gate::outbox::RecomputeOutbox;
use reorder_gate::persistence::{self, PendingActionStore};
use reorder_gate::workflow::{ApprovalWorkflow, WorkflowSettings};
use reorder_gate::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "reorder-gate", about = "Inventory reorder engine with approval gate", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the approval callbacks and run scheduled cycles.
    Serve {
        /// Only serve callbacks; do not run cycles.
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run a single decision cycle and exit.
    Cycle {
        /// Evaluate and log only; place no orders and request no approvals.
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete expired pending actions and compact the recompute outbox.
    Prune,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("reorder-gate bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

/// Components shared by every subcommand.
struct Runtime {
    config: Arc<GlobalConfig>,
    store: Arc<dyn PendingActionStore>,
    outbox: Arc<dyn RecomputeOutbox>,
    workflow: Arc<ApprovalWorkflow>,
    cycle: Arc<ReorderCycle>,
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    // Pruning never builds callback links.
    if !matches!(args.command, Command::Prune) {
        config.load_credentials().await?;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    let rt = build_runtime(config).await?;

    match args.command {
        Command::Cycle { dry_run } => {
            let summary = rt.cycle.run(dry_run).await?;
            let rendered = serde_json::to_string_pretty(&summary)?;
            println!("{rendered}");
            Ok(())
        }
        Command::Prune => {
            let removed = rt.store.purge_expired(Utc::now()).await?;
            info!(removed, backend = rt.store.backend(), "expired pending actions pruned");
            let compacted = rt.outbox.compact()?;
            info!(compacted, "acknowledged recompute tasks pruned");
            Ok(())
        }
        Command::Serve { no_scheduler } => serve(rt, no_scheduler).await,
    }
}

async fn build_runtime(config: Arc<GlobalConfig>) -> Result<Runtime> {
    // ── Initialize store, outbox and action log ─────────
    let store = persistence::open_store(&config).await?;
    let outbox: Arc<dyn RecomputeOutbox> = Arc::new(JsonlOutboxWriter::new(config.outbox_dir())?);
    let actions: Arc<dyn ActionLog> = Arc::new(JsonlActionLog::new(config.actions_dir())?);
    info!(backend = store.backend(), "pending action store ready");

    // ── Collaborators and workflow ──────────────────────
    let collaborators = Collaborators::from_config(&config)?;
    let workflow = Arc::new(ApprovalWorkflow::new(
        WorkflowSettings::from_config(&config),
        Arc::clone(&store),
        collaborators.clone(),
        Arc::clone(&outbox),
        Arc::clone(&actions),
    ));
    let cycle = Arc::new(ReorderCycle::new(
        Arc::clone(&config),
        Arc::clone(&workflow),
        collaborators,
        Arc::clone(&outbox),
        actions,
    ));

    Ok(Runtime {
        config,
        store,
        outbox,
        workflow,
        cycle,
    })
}

async fn serve(rt: Runtime, no_scheduler: bool) -> Result<()> {
    let ct = CancellationToken::new();

    // ── Start scheduler ─────────────────────────────────
    let scheduler_handle = if no_scheduler {
        info!("scheduler disabled");
        None
    } else {
        Some(scheduler::spawn_cycle_task(
            Arc::clone(&rt.cycle),
            rt.config.timeouts.cycle_interval(),
            ct.clone(),
        ))
    };

    // ── Start HTTP server ───────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::clone(&rt.config),
        workflow: Arc::clone(&rt.workflow),
    });
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve(state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!(port = rt.config.http_port, "reorder-gate ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = http_handle.await;
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    info!("reorder-gate shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
