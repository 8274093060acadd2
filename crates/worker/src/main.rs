// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cook worker (cook-worker)
//!
//! Launched by `cookd`. Connects back to the director, builds whatever it is
//! assigned and exits when the director lets it go.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cook_core::WorkerVisibility;
use cook_engine::CommandExecutor;
use cook_worker::WorkerClient;
use tracing::{error, info};

/// Handshake window when timeouts are enabled.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "cook-worker", version, about = "Remote build worker for cookd")]
struct Args {
    /// Director address (HOST:PORT)
    #[arg(long)]
    director: String,

    #[arg(long)]
    worker_index: u32,

    #[arg(long, default_value = "combined-logs")]
    visibility: WorkerVisibility,

    /// Where to write worker-<index>.log when not sharing the console
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Wait for the director forever (for debuggers)
    #[arg(long)]
    no_timeouts: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(&args)?;

    if let Err(e) = run(&args).await {
        error!(worker = args.worker_index, "worker failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let timeout = (!args.no_timeouts).then_some(CONNECT_TIMEOUT);
    let mut client = WorkerClient::connect(&args.director, args.worker_index, timeout).await?;

    let configure = client.configure().clone();
    let Some(template) = configure.build_command else {
        client.notify_shutdown()?;
        anyhow::bail!("director sent no build command");
    };
    let build_timeout = if configure.no_timeouts {
        None
    } else {
        configure.build_timeout_secs.map(Duration::from_secs)
    };
    let executor = CommandExecutor::new(template, build_timeout);

    let summary = client.run(&executor).await?;
    info!(
        worker = args.worker_index,
        built = summary.built,
        reason = ?summary.reason,
        "worker exiting"
    );
    Ok(())
}

fn setup_logging(
    args: &Args,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Combined mode shares the director's console.
    let log_dir = match (&args.log_dir, args.visibility.shares_console()) {
        (Some(dir), false) => dir.as_path(),
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            return Ok(None);
        }
    };

    let (non_blocking, guard) = file_writer(log_dir, args.worker_index)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();
    Ok(Some(guard))
}

fn file_writer(
    log_dir: &Path,
    index: u32,
) -> anyhow::Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::never(log_dir, format!("worker-{index}.log"));
    Ok(tracing_appender::non_blocking(appender))
}
