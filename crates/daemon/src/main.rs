// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cook director (cookd)
//!
//! Cooks the named items for the given targets, locally and on a pool of
//! `cook-worker` processes, then exits.
//!
//! Architecture:
//! - Accept task: spawned, hands TCP connections to the director
//! - Runtime loop: main task, owns the store, the director and every worker proxy

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use cook_adapters::TokioLauncher;
use cook_core::{
    format_elapsed, CookOutcome, ItemCompletion, ShortId, SystemClock, TargetName, WorkerVisibility,
};
use cook_director::{env, Director, DirectorConfig, EnvOverrides, TcpAcceptor};
use cook_engine::{CommandExecutor, CookRequest, Runtime};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "cookd", version, about = "Cook items locally and on remote worker processes")]
struct Args {
    /// TOML configuration file (defaults to $COOK_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of remote workers for this session
    #[arg(long)]
    worker_count: Option<u32>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// combined-logs, separate-logs or separate-windows
    #[arg(long)]
    visibility: Option<WorkerVisibility>,

    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable connect, disconnect and build timeouts (for debuggers)
    #[arg(long)]
    no_timeouts: bool,

    /// Targets to cook every item for
    #[arg(long, value_delimiter = ',', required = true)]
    targets: Vec<String>,

    /// Items to cook
    #[arg(required = true)]
    items: Vec<String>,
}

impl Args {
    fn apply(&self, config: &mut DirectorConfig) {
        if let Some(count) = self.worker_count {
            config.worker_count = count;
        }
        if let Some(host) = &self.host {
            config.listen_host = host.clone();
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(visibility) = self.visibility {
            config.worker_visibility = visibility;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if self.no_timeouts {
            config.no_timeouts = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let path = args.config.clone().or_else(env::config_path);
    let mut config = DirectorConfig::load(path.as_deref())?;
    config.apply_env(EnvOverrides::from_env()?);
    args.apply(&mut config);

    // The guard flushes the log file on drop, so main must return rather than exit.
    let _log_guard = setup_logging(&config.log_dir())?;

    match run(&args, &config).await {
        Ok(failed) => {
            if failed > 0 {
                eprintln!("cookd: {failed} item(s) failed");
            }
            Ok(exit_code(failed))
        }
        Err(e) => {
            error!("cookd failed: {:#}", e);
            Err(e)
        }
    }
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Cook every requested item. Returns the number of items that did not
/// succeed.
async fn run(args: &Args, config: &DirectorConfig) -> anyhow::Result<usize> {
    let Some(template) = config.build_command.clone() else {
        bail!("no build_command configured");
    };
    let targets: Vec<TargetName> = args.targets.iter().map(TargetName::new).collect();

    let acceptor = TcpAcceptor::bind(&config.listen_host, config.listen_port)
        .await
        .with_context(|| format!("binding {}:{}", config.listen_host, config.listen_port))?;
    let worker_executable = match &config.worker_executable {
        Some(path) => path.clone(),
        None => std::env::current_exe()
            .context("locating the director executable")?
            .with_file_name("cook-worker"),
    };
    let options = config.director_options(&targets, worker_executable);
    info!(
        addr = %cook_adapters::Acceptor::local_addr(&acceptor),
        workers = options.worker_count,
        visibility = %options.visibility,
        "director ready"
    );

    let director = Director::new(options, Box::new(acceptor), Box::new(TokioLauncher), SystemClock);
    let executor = CommandExecutor::new(template, config.build_timeout());
    let mut runtime = Runtime::new(director, executor, SystemClock, config.runtime_config());

    let failed = Arc::new(AtomicUsize::new(0));
    let target_set: BTreeSet<TargetName> = targets.iter().cloned().collect();
    for item in &args.items {
        let failed = Arc::clone(&failed);
        runtime.submit(CookRequest {
            name: item.as_str().into(),
            targets: target_set.clone(),
            urgent: false,
            on_complete: Some(Box::new(move |completion: &ItemCompletion| {
                report(completion, &failed);
            })),
        });
    }

    let started = std::time::Instant::now();
    tokio::select! {
        result = runtime.run_until_idle() => result?,
        _ = tokio::signal::ctrl_c() => warn!("interrupted, cancelling outstanding items"),
    }
    let cancelled = runtime.end_session().await;
    info!(
        items = args.items.len(),
        cancelled,
        elapsed = %format_elapsed(started.elapsed().as_secs()),
        "session finished"
    );
    Ok(failed.load(Ordering::SeqCst))
}

fn report(completion: &ItemCompletion, failed: &AtomicUsize) {
    match &completion.outcome {
        CookOutcome::Failed | CookOutcome::Cancelled => {
            failed.fetch_add(1, Ordering::SeqCst);
            for build in completion.builds.iter().filter(|b| !b.succeeded) {
                for line in &build.side_messages {
                    error!(item = %completion.name, target = %build.target, "{}", line);
                }
            }
            warn!(item = %completion.name, outcome = ?completion.outcome, "item did not cook");
        }
        outcome => {
            let builds: Vec<&str> = completion
                .builds
                .iter()
                .filter_map(|b| b.build_id.as_deref())
                .map(|id| id.short(8))
                .collect();
            info!(item = %completion.name, ?outcome, ?builds, "item cooked")
        }
    }
}

fn setup_logging(log_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Create log directory if needed
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "director.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
