//! abyss: layered process-termination orchestrator
//!
//! Usage:
//!   abyss <PID>            → live run against PID
//!   abyss DEBUG            → simulation run (target 0, no liveness checks)
//!   abyss                  → prompt for PID or DEBUG
//!   abyss list             → show discovered methods per layer
//!   abyss config           → print the effective configuration
//!   abyss version          → show version
//!
//! Exit codes: 0 terminated, 1 exhausted, 2 invalid input, 3 target never existed,
//! 4 configuration or I/O failure.

use abyss::cli::Cli;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let code = {
        let _log_guard = init_tracing(args.log_file.as_deref());
        abyss::cli::run(args).await
    };

    std::process::exit(code);
}

fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file.and_then(file_writer) {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "abyss=info,abyss_methods=info,abyss_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn file_writer(path: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path.file_name()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Cannot create log directory {}: {}", dir.display(), e);
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
