//! CLI entry point: loads config, wires the buffer/followers/flusher
//! together behind a shared [`Collector`], and drives graceful shutdown on
//! SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use log_collector::buffer::SharedBuffer;
use log_collector::config::Config;
use log_collector::flusher::Flusher;
use log_collector::follower::Follower;
use log_collector::shutdown::ShutdownToken;
use log_collector::spool::SpoolStore;
use log_collector::transport::IngestClient;

/// Host-resident log collection agent.
#[derive(Parser)]
#[command(name = "log-collector", author, version, about = "Tails files and ships batched events to an ingest endpoint")]
struct Cli {
    /// Optional path to a JSON configuration file. Missing keys fall back
    /// to defaults; a missing or malformed file is not fatal.
    config: Option<PathBuf>,
}

/// Self-logging is append-only and best-effort (spec §5): events always go
/// to stderr, and additionally to `LOG_FILE` when it can be opened - a
/// failure to open the file sink is not fatal, it just means stderr-only.
fn init_logging(log_file: &std::path::Path) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(parent) = log_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match std::fs::OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            let file_layer = fmt::layer().with_ansi(false).with_writer(file).with_filter(filter());
            let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter());
            tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
        }
        Err(e) => {
            eprintln!("log-collector: failed to open LOG_FILE {}: {e}; logging to stderr only", log_file.display());
            tracing_subscriber::fmt().with_env_filter(filter()).init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());
    init_logging(&config.log_file);

    tracing::info!(
        paths = ?config.log_paths,
        backend = %config.backend_url,
        "log-collector starting"
    );

    let shutdown = ShutdownToken::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            tracing::info!("received shutdown signal");
            shutdown.trigger();
        })
        .context("failed to install signal handler")?;
    }

    let spool = Arc::new(
        SpoolStore::new(&config.spool_dir)
            .with_context(|| format!("failed to create spool directory {}", config.spool_dir.display()))?,
    );
    let buffer = Arc::new(SharedBuffer::new(config.batch_size));

    let client = IngestClient::new(
        config.backend_url.clone(),
        config.api_token.clone(),
        Duration::from_secs_f64(config.connect_timeout_secs),
        Duration::from_secs_f64(config.request_timeout_secs),
    )
    .context("failed to build HTTP client")?;

    let flusher = Flusher::new(
        buffer.clone(),
        spool.clone(),
        client,
        config.batch_size,
        config.flush_interval_secs,
        config.max_spool_bytes,
        shutdown.clone(),
    );
    let flusher_handle = thread::spawn(move || flusher.run());

    let follower_handles: Vec<_> = config
        .log_paths
        .iter()
        .cloned()
        .map(|path| {
            let follower = Follower::new(path, config.hostname.clone(), buffer.clone(), shutdown.clone());
            thread::spawn(move || follower.run())
        })
        .collect();

    tracing::info!(count = follower_handles.len(), "followers started");

    while !shutdown.is_shutting_down() {
        thread::sleep(Duration::from_millis(500));
    }

    tracing::info!("shutting down; waiting for followers and flusher to finish");
    for handle in follower_handles {
        let _ = handle.join();
    }
    let _ = flusher_handle.join();
    tracing::info!("log-collector stopped");

    Ok(())
}
