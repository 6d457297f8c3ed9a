//! survey-sync-daemon - v1 -> v2 survey event synchronization daemon.
//!
//! Watches the legacy objects KV bucket's change feed, transforms survey
//! and survey-response rows into their v2 shapes, and forwards indexing and
//! access-control messages downstream. See the library crate for the
//! pipeline itself; this binary only parses flags, initializes logging,
//! wires signals, and runs the processor.

use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use survey_sync_daemon::{EventProcessor, EventingConfig};

/// Durable v1 -> v2 survey synchronization consumer.
#[derive(Parser, Debug)]
#[command(name = "survey-sync-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// NATS server URL; overrides `NATS_URL`.
    #[arg(long)]
    nats_url: Option<String>,

    /// Durable consumer name; overrides `EVENT_CONSUMER_NAME`.
    #[arg(long)]
    consumer_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = EventingConfig::from_env();
    if let Some(url) = args.nats_url {
        config.nats_url = url;
    }
    if let Some(name) = args.consumer_name {
        config.consumer_name = name;
    }

    info!(
        nats_url = %config.nats_url,
        consumer = %config.consumer_name,
        "starting survey-sync daemon"
    );

    let processor = EventProcessor::connect(config)
        .await
        .context("failed to initialize event processor")?;

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let shutdown = processor.shutdown_handle();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT; shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM; shutting down"),
        }
        shutdown.store(true, Ordering::Relaxed);
    });

    let outcome = processor.run().await;
    processor.stop().await;
    outcome.context("event processor failed")?;

    Ok(())
}
