use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use aggregator_demo::{run_consumer, run_producer, FeedConfig, JoinWords, WordUpdate};
use keyed_aggregator::{Aggregator, AggregatorConfig, AggregatorError, CancellationToken};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with `initial_capacity` and `delay_ms` (defaults to AGGREGATOR_* env vars)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debounce window in milliseconds (overrides config)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Expected number of keys (overrides config)
    #[arg(long)]
    capacity: Option<usize>,

    /// Number of keys the producer spreads words across
    #[arg(long, default_value_t = 1)]
    keys: u32,

    /// Shortest pause between words, in milliseconds
    #[arg(long, default_value_t = 100)]
    min_pause_ms: u64,

    /// Longest pause between words, in milliseconds
    #[arg(long, default_value_t = 600)]
    max_pause_ms: u64,

    /// Stop after this many seconds (runs until Ctrl-C when omitted)
    #[arg(long)]
    run_secs: Option<u64>,
}

fn load_config(args: &Args) -> Result<AggregatorConfig> {
    let mut config = match &args.config {
        Some(path) => AggregatorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AggregatorConfig::from_env(),
    };
    if let Some(delay_ms) = args.delay_ms {
        config.delay_ms = delay_ms;
    }
    if let Some(capacity) = args.capacity {
        config.initial_capacity = capacity;
    }
    config.validate().context("Invalid aggregator configuration")?;
    Ok(config)
}

async fn wait_for_shutdown(run_secs: Option<u64>) {
    match run_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler unavailable: {e}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        delay_ms = config.delay_ms,
        capacity = config.initial_capacity,
        keys = args.keys,
        "Aggregator demo starting"
    );

    let cancel = CancellationToken::new();
    let aggregator = Arc::new(
        Aggregator::<WordUpdate>::builder()
            .config(&config)
            .strategy(JoinWords)
            .cancellation(cancel.clone())
            .build()
            .context("Failed to build aggregator")?,
    );

    let feed = FeedConfig {
        keys: args.keys,
        min_pause: Duration::from_millis(args.min_pause_ms),
        max_pause: Duration::from_millis(args.max_pause_ms),
    };
    let shutdown = CancellationToken::new();
    let producer = tokio::spawn(run_producer(aggregator.clone(), feed, shutdown.clone()));
    let consumer = tokio::spawn(run_consumer(aggregator.clone()));

    wait_for_shutdown(args.run_secs).await;
    shutdown.cancel();
    let sent = producer.await.context("Producer task panicked")?;

    // A second Ctrl-C while draining abandons the open windows.
    let stop = tokio::select! {
        result = aggregator.stop() => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(AggregatorError::Cancelled)
        }
    };
    match stop {
        Ok(()) => {}
        Err(AggregatorError::Cancelled) => warn!("Aggregator stopped with abandoned windows"),
        Err(e) => return Err(e).context("Failed to stop aggregator"),
    }

    let merged = consumer.await.context("Consumer task panicked")?;
    info!(sent, merged = merged.len(), "Feed drained");

    let stats = serde_json::to_string_pretty(&aggregator.stats())?;
    println!("{stats}");
    println!("All done.");

    Ok(())
}
