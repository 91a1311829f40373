//! `multiqueue`: command-line client for a Redis-backed multi-backend queue.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!  ┌───────────┐   select    ┌──────────────┐   probe / score   ┌─────────┐
//!  │ MultiQueue│────────────▶│  BackendSet  │──────────────────▶│ health  │
//!  └─────┬─────┘             └──────────────┘                   └─────────┘
//!        │ acquire
//!        ▼
//!  ┌───────────┐  RPUSH / BLPOP / LLEN / PING  ┌──────────────┐
//!  │ RedisPool │──────────────────────────────▶│ Redis server │  × N
//!  └───────────┘                               └──────────────┘
//! ```
//!
//! Backends come from `--config` (TOML) and/or repeated `--backend` flags;
//! flags win over the file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use redis_multiqueue::config::{load_config, BackendConfig, QueueConfig};
use redis_multiqueue::observability::logging::init_logging;
use redis_multiqueue::observability::metrics::init_metrics;
use redis_multiqueue::resilience::{retry_with_backoff, Backoff, RetryPolicy};
use redis_multiqueue::MultiQueue;

#[derive(Parser)]
#[command(name = "multiqueue")]
#[command(about = "FIFO queue spread across several Redis servers", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend address (`host:port[/db]` or `redis://...`). Repeatable.
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Queue key, overriding the configuration.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append values to the queue
    Push {
        values: Vec<String>,
        /// Attempts per value before giving up
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Remove one value, waiting up to the timeout
    Pop {
        /// Seconds to wait; 0 waits forever
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,
    },
    /// Total length over healthy backends
    Len,
    /// Per-backend error scores as JSON
    Status,
    /// Pop and print values until interrupted
    Consume {
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,
        /// Serve Prometheus metrics on this address
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
}

fn build_config(cli: &Cli) -> Result<QueueConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => QueueConfig::default(),
    };
    if !cli.backends.is_empty() {
        config.backends = cli.backends.iter().map(BackendConfig::new).collect();
    }
    if let Some(key) = &cli.key {
        config.queue_key = key.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_logging(&config.observability);

    tracing::debug!(
        queue_key = %config.queue_key,
        backends = config.backends.len(),
        "Configuration loaded"
    );

    let queue = MultiQueue::connect(&config).await?;
    let result = run(&queue, &config, cli.command).await;

    if let Err(e) = queue.disconnect().await {
        tracing::warn!(error = %e, "Disconnect reported an error");
    }
    result
}

async fn run(
    queue: &MultiQueue,
    config: &QueueConfig,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Push { values, retries } => {
            let policy = RetryPolicy::new(retries);
            for value in &values {
                retry_with_backoff(&policy, || queue.push(value)).await?;
            }
            tracing::info!(count = values.len(), "Pushed values");
        }
        Commands::Pop { timeout } => match queue.pop(timeout).await? {
            Some(value) => println!("{}", value),
            None => tracing::info!(timeout_secs = timeout, "Queue empty"),
        },
        Commands::Len => println!("{}", queue.length().await?),
        Commands::Status => {
            let status = queue.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Consume {
            timeout,
            metrics_addr,
        } => {
            let metrics_addr = match metrics_addr {
                Some(addr) => Some(addr),
                None if config.observability.metrics_enabled => {
                    Some(config.observability.metrics_address.parse()?)
                }
                None => None,
            };
            if let Some(addr) = metrics_addr {
                init_metrics(addr)?;
            }
            consume(queue, timeout).await;
        }
    }
    Ok(())
}

async fn consume(queue: &MultiQueue, timeout_secs: u64) {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(queue_key = %queue.queue_key(), "Consuming");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            result = queue.pop(timeout_secs) => match result {
                Ok(Some(value)) => {
                    backoff.reset();
                    println!("{}", value);
                }
                Ok(None) => backoff.reset(),
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Pop failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
