// src/bin/hashlet.rs
// Command-line driver for the in-memory hash chain

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use hashlet_chain::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hashlet")]
#[command(about = "Append-only hash chain with TTL expiry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file (defaults to HASHLET_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Append payloads to a fresh chain and print it
    Append {
        /// Payloads, appended in order
        #[arg(required = true)]
        payloads: Vec<String>,

        /// Flag every appended node as bumped
        #[arg(short, long)]
        bumped: bool,

        /// Print nodes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append payloads, advance a simulated clock, then sweep
    Simulate {
        /// Hours to advance before sweeping
        #[arg(long)]
        hours: f64,

        /// Payloads appended with the bumped flag
        #[arg(long = "bumped")]
        bumped: Vec<String>,

        /// Payloads appended with the default TTL
        payloads: Vec<String>,
    },

    /// Append lines from stdin while the background sweeper runs
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ChainConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChainConfig::from_env().context("reading config from environment")?,
    };

    match cli.command {
        Commands::Append {
            payloads,
            bumped,
            json,
        } => {
            let store = ChainStore::new(&config);
            for payload in &payloads {
                if bumped {
                    store.append_bumped(payload)?;
                } else {
                    store.append(payload)?;
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&store.nodes())?);
            } else {
                for node in store.nodes() {
                    print_node(&node);
                }
            }

            if let Some(head) = store.head() {
                println!("path to root: {:?}", store.path_to_root(head)?);
            }
        }

        Commands::Simulate {
            hours,
            bumped,
            payloads,
        } => {
            if !hours.is_finite() || hours < 0.0 {
                anyhow::bail!("--hours must be a non-negative number");
            }

            let clock = Arc::new(ManualClock::new(Utc::now()));
            let store = Arc::new(ChainStore::with_clock(&config, clock.clone()));
            let scheduler = ExpiryScheduler::new(store.clone(), &config);

            for payload in &bumped {
                store.append_bumped(payload)?;
            }
            for payload in &payloads {
                store.append(payload)?;
            }

            let step = Duration::try_seconds((hours * 3600.0) as i64)
                .ok_or_else(|| anyhow::anyhow!("--hours {} is out of range", hours))?;
            clock
                .try_advance(step)
                .ok_or_else(|| anyhow::anyhow!("--hours {} overflows the clock", hours))?;
            let removed = scheduler.sweep(clock.now());

            println!("advanced {}h, removed: {:?}", hours, removed);
            println!("surviving:");
            for node in store.nodes() {
                print_node(&node);
            }
        }

        Commands::Watch => {
            let store = Arc::new(ChainStore::new(&config));
            let scheduler = Arc::new(ExpiryScheduler::new(store.clone(), &config));
            let sweeper = scheduler.clone().start();

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                match store.append(line.trim()) {
                    Ok(id) => {
                        if let Some(node) = store.get(id) {
                            print_node(&node);
                        }
                    }
                    Err(e) => eprintln!("skipped: {}", e),
                }
            }

            sweeper.abort();
            let stats = scheduler.stats();
            println!(
                "{} nodes live, {} swept over {} sweeps",
                store.len(),
                stats.nodes_removed,
                stats.sweeps
            );
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_node(node: &Node) {
    let parent = node
        .parent_id
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "#{:<4} parent={:<4} hash={} {}{}  {}",
        node.id,
        parent,
        node.hash.short(),
        node.hash.fingerprint(),
        if node.bumped { " bumped" } else { "" },
        String::from_utf8_lossy(&node.payload)
    );
}
