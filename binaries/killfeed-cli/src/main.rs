//! Killfeed CLI
//!
//! Live zKillboard feed in the terminal.
//!
//! ```bash
//! killfeed watch                  # follow the feed, print the working set every 5s
//! killfeed watch --top 20 --every 2
//! killfeed queue-id --reset       # start a fresh RedisQ queue
//! killfeed config                 # show the effective configuration
//! ```

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use killfeed_config::FeedConfig;
use killfeed_core::{Clock, SystemClock};
use killfeed_redisq::{ConnectionMonitor, MonitorHandle, QueueIdentity};
use killfeed_store::KillStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "killfeed")]
#[command(about = "Live kill feed with value-scaled retention")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/killfeed/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the feed until Ctrl-C
    Watch {
        /// Override the RedisQ endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Server wait hint in seconds (1-10)
        #[arg(long)]
        wait_secs: Option<u64>,

        /// Use this queue id instead of the stored one
        #[arg(long)]
        queue_id: Option<String>,

        /// Seconds between working-set reports
        #[arg(long, default_value_t = 5)]
        every: u64,

        /// Rows per report
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Pin this kill id while it is live
        #[arg(long)]
        focus: Option<u64>,
    },

    /// Print the persisted RedisQ queue id
    QueueId {
        /// Generate and store a fresh id
        #[arg(long)]
        reset: bool,
    },

    /// Print the effective configuration as YAML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = FeedConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Watch {
            endpoint,
            wait_secs,
            queue_id,
            every,
            top,
            focus,
        } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(wait_secs) = wait_secs {
                config.wait_secs = wait_secs;
            }
            if queue_id.is_some() {
                config.queue_id = queue_id;
            }
            config.validate().context("invalid command-line override")?;

            watch(config, Duration::from_secs(every.max(1)), top, focus).await
        }
        Commands::QueueId { reset } => {
            let identity = QueueIdentity::at_path(config.queue_id_path());
            let id = if reset {
                identity.reset()
            } else {
                identity.load_or_create()
            }
            .with_context(|| format!("queue id file {}", identity.path().display()))?;
            println!("{}", id);
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "killfeed=info,killfeed_core=info,killfeed_store=info,killfeed_redisq=info".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn watch(config: FeedConfig, every: Duration, top: usize, focus: Option<u64>) -> Result<()> {
    let clock = SystemClock::new();
    let store = Arc::new(KillStore::new(config.retention_policy()));
    let connection = Arc::new(ConnectionMonitor::new(Arc::new(clock.clone())));

    let handle = MonitorHandle::spawn(&config, store.clone(), connection.clone())
        .context("starting kill monitor")?;

    // Two missed long-polls in a row reads as stalled
    let stale_after = chrono::Duration::from_std(config.request_timeout().saturating_mul(2))
        .unwrap_or_else(|_| chrono::Duration::days(1));

    let mut ticker = tokio::time::interval(every);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(id) = focus {
                    store.focus(id).await;
                }
                let now = clock.now();
                let snapshot = store.snapshot().await;
                let live = connection.is_live(now, stale_after);
                print!(
                    "{}",
                    report::render(&snapshot, store.policy(), now, top, live, handle.stats())
                );
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
