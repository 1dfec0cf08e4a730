//! rfcache - run one node of the replicated cache.

mod observability;

use anyhow::{Context, Result};
use clap::Parser;
use observability::{LogFormat, TracingConfig, init_tracing};
use rfcache_cluster::{CacheNode, NodeConfig};
use std::path::PathBuf;

/// Replicated key-value cache node.
#[derive(Parser, Debug)]
#[command(name = "rfcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node name; the data directory defaults to ./<node>
    #[arg(long, default_value = "node1")]
    node: String,

    /// Address to bind and advertise
    #[arg(long, default_value = "127.0.0.1")]
    addr: String,

    /// HTTP API port
    #[arg(long, alias = "api_port", default_value_t = 7000)]
    api_port: u16,

    /// Raft transport port
    #[arg(long, alias = "raft_port", default_value_t = 7100)]
    raft_port: u16,

    /// Start a new cluster with this node as its only member
    #[arg(long)]
    bootstrap: bool,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut builder = NodeConfig::builder()
            .node_name(&self.node)
            .addr(&self.addr)
            .api_port(self.api_port)
            .raft_port(self.raft_port)
            .bootstrap(self.bootstrap);

        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir);
        }

        builder
            .build()
            .map_err(anyhow::Error::msg)
            .context("Invalid node configuration")
    }
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => "info",
        1 => "debug,openraft=info",
        2 => "debug",
        _ => "trace",
    };

    // Check for explicit log format override, otherwise auto-detect
    let log_format = std::env::var("RFCACHE_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or_else(|| {
            if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            }
        });

    // Build config, respecting RUST_LOG if set
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string());

    let config = TracingConfig::builder()
        .log_format(log_format)
        .log_filter(log_filter)
        .build();

    init_tracing(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = cli.node_config()?;
    let mut node = CacheNode::start(config)
        .await
        .context("Failed to start cache node")?;

    println!("rfcache node '{}' running", cli.node);
    println!("  api:  http://{}", node.api_addr());
    println!("  raft: {}", node.raft_addr());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("shutting down");
    node.shutdown().await.context("Failed to shut down node")?;
    Ok(())
}
