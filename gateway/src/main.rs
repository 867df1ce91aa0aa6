// ABOUTME: Operator CLI for the full node gateway
// ABOUTME: Inspects cluster routing and runs reorg-guarded log queries through a routed node

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use anyhow::{bail, Context};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use cluster_hashring::{ClusterManager, Router};
use dotenv::dotenv;
use gateway_core::{
    BlockNumber, BlockSelection, GatewayConfig, HttpFullNodeClient, LogFilter, MemoryLogStore,
    ReorgGuardedLogQuery, METRICS,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Full node routing and get-logs diagnostics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Full node URLs, comma separated
    #[arg(long, global = true, env = "FULLNODE_URLS", value_delimiter = ',')]
    nodes: Vec<String>,

    /// Get-logs deadline in milliseconds, retries included
    #[arg(long, global = true, env = "GET_LOGS_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Points per node on the hash ring
    #[arg(long, global = true, env = "HASH_RING_VIRTUAL_NODES")]
    virtual_nodes: Option<usize>,

    /// Keep each key on the node it was first routed to
    #[arg(long, global = true, env = "HASH_RING_REPARTITION", value_parser = BoolishValueParser::new())]
    repartition: Option<bool>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the names of all managed nodes
    Members,

    /// Print the node URL a request key routes to
    Route(RouteArgs),

    /// Show how sample keys spread across nodes
    Distribution(DistributionArgs),

    /// Fetch logs through the node a key routes to
    Logs(LogsArgs),
}

#[derive(clap::Args)]
struct RouteArgs {
    /// Request key, e.g. a client address
    #[arg(short, long)]
    key: String,
}

#[derive(clap::Args)]
struct DistributionArgs {
    /// Number of synthetic keys to route
    #[arg(short = 'n', long, default_value = "10000")]
    samples: usize,
}

#[derive(clap::Args)]
struct LogsArgs {
    /// Request key used to pick the node
    #[arg(short, long, default_value = "")]
    key: String,

    /// First block of the range
    #[arg(long)]
    from: Option<u64>,

    /// Last block of the range
    #[arg(long)]
    to: Option<u64>,

    /// Query a single block by hash instead of a range
    #[arg(long, conflicts_with_all = ["from", "to"])]
    block_hash: Option<String>,

    /// Print get-logs counters in Prometheus format to stderr when done
    #[arg(long)]
    metrics: bool,
}

impl Cli {
    /// Flags win over what `GatewayConfig::from_env` read.
    fn apply(&self, config: &mut GatewayConfig) {
        let nodes: Vec<String> = self
            .nodes
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect();
        if !nodes.is_empty() {
            config.node_urls = nodes;
        }
        if let Some(ms) = self.timeout_ms {
            config.get_logs_timeout = Duration::from_millis(ms);
        }
        if let Some(virtual_nodes) = self.virtual_nodes {
            config.ring.virtual_nodes = virtual_nodes;
        }
        if let Some(repartition) = self.repartition {
            config.repartition = repartition;
        }
    }
}

fn init_tracing(verbose: bool) {
    let is_production = std::env::var("NODE_ENV").unwrap_or_default() == "production";
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if is_production {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    cli.apply(&mut config);

    let cluster = config.cluster_manager();

    match cli.command {
        Commands::Members => {
            println!("{}", cluster);
        }
        Commands::Route(args) => {
            println!("{}", cluster.route(args.key.as_bytes()));
        }
        Commands::Distribution(args) => {
            print_distribution(&cluster, args.samples);
        }
        Commands::Logs(args) => {
            run_logs(&cluster, &config, args).await?;
        }
    }

    Ok(())
}

fn print_distribution(cluster: &ClusterManager, samples: usize) {
    let mut per_node: BTreeMap<String, usize> = BTreeMap::new();
    for node in cluster.list() {
        per_node.insert(node.url().to_string(), 0);
    }

    let mut unrouted = 0usize;
    for i in 0..samples {
        match cluster.distribute(format!("sample-{}", i).as_bytes()) {
            Some(node) => *per_node.entry(node.url().to_string()).or_default() += 1,
            None => unrouted += 1,
        }
    }

    for (url, count) in &per_node {
        let share = if samples > 0 {
            *count as f64 * 100.0 / samples as f64
        } else {
            0.0
        };
        println!("{:>8} {:>6.2}%  {}", count, share, url);
    }
    if unrouted > 0 {
        println!("{:>8}          (no node available)", unrouted);
    }
}

async fn run_logs(
    cluster: &ClusterManager,
    config: &GatewayConfig,
    args: LogsArgs,
) -> anyhow::Result<()> {
    let url = cluster.route(args.key.as_bytes());
    if url.is_empty() {
        bail!("no full node available; set FULLNODE_URLS or --nodes");
    }

    let filter = match args.block_hash {
        Some(raw) => {
            let hash: B256 = raw.parse().with_context(|| format!("invalid block hash {raw}"))?;
            LogFilter::block_hash(hash)
        }
        None => LogFilter {
            selection: BlockSelection::Range {
                from: args.from.map(BlockNumber::Number),
                to: args.to.map(BlockNumber::Number),
            },
            addresses: Vec::new(),
            topics: Vec::new(),
        },
    };

    tracing::info!(node = %url, "Querying logs");

    // No persistent store is attached here, so every filter goes to the node.
    let node = HttpFullNodeClient::new(&url)?;
    let query = ReorgGuardedLogQuery::new(Arc::new(MemoryLogStore::new()), config.get_logs_timeout);
    let result = query.get_logs(&node, &filter).await;

    if args.metrics {
        eprint!("{}", METRICS.to_prometheus());
    }

    let result = result?;
    for log in &result.logs {
        println!("{}", serde_json::to_string(log)?);
    }
    tracing::info!(count = result.logs.len(), "Logs fetched");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "gateway",
            "--nodes",
            "http://a:8545, ,http://b:8545",
            "--timeout-ms",
            "2500",
            "--virtual-nodes",
            "32",
            "--repartition",
            "true",
            "members",
        ])
        .unwrap();

        let mut config = GatewayConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.node_urls, vec!["http://a:8545", "http://b:8545"]);
        assert_eq!(config.get_logs_timeout, Duration::from_millis(2500));
        assert_eq!(config.ring.virtual_nodes, 32);
        assert!(config.repartition);
    }

    #[test]
    fn test_flags_fall_back_to_env() {
        std::env::set_var("FULLNODE_URLS", "http://env-a:8545,http://env-b:8545");
        std::env::set_var("GET_LOGS_TIMEOUT_MS", "750");
        std::env::set_var("HASH_RING_REPARTITION", "1");
        let cli = Cli::try_parse_from(["gateway", "members"]).unwrap();
        std::env::remove_var("FULLNODE_URLS");
        std::env::remove_var("GET_LOGS_TIMEOUT_MS");
        std::env::remove_var("HASH_RING_REPARTITION");

        let mut config = GatewayConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.node_urls, vec!["http://env-a:8545", "http://env-b:8545"]);
        assert_eq!(config.get_logs_timeout, Duration::from_millis(750));
        assert!(config.repartition);
    }

    #[test]
    fn test_block_hash_conflicts_with_range() {
        let parsed = Cli::try_parse_from([
            "gateway",
            "logs",
            "--from",
            "1",
            "--block-hash",
            "0x00",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_logs_metrics_flag() {
        let cli = Cli::try_parse_from(["gateway", "logs", "--from", "1", "--metrics"]).unwrap();
        match cli.command {
            Commands::Logs(args) => assert!(args.metrics),
            _ => panic!("expected logs subcommand"),
        }
    }
}
