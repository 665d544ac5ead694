use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use defi_pattern_scanner::blockchain::{BlockchainClient, EtherscanSource, RateLimiter, RobustChain};
use defi_pattern_scanner::config::{DEFAULT_CONCURRENCY, DEFAULT_MAX_CHUNK};
use defi_pattern_scanner::contracts::default_targets;
use defi_pattern_scanner::core::WriterSink;
use defi_pattern_scanner::scanning::DEFAULT_MAX_SHRINKS;
use defi_pattern_scanner::*;

/// Proxy discovery and heuristic vulnerability triage for deployed contracts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ethereum RPC URL
    #[arg(long, env = "MAINNET_RPC")]
    rpc: String,

    /// Etherscan API key for verified source lookups
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    etherscan_key: String,

    /// Contract to scan, as NAME=ADDRESS (repeatable). Defaults to the Valantis deployments.
    #[arg(short, long = "target", value_name = "NAME=ADDRESS")]
    targets: Vec<String>,

    /// First block of the historical log scan. Omit to skip log scanning.
    #[arg(long)]
    from_block: Option<u64>,

    /// Last block of the log scan (defaults to the latest block)
    #[arg(long, requires = "from_block")]
    to_block: Option<u64>,

    /// Widest block range per eth_getLogs request
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK)]
    max_chunk: u64,

    /// Halvings allowed per sub-range when the provider rejects a range
    #[arg(long, default_value_t = DEFAULT_MAX_SHRINKS)]
    max_shrinks: u32,

    /// Targets analyzed at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Minimum spacing between RPC requests, in milliseconds
    #[arg(long, default_value_t = 100)]
    request_interval_ms: u64,

    /// Print a human-readable summary to stderr after the JSON report
    #[arg(long)]
    summary: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the report
    let default_filter = if args.verbose {
        "defi_pattern_scanner=debug"
    } else {
        "defi_pattern_scanner=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let targets = if args.targets.is_empty() {
        default_targets()?
    } else {
        args.targets
            .iter()
            .map(|spec| ScanTarget::parse(spec))
            .collect::<Result<Vec<_>>>()?
    };

    let mut config = ScanConfig::default()
        .with_concurrency(args.concurrency)
        .with_request_interval(Duration::from_millis(args.request_interval_ms));

    let client = Arc::new(BlockchainClient::new(&args.rpc, config.rpc.clone()).await?);
    tracing::info!("✓ Connected to {}", client.chain_name());

    if let Some(from_block) = args.from_block {
        let to_block = match args.to_block {
            Some(to_block) => to_block,
            None => client.block_number().await?,
        };
        config = config.with_log_scan(
            LogScanConfig::new(from_block, to_block)
                .with_max_chunk(args.max_chunk)
                .with_max_shrinks(args.max_shrinks),
        );
    }

    let sources = EtherscanSource::new(
        client.chain(),
        &args.etherscan_key,
        Arc::new(RateLimiter::new(config.source_request_interval)),
        config.rpc.clone(),
    )?;

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Ctrl-C received, letting in-flight requests finish");
            signal.trigger();
        }
    });

    let chain = RobustChain::new(client, config.rpc.clone());
    let orchestrator = ScanOrchestrator::builder()
        .chain_reader(Arc::new(chain))
        .source_provider(Arc::new(sources))
        .config(config)
        .shutdown(shutdown)
        .build()?;

    let report = orchestrator.run(&targets).await;

    WriterSink::new(std::io::stdout()).persist(&report).await?;
    if args.summary {
        eprintln!("{}", report);
    }

    Ok(())
}
