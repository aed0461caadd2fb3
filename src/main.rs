use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;
use topocache::config::Config;
use topocache::error::ConfigError;
use topocache::health::HealthCheckManager;
use topocache::modes::Connector;
use topocache::utils::format_duration;
use topocache::{TopologyConnector, TopologyMode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topocache")]
#[command(about = "A uniform read/write cache client over Redis master-replica, sentinel, cluster and RedisRaft topologies")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Topocache Team")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/dev.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, print endpoints and node health
    Check,
    /// Read a key
    Get {
        key: String,
        /// Read from replicas in random order
        #[arg(long)]
        random: bool,
    },
    /// Write a key
    Set { key: String, value: String },
    /// Write synthetic keys across a cluster (Ctrl-C stops early)
    FillCluster {
        /// Number of keys, defaults to cluster.fill_count
        #[arg(long)]
        count: Option<usize>,
    },
    /// Generate example configuration files
    Config {
        /// Topology mode (MasterReplica, Sentinel, Cluster or Consensus)
        #[arg(short, long)]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            let (config, connector) = open(&cli.config).await?;
            let outcome = check(&config, &connector).await;
            connector.close().await;
            outcome?;
        }
        Commands::Get { key, random } => {
            let (_, connector) = open(&cli.config).await?;
            let outcome = if random {
                connector.random_replica_read(&key).await
            } else {
                connector.read(&key).await
            };
            connector.close().await;
            match outcome.with_context(|| format!("Failed to read '{}'", key))? {
                Some(value) => println!("{}", value),
                None => println!("(nil)"),
            }
        }
        Commands::Set { key, value } => {
            let (_, connector) = open(&cli.config).await?;
            let outcome = connector.write(&key, &value).await;
            connector.close().await;
            if outcome.with_context(|| format!("Failed to write '{}'", key))? {
                println!("OK");
            } else {
                println!("Write declined");
            }
        }
        Commands::FillCluster { count } => {
            let (config, connector) = open(&cli.config).await?;
            let count = count.unwrap_or(config.redis.cluster.fill_count);
            let outcome = fill_cluster(&connector, count).await;
            connector.close().await;
            outcome?;
        }
        Commands::Config { mode, output } => {
            generate_config(&mode, &output)?;
        }
        Commands::Validate => {
            validate_config(&cli.config)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

/// Load config, start logging, build the connector
async fn open(config_path: &Path) -> Result<(Config, Connector)> {
    let config = Config::load_from_file(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;
    info!("Starting topocache v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {:?}", config_path);

    let connector = topocache::connect(&config.redis)
        .await
        .with_context(|| format!("Failed to build {} connector", config.redis.mode))?;
    Ok((config, connector))
}

async fn check(config: &Config, connector: &Connector) -> Result<()> {
    println!("Mode:             {}", connector.mode());
    println!("Master endpoint:  {}", connector.master_endpoint());
    println!("Replica endpoint: {}", connector.replica_endpoint());

    let manager = HealthCheckManager::new(config.redis.connect_timeout());
    let results = manager.check_all(&connector.health_checkers()).await;
    let healthy = results.iter().filter(|r| r.status.is_healthy()).count();

    println!("Nodes ({}/{} healthy):", healthy, results.len());
    for result in &results {
        let mark = if result.status.is_healthy() { "✓" } else { "✗" };
        println!("  {} {} - {}", mark, result.target, result.status);
    }

    match connector {
        Connector::Sentinel(sentinel) => {
            let discovery = sentinel.rediscover_master().await?;
            if discovery.changed() {
                println!(
                    "Master of '{}' moved: bound to {}, sentinels now report {}",
                    sentinel.master_name(),
                    discovery.bound,
                    discovery.advertised
                );
            } else {
                println!("Sentinel master unchanged: {}", discovery.advertised);
            }
        }
        Connector::Cluster(cluster) => match cluster.topology().await {
            Ok(map) => {
                let coverage = map.coverage();
                println!(
                    "Slots: {}/{} covered ({:.1}%) by {} masters",
                    coverage.assigned_slots,
                    coverage.total_slots,
                    coverage.coverage_percentage,
                    map.masters().len()
                );
                for master in map.masters() {
                    println!("  {} ({} replicas)", master, map.replica_count(&master));
                }
            }
            Err(e) => warn!("Could not read cluster topology: {}", e),
        },
        Connector::Consensus(consensus) => match consensus.raft_info().await {
            Ok(info) => println!("{}", info.trim_end()),
            Err(e) => warn!("Could not read RAFT.INFO: {}", e),
        },
        Connector::MasterReplica(_) => {}
    }

    if healthy < results.len() {
        anyhow::bail!("{} of {} nodes unhealthy", results.len() - healthy, results.len());
    }
    Ok(())
}

async fn fill_cluster(connector: &Connector, count: usize) -> Result<()> {
    if connector.mode() != TopologyMode::Cluster {
        println!("fill-cluster only applies to Cluster mode, nothing to do");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping fill");
            let _ = shutdown_tx.send(true);
        }
    });

    let started = Instant::now();
    let report = connector.fill_cluster(count, &shutdown_rx).await?;

    println!(
        "Attempted {} keys: {} written, {} skipped, {} distinct slots in {}",
        report.attempted,
        report.written,
        report.skipped,
        report.distinct_slots,
        format_duration(started.elapsed())
    );
    if report.cancelled {
        anyhow::bail!("Fill cancelled before completion");
    }
    if !report.success {
        anyhow::bail!("Final marker write failed");
    }
    println!("Fill completed successfully");
    Ok(())
}

fn generate_config(mode: &str, output: &Path) -> Result<()> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(output, mode).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  topocache --config {:?} check", output);

    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Topology mode: {}", config.redis.mode);
            println!("  Connect timeout: {}ms", config.redis.connect_timeout_ms);

            let nodes = match config.redis.mode.parse::<TopologyMode>()? {
                TopologyMode::MasterReplica => {
                    let section = &config.redis.master_replica;
                    let mut nodes = vec![format!("{} (master)", section.master)];
                    nodes.extend(section.replicas.iter().map(|r| format!("{} (replica)", r)));
                    nodes
                }
                TopologyMode::Sentinel => {
                    let section = &config.redis.sentinel;
                    println!("  Sentinel service: {}", section.master_name);
                    let mut nodes: Vec<String> =
                        section.sentinels.iter().map(|s| format!("{} (sentinel)", s)).collect();
                    nodes.extend(section.nodes.iter().cloned());
                    nodes
                }
                TopologyMode::Cluster => config.redis.cluster.nodes.clone(),
                TopologyMode::Consensus => config.redis.consensus.nodes.clone(),
            };

            println!("  Nodes: {} instances", nodes.len());
            for (i, node) in nodes.iter().enumerate() {
                println!("    {}: {}", i + 1, node);
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("topocache v{}", env!("CARGO_PKG_VERSION"));
    println!("A uniform read/write cache client over Redis topologies");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Topologies:");
    for mode in TopologyMode::ALL {
        println!("  • {}", mode);
    }
}

fn init_logging(config: &Config) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let result = match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized at level: {}", config.logging.level);
    Ok(())
}
