use anyhow::Result;
use clap::Parser;
use fedkick::run_server;
use fedkick_server::{ServerConfig, StoreConfig};
use log::info;
use std::path::PathBuf;

/// Aggregation server of fedkick.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML configuration; defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Writes the effective configuration to this file and exits
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long)]
    addr: Option<String>,

    /// Keeps state in files under this directory instead of in memory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Aggregates on this interval in milliseconds
    #[arg(long)]
    aggregate_interval_ms: Option<u64>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = &args.addr {
        config.addr = addr.clone();
    }
    if let Some(root) = &args.store_dir {
        config.store = StoreConfig::Fs { root: root.clone() };
    }
    if let Some(ms) = args.aggregate_interval_ms {
        config.aggregator.interval_ms = Some(ms);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        info!("Wrote {}", path.display());
        return Ok(());
    }

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    };
    run_server(config, shutdown, |_| {}).await
}
