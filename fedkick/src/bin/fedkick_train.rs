use anyhow::Result;
use clap::Parser;
use fedkick::TrainConfig;
use fedkick_async_trainer::{AsyncTrainer, HttpModelClient};
use fedkick_core::record::LogRecorder;
use log::info;
use std::{path::PathBuf, sync::Arc};

/// Self-play training client of fedkick.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML configuration; defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Writes the effective configuration to this file and exits
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Base URL of the server, overrides the configuration
    #[arg(short, long)]
    server: Option<String>,

    /// Stops after this many iterations
    #[arg(long)]
    max_iterations: Option<usize>,
}

fn load_config(args: &Args) -> Result<TrainConfig> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::load(path)?,
        None => TrainConfig::default(),
    };
    if let Some(url) = &args.server {
        config.client.base_url = url.clone();
    }
    if let Some(n) = args.max_iterations {
        config.trainer.max_iterations = Some(n);
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

    let client = Arc::new(HttpModelClient::new(config.client.clone())?);
    let mut agents = config.build_agents()?;
    let mut trainer = AsyncTrainer::build(
        config.trainer.clone(),
        config.env.clone(),
        &config.roster,
        client,
    )?;

    let stop = trainer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stopping after the current iteration");
            stop.stop();
        }
    });

    let mut recorder = LogRecorder::new("train");
    trainer.train(&mut agents, &mut recorder).await?;
    Ok(())
}
