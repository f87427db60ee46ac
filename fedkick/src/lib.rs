//! Federated two-agent soccer.
//!
//! This crate wires the library crates into the `fedkick-server` and
//! `fedkick-train` binaries:
//!
//! * [`fedkick_core`] provides the soccer environment and the types exchanged
//!   with the server.
//! * [`fedkick_candle_agent`] provides the double DQN learner.
//! * [`fedkick_async_trainer`] runs self-play and synchronizes with the server.
//! * [`fedkick_server`] serves models and aggregates deltas.
use anyhow::Result;
use fedkick_async_trainer::{AgentRegistry, AsyncTrainerConfig, HttpModelClientConfig};
use fedkick_candle_agent::dqn::{Dqn, DqnConfig};
use fedkick_core::{soccer::SoccerConfig, Roster};
use fedkick_server::{App, ServerConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    future::Future,
    io::{BufReader, Write},
    net::SocketAddr,
    path::Path,
};
use tokio::sync::watch;

/// Configuration of a training client.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    /// Connection to the server.
    pub client: HttpModelClientConfig,

    /// Training loop.
    pub trainer: AsyncTrainerConfig,

    /// Soccer environment.
    pub env: SoccerConfig,

    /// Learner of each participant.
    pub agent: DqnConfig,

    /// The two participants.
    pub roster: Roster,
}

impl TrainConfig {
    /// Constructs [`TrainConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Builds one learner per participant.
    ///
    /// The `i`-th participant's learner is seeded with the agent seed plus `i`.
    pub fn build_agents(&self) -> Result<AgentRegistry<Dqn>> {
        let q = self.agent.get_q_config();
        if q.get_in_dim() != self.env.obs_dim() || q.get_out_dim() != self.env.n_actions() {
            anyhow::bail!(
                "Q-network maps {} inputs to {} outputs, the environment needs {} and {}",
                q.get_in_dim(),
                q.get_out_dim(),
                self.env.obs_dim(),
                self.env.n_actions()
            );
        }

        let seed = self.agent.get_seed();
        AgentRegistry::build(&self.roster, |who| {
            let i = self.roster.index_of(who).unwrap_or(0) as u64;
            Dqn::build(self.agent.clone().seed(seed.wrapping_add(i)))
        })
    }
}

/// Runs the server until `shutdown` resolves.
///
/// If the configuration sets an aggregation interval, the aggregator runs on
/// it in a background task. `on_bind` receives the bound address.
pub async fn run_server(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
    on_bind: impl FnOnce(SocketAddr),
) -> Result<()> {
    let addr: SocketAddr = config.addr.parse()?;
    let app = App::build(&config)?;

    let (stop_sender, stop) = watch::channel(false);
    let aggregator = app.aggregator().clone();
    let scheduled = tokio::spawn(async move { aggregator.run(stop).await });
    if let Some(period) = config.aggregator.interval() {
        info!("Aggregating every {:?}", period);
    }

    let (local_addr, server) = fedkick_server::bind(app, addr, shutdown)?;
    on_bind(local_addr);
    let result = server.await;

    let _ = stop_sender.send(true);
    scheduled.await?;
    info!("Server stopped");
    Ok(result?)
}
