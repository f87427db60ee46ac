use anyhow::Result;
use fedkick::{run_server, TrainConfig};
use fedkick_async_trainer::{
    AsyncTrainer, AsyncTrainerConfig, ClientError, HttpModelClient, HttpModelClientConfig,
    ModelClient, RetryPolicy,
};
use fedkick_candle_agent::{dqn::DqnConfig, mlp::QNetConfig};
use fedkick_core::{
    record::BufferedRecorder,
    soccer::{SoccerConfig, SoccerEnv},
    Roster, Stats, UpdateRequest,
};
use fedkick_server::{ModelInitConfig, ServerConfig, StoreConfig};
use std::{collections::BTreeMap, net::SocketAddr};
use tempdir::TempDir;
use tokio::sync::oneshot;

const HIDDEN: [usize; 2] = [16, 16];

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start(store: StoreConfig) -> Self {
        let config = ServerConfig::default()
            .addr("127.0.0.1:0")
            .store(store)
            .model(ModelInitConfig::default().hidden(HIDDEN.to_vec()));
        let (shutdown, rx) = oneshot::channel::<()>();
        let (addr_tx, addr_rx) = oneshot::channel();
        let handle = tokio::spawn(run_server(
            config,
            async move {
                let _ = rx.await;
            },
            move |addr| {
                let _ = addr_tx.send(addr);
            },
        ));
        let addr = addr_rx.await.unwrap();
        Self {
            addr,
            shutdown: Some(shutdown),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    fn client(&self) -> HttpModelClient {
        let fast = RetryPolicy {
            retries: 1,
            backoff_ms: 10,
        };
        HttpModelClient::new(HttpModelClientConfig {
            base_url: format!("http://{}", self.addr),
            model_retry: fast.clone(),
            upload_retry: fast,
            timeout_ms: 5_000,
        })
        .unwrap()
    }

    async fn aggregate(&self) {
        let resp = reqwest::Client::new()
            .post(self.url("aggregate"))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    async fn stats(&self) -> Stats {
        reqwest::get(self.url("stats")).await.unwrap().json().await.unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn bias_delta(bias: f32) -> BTreeMap<String, Vec<f32>> {
    [("dense_2.bias".to_string(), vec![bias; 10])].into_iter().collect()
}

#[test_log::test(tokio::test)]
async fn scenario_concurrent_deltas_then_stale_after_aggregation() {
    let server = TestServer::start(StoreConfig::Memory).await;
    let client = server.client();
    let gregory = Roster::default().parse("gregory").unwrap();

    // Fresh identity: version 0 with small zero-mean weights.
    let model = client.fetch_model(&gregory).await.unwrap();
    assert_eq!(model.version, 0);
    let all: Vec<f32> = model.weights.values().flatten().copied().collect();
    assert!(all.iter().all(|v| v.abs() <= 0.05));
    assert!((all.iter().sum::<f32>() / all.len() as f32).abs() < 0.01);

    // Two deltas against the same version coexist.
    for bias in [0.5, 1.5] {
        let ack = client
            .upload_delta(&UpdateRequest::new(&gregory, 0, 32, bias_delta(bias)))
            .await
            .unwrap();
        assert!(ack.ok);
    }
    assert_eq!(server.stats().await.per_agent["gregory"], 2);

    server.aggregate().await;
    let after = client.fetch_model(&gregory).await.unwrap();
    assert_eq!(after.version, 1);
    for (a, b) in after.weights["dense_2.bias"]
        .iter()
        .zip(model.weights["dense_2.bias"].iter())
    {
        assert!((a - b - 0.1).abs() < 1e-6);
    }

    let err = client
        .upload_delta(&UpdateRequest::new(&gregory, 0, 32, bias_delta(0.5)))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 409, .. }));
    assert_eq!(server.stats().await.total, 2);

    server.stop().await;
}

#[test]
fn scenario_far_kick_changes_nothing() {
    let mut kicked = SoccerEnv::new(SoccerConfig::default());
    let mut idle = SoccerEnv::new(SoccerConfig::default());
    for env in [&mut kicked, &mut idle] {
        env.reset(3);
        env.ball_mut().vx = 2.0;
        env.ball_mut().vy = -1.0;
    }

    let reach = kicked.config().player_radius + kicked.config().ball_radius + 0.3;
    let p = &kicked.players()[0];
    let b = kicked.ball();
    assert!((b.x - p.x).hypot(b.y - p.y) > reach);

    // Action 9 is a kick, action 0 is idle.
    kicked.step(9, 0);
    idle.step(0, 0);
    assert_eq!(kicked.ball().vx, idle.ball().vx);
    assert_eq!(kicked.ball().vy, idle.ball().vy);
    assert_eq!(kicked.possession(), 0);
    assert_eq!(kicked.possession(), idle.possession());
}

#[test_log::test(tokio::test)]
async fn training_client_round_trip() -> Result<()> {
    let dir = TempDir::new("fedkick_e2e")?;
    let server = TestServer::start(StoreConfig::Fs {
        root: dir.path().to_path_buf(),
    })
    .await;

    let env = SoccerConfig::default().max_steps(60);
    let config = TrainConfig {
        client: HttpModelClientConfig {
            base_url: format!("http://{}", server.addr),
            ..Default::default()
        },
        trainer: AsyncTrainerConfig::default()
            .episodes_per_iteration(8)
            .batch_size(16)
            .max_iterations(2),
        agent: DqnConfig::default().q_config(QNetConfig::new(
            env.obs_dim(),
            HIDDEN.to_vec(),
            env.n_actions(),
        )),
        env,
        roster: Roster::default(),
    };

    let mut agents = config.build_agents()?;
    let client = std::sync::Arc::new(HttpModelClient::new(config.client.clone())?);
    let mut trainer = AsyncTrainer::build(
        config.trainer.clone(),
        config.env.clone(),
        &config.roster,
        client.clone(),
    )?;
    let mut recorder = BufferedRecorder::new();
    let stat = trainer.train(&mut agents, &mut recorder).await?;

    assert_eq!(stat.iterations, 2);
    assert_eq!(recorder.len(), 2);
    assert!(stat.queued > 0);
    assert!(trainer.queue().is_empty());

    // Every queued delta was accepted against version 0.
    let stats = server.stats().await;
    assert_eq!(stats.total, stat.queued as u64);

    server.aggregate().await;
    for who in config.roster.iter() {
        let model = client.fetch_model(who).await?;
        let expected = if stats.per_agent[who.as_str()] > 0 { 1 } else { 0 };
        assert_eq!(model.version, expected);
    }

    server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_update_is_stored_once_when_stats_cannot_be_written() -> Result<()> {
    let dir = TempDir::new("fedkick_e2e_stats")?;
    // A directory where the counters file should be makes every stats write fail.
    std::fs::create_dir_all(dir.path().join("stats/training.json"))?;
    let server = TestServer::start(StoreConfig::Fs {
        root: dir.path().to_path_buf(),
    })
    .await;
    let client = server.client();
    let fred = Roster::default().parse("fred")?;

    client.fetch_model(&fred).await?;
    let ack = client
        .upload_delta(&UpdateRequest::new(&fred, 0, 8, bias_delta(0.5)))
        .await?;
    assert!(ack.ok);
    assert_eq!(ack.stats, None);

    let records: Vec<_> = std::fs::read_dir(dir.path().join("updates/fred"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".json"))
        .collect();
    assert_eq!(records.len(), 1);

    server.stop().await;
    Ok(())
}
