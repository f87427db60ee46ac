use crate::{
    run_episode, AgentRegistry, AsyncTrainStat, AsyncTrainerConfig, ModelClient, OutboundQueue,
    Pairing, PairingSampler, TrainerMessage,
};
use anyhow::{anyhow, Result};
use fedkick_core::{
    record::{Record, RecordValue::Scalar, Recorder},
    soccer::{SoccerConfig, SoccerEnv},
    Learner, Roster, UpdateRequest,
};
use log::{debug, info, warn};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, watch};

/// Result of [`flush_once`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Deltas accepted by the server.
    pub uploaded: usize,

    /// Deltas answered with an error status; they are not resent.
    pub dropped: usize,

    /// Deltas put back into the queue after transport failures.
    pub requeued: usize,
}

/// Uploads every queued delta once.
///
/// The queue is swapped out first, so deltas queued during the upload wait
/// for the next call. Deltas the server answered with an error status (stale
/// versions, validation or server errors) are dropped, since the server may
/// already hold them. Deltas that could not be delivered are put back.
pub async fn flush_once<C: ModelClient + ?Sized>(client: &C, queue: &OutboundQueue) -> FlushOutcome {
    let pending = queue.take_all();
    let mut outcome = FlushOutcome::default();
    let mut failed = vec![];

    for item in pending.into_iter() {
        match client.upload_delta(&item).await {
            Ok(_) => outcome.uploaded += 1,
            Err(e) if e.is_retryable() => {
                warn!("Upload of a delta of {} failed, kept for the next flush: {}", item.who, e);
                failed.push(item);
            }
            Err(e) if e.status().is_some() => {
                warn!("Dropped a delta of {} (base version {}): {}", item.who, item.base_version, e);
                outcome.dropped += 1;
            }
            Err(e) => {
                // The server answered with success.
                warn!("Unreadable response to an upload of {}: {}", item.who, e);
                outcome.uploaded += 1;
            }
        }
    }

    outcome.requeued = failed.len();
    queue.requeue(failed);
    if outcome != FlushOutcome::default() {
        info!(
            "Flushed deltas: {} uploaded, {} dropped, {} requeued",
            outcome.uploaded, outcome.dropped, outcome.requeued
        );
    }
    outcome
}

/// Fetches the model of every participant and sends it to the training task.
///
/// Fetch failures are logged and skipped. Returns the number of snapshots sent.
pub async fn refresh_once<C: ModelClient + ?Sized>(
    client: &C,
    roster: &Roster,
    sender: &mpsc::Sender<TrainerMessage>,
) -> Result<usize> {
    let mut n = 0;
    for who in roster.iter() {
        match client.fetch_model(who).await {
            Ok(model) => {
                debug!("Fetched model of {} at version {}", who, model.version);
                sender
                    .send(TrainerMessage::ModelParams {
                        who: who.clone(),
                        model,
                    })
                    .await
                    .map_err(|_| anyhow!("The training task is gone"))?;
                n += 1;
            }
            Err(e) => warn!("Failed to refresh the model of {}: {}", who, e),
        }
    }
    Ok(n)
}

async fn flush_task<C: ModelClient + ?Sized>(
    client: Arc<C>,
    queue: OutboundQueue,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                flush_once(client.as_ref(), &queue).await;
            }
            _ = stop.changed() => break,
        }
    }
    flush_once(client.as_ref(), &queue).await;
    debug!("Flush task stopped");
}

async fn refresh_task<C: ModelClient + ?Sized>(
    client: Arc<C>,
    roster: Roster,
    period: Duration,
    sender: mpsc::Sender<TrainerMessage>,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = refresh_once(client.as_ref(), &roster, &sender).await {
                    warn!("{}", e);
                    break;
                }
            }
            _ = stop.changed() => break,
        }
    }
    debug!("Refresh task stopped");
}

/// Stops a running [`AsyncTrainer::train`].
///
/// The flag is checked at the top of every training iteration.
#[derive(Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Requests the trainer to stop.
    pub fn stop(&self) {
        // Fails only when the trainer is already dropped.
        let _ = self.sender.send(true);
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Client-side trainer interleaving self-play, local training and upload.
///
/// ```mermaid
/// flowchart LR
///     R[Refresh task] -- TrainerMessage --> T[Training task]
///     T -- UpdateRequest --> Q[(OutboundQueue)]
///     Q --> F[Flush task]
///     F -- POST /update --> S[Server]
///     S -- GET /model --> R
/// ```
///
/// One training iteration:
///
/// 1. Apply model snapshots received from the refresh task.
/// 2. Play `episodes_per_iteration` episodes with pairings drawn by
///    [`PairingSampler`] and feed the transitions to the replay buffers.
/// 3. For each participant with a known server version and at least
///    `batch_size` transitions, sample a batch, snapshot the output layer,
///    run `local_update_steps` optimization steps and queue the delta.
/// 4. Write a status record.
pub struct AsyncTrainer<C: ModelClient + ?Sized + 'static> {
    config: AsyncTrainerConfig,
    client: Arc<C>,
    roster: Roster,
    queue: OutboundQueue,
    env: SoccerEnv,
    sampler: PairingSampler,
    rng: SmallRng,
    iteration: usize,
    stat: AsyncTrainStat,
    stop_sender: Arc<watch::Sender<bool>>,
    stop: watch::Receiver<bool>,
}

impl<C: ModelClient + ?Sized + 'static> AsyncTrainer<C> {
    /// Constructs the trainer.
    pub fn build(
        config: AsyncTrainerConfig,
        env_config: SoccerConfig,
        roster: &Roster,
        client: Arc<C>,
    ) -> Result<Self> {
        let sampler = PairingSampler::build(roster, &config.pairing, config.seed)?;
        let rng = SmallRng::seed_from_u64(config.seed.wrapping_add(1));
        let (stop_sender, stop) = watch::channel(false);

        Ok(Self {
            config,
            client,
            roster: roster.clone(),
            queue: OutboundQueue::new(),
            env: SoccerEnv::new(env_config),
            sampler,
            rng,
            iteration: 0,
            stat: AsyncTrainStat::default(),
            stop_sender: Arc::new(stop_sender),
            stop,
        })
    }

    /// Handle to stop [`AsyncTrainer::train`] from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            sender: self.stop_sender.clone(),
        }
    }

    /// The queue of deltas waiting for upload.
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Number of finished iterations.
    pub fn n_iterations(&self) -> usize {
        self.iteration
    }

    /// Fetches the initial model of every participant.
    ///
    /// Participants whose model cannot be fetched keep no server version and
    /// are skipped by uploads until a refresh succeeds.
    pub async fn init_agents<L: Learner>(&self, agents: &mut AgentRegistry<L>) {
        for (who, agent) in agents.iter_mut() {
            match self.client.fetch_model(who).await {
                Ok(model) => {
                    if let Err(e) = agent.set_weights_from_server(&model) {
                        warn!("Failed to apply the model of {}: {}", who, e);
                    }
                }
                Err(e) => warn!("Failed to fetch the initial model of {}: {}", who, e),
            }
        }
    }

    fn apply(&self, agents: &mut AgentRegistry<impl Learner>, msg: TrainerMessage) {
        match msg {
            TrainerMessage::ModelParams { who, model } => match agents.get_mut(&who) {
                Some(agent) => {
                    if let Err(e) = agent.set_weights_from_server(&model) {
                        warn!("Failed to apply the model of {}: {}", who, e);
                    }
                }
                None => warn!("Received a model of an unknown participant {}", who),
            },
        }
    }

    fn update_agents<L: Learner>(
        &mut self,
        agents: &mut AgentRegistry<L>,
        record: &mut Record,
    ) -> Result<()> {
        for (who, agent) in agents.iter_mut() {
            let version = match agent.version() {
                Some(v) => v,
                None => {
                    debug!("Skip {}: no server version yet", who);
                    continue;
                }
            };
            let batch = match agent.sample_batch(self.config.batch_size) {
                Some(batch) => batch,
                None => continue,
            };

            let before = agent.snapshot_last_layer()?;
            let mut loss = 0f32;
            for _ in 0..self.config.local_update_steps {
                loss += agent.train_step(&batch)?;
                agent.maybe_sync_target()?;
            }
            let delta = agent.export_last_layer_delta(&before)?;
            self.queue
                .push(UpdateRequest::new(who, version, batch.len(), delta));
            self.stat.queued += 1;

            let n = self.config.local_update_steps.max(1) as f32;
            record.insert(format!("loss_{}", who), Scalar(loss / n));
        }
        Ok(())
    }

    /// Runs one training iteration and returns its status record.
    pub fn iteration<L: Learner>(&mut self, agents: &mut AgentRegistry<L>) -> Result<Record> {
        let epsilon = self.config.epsilon.value(self.iteration);
        let mut steps = 0;

        for _ in 0..self.config.episodes_per_iteration {
            let (p1, p2) = self.sampler.sample();
            let pairing = Pairing { p1, p2, epsilon };
            let seed = self.rng.gen::<u64>();
            let result = run_episode(&mut self.env, seed, agents, &pairing, &self.config.rewards)?;
            steps += result.steps;

            for (who, transitions) in result.transitions {
                if let Some(agent) = agents.get_mut(&who) {
                    transitions.into_iter().for_each(|t| agent.remember(t));
                }
            }
        }

        let mut record = Record::timestamped();
        self.update_agents(agents, &mut record)?;

        let episodes = self.config.episodes_per_iteration;
        self.iteration += 1;
        self.stat.iterations += 1;
        self.stat.episodes += episodes;
        self.stat.env_steps += steps;

        // Episodes per second of simulated play.
        let eps = episodes as f32 / steps.max(1) as f32 * self.env.config().tick_rate as f32;
        record.insert("iteration", Scalar(self.iteration as f32));
        record.insert("eps", Scalar(eps));
        record.insert("avg_steps", Scalar(steps as f32 / episodes.max(1) as f32));
        record.insert("queued", Scalar(self.queue.len() as f32));
        record.insert("epsilon", Scalar(epsilon as f32));
        Ok(record)
    }

    /// Runs the training, flush and refresh tasks until stopped or
    /// `max_iterations` is reached.
    ///
    /// Initial models are fetched first. On exit the flush task uploads what is
    /// left in the queue once more.
    pub async fn train<L: Learner>(
        &mut self,
        agents: &mut AgentRegistry<L>,
        recorder: &mut impl Recorder,
    ) -> Result<AsyncTrainStat> {
        let time = Instant::now();
        self.init_agents(agents).await;

        let (sender, mut receiver) = mpsc::channel(self.roster.members().len() * 2);
        let flush = tokio::spawn(flush_task(
            self.client.clone(),
            self.queue.clone(),
            self.config.flush_interval(),
            self.stop.clone(),
        ));
        let refresh = tokio::spawn(refresh_task(
            self.client.clone(),
            self.roster.clone(),
            self.config.refresh_interval(),
            sender,
            self.stop.clone(),
        ));

        let result = self.train_loop(agents, &mut receiver, recorder).await;

        // Unblocks a refresh task waiting on a full channel.
        drop(receiver);
        let _ = self.stop_sender.send(true);
        flush.await?;
        refresh.await?;
        result?;

        self.stat.duration = time.elapsed();
        info!("{}", self.stat.fmt());
        Ok(self.stat.clone())
    }

    async fn train_loop<L: Learner>(
        &mut self,
        agents: &mut AgentRegistry<L>,
        receiver: &mut mpsc::Receiver<TrainerMessage>,
        recorder: &mut impl Recorder,
    ) -> Result<()> {
        loop {
            if *self.stop.borrow() {
                info!("Stop requested after {} iterations", self.iteration);
                break;
            }

            while let Ok(msg) = receiver.try_recv() {
                self.apply(agents, msg);
            }

            let record = self.iteration(agents)?;
            if self.iteration % self.config.record_interval.max(1) == 0 {
                recorder.write(record);
            }

            if let Some(max) = self.config.max_iterations {
                if self.iteration >= max {
                    break;
                }
            }

            tokio::task::yield_now().await;
        }
        Ok(())
    }
}
