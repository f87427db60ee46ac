use crate::{keys, store::BlobStore, AggregatorConfig, ModelService, ServiceError};
use fedkick_core::{Delta, Identity};
use log::{info, warn};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::watch;

/// Result of one aggregation of one participant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// Deltas folded into the model.
    pub applied: usize,

    /// Deltas discarded for a stale base version.
    pub stale: usize,

    /// Records discarded because they could not be decoded.
    pub unreadable: usize,

    /// Sum of the counts of the applied deltas.
    pub total_count: u64,

    /// Version after aggregation, `None` if there is no model yet.
    pub version: Option<u64>,
}

/// Folds pending deltas into the canonical models.
///
/// The read-modify-write sequence is not locked. A delta accepted while an
/// aggregation of the same participant is running may be deleted without
/// being applied.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn BlobStore>,
    models: ModelService,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Creates the aggregator.
    pub fn new(store: Arc<dyn BlobStore>, models: ModelService, config: AggregatorConfig) -> Self {
        Self {
            store,
            models,
            config,
        }
    }

    /// Aggregates every participant of the roster.
    ///
    /// A participant whose aggregation fails is logged and skipped; the
    /// outcomes of the others are returned.
    pub async fn aggregate_all(&self) -> Vec<(Identity, AggregateOutcome)> {
        let mut outcomes = vec![];
        for who in self.models.roster().iter() {
            match self.aggregate(who).await {
                Ok(outcome) => outcomes.push((who.clone(), outcome)),
                Err(e) => warn!("Aggregation of {} failed: {}", who, e),
            }
        }
        outcomes
    }

    /// Aggregates the pending deltas of `who`.
    ///
    /// Deltas computed against the current version are averaged weighted by
    /// their counts, scaled by the learning rate and added to the model, whose
    /// version is then bumped by one. Every listed record is deleted, whether
    /// it was applied or not. Without any applicable delta the model is left
    /// untouched.
    pub async fn aggregate(&self, who: &Identity) -> Result<AggregateOutcome, ServiceError> {
        let mut outcome = AggregateOutcome::default();
        let mut model = match self.models.read(who).await? {
            Some(model) => model,
            None => return Ok(outcome),
        };
        outcome.version = Some(model.version);

        let keys = self
            .store
            .list(&keys::updates_prefix(who), self.config.max_updates)
            .await?;
        if keys.is_empty() {
            return Ok(outcome);
        }

        let mut acc: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        for key in keys.iter() {
            let text = match self.store.get(key).await? {
                Some(text) => text,
                None => continue,
            };
            let delta: Delta = match serde_json::from_str(&text) {
                Ok(delta) => delta,
                Err(e) => {
                    warn!("Discarding unreadable update {}: {}", key, e);
                    outcome.unreadable += 1;
                    continue;
                }
            };
            if delta.base_version != model.version {
                outcome.stale += 1;
                continue;
            }

            let w = delta.count as f32;
            for (name, values) in delta.delta.iter() {
                let sum = acc
                    .entry(name.clone())
                    .or_insert_with(|| vec![0.0; values.len()]);
                for (s, v) in sum.iter_mut().zip(values.iter()) {
                    *s += v * w;
                }
            }
            outcome.applied += 1;
            outcome.total_count += delta.count;
        }

        if outcome.total_count > 0 {
            let scale = self.config.lr / outcome.total_count as f32;
            for (name, sum) in acc.iter() {
                if let Some(target) = model.weights.get_mut(name) {
                    for (t, s) in target.iter_mut().zip(sum.iter()) {
                        *t += s * scale;
                    }
                }
            }
            model.version += 1;
            self.models.write(who, &model).await?;
            outcome.version = Some(model.version);
            info!(
                "Aggregated {} updates of {} into version {}",
                outcome.applied, who, model.version
            );
        }

        for key in keys.iter() {
            self.store.delete(key).await?;
        }
        if outcome.stale + outcome.unreadable > 0 {
            info!(
                "Discarded {} stale and {} unreadable updates of {}",
                outcome.stale, outcome.unreadable, who
            );
        }
        Ok(outcome)
    }

    /// Aggregates every participant on the configured interval until `stop`
    /// changes. Returns at once if no interval is configured.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let period = match self.config.interval() {
            Some(period) => period,
            None => return,
        };
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.aggregate_all().await;
                }
                _ = stop.changed() => break,
            }
        }
    }
}
