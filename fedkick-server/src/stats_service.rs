use crate::{keys, store::BlobStore, ServiceError};
use fedkick_core::{Identity, Roster, Stats};
use log::warn;
use std::sync::Arc;

/// Counters of accepted updates.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn BlobStore>,
    roster: Roster,
}

impl StatsService {
    /// Creates the service.
    pub fn new(store: Arc<dyn BlobStore>, roster: Roster) -> Self {
        Self { store, roster }
    }

    /// Returns the counters.
    ///
    /// Missing, unreadable or corrupt counters read as zeros. Counters of
    /// names outside the roster are dropped.
    pub async fn read(&self) -> Stats {
        let mut stats = Stats::empty(&self.roster);
        let text = match self.store.get(keys::STATS).await {
            Ok(Some(text)) => text,
            Ok(None) => return stats,
            Err(e) => {
                warn!("Failed to read training stats: {}", e);
                return stats;
            }
        };
        match serde_json::from_str::<Stats>(&text) {
            Ok(stored) => {
                stats.total = stored.total;
                for (who, n) in stats.per_agent.iter_mut() {
                    if let Some(v) = stored.per_agent.get(who) {
                        *n = *v;
                    }
                }
            }
            Err(e) => warn!("Failed to parse training stats: {}", e),
        }
        stats
    }

    /// Counts one accepted update of `who` and returns the new counters.
    pub async fn record(&self, who: &Identity) -> Result<Stats, ServiceError> {
        let mut stats = self.read().await;
        stats.record(who);
        self.store
            .set(keys::STATS, serde_json::to_string(&stats)?)
            .await?;
        Ok(stats)
    }
}
