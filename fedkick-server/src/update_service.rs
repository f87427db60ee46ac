use crate::{keys, store::BlobStore, ModelService, ServiceError, StatsService};
use fedkick_core::{Delta, UpdateAck, UpdateRequest};
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Accepts deltas from clients.
#[derive(Clone)]
pub struct UpdateService {
    store: Arc<dyn BlobStore>,
    models: ModelService,
    stats: StatsService,
}

impl UpdateService {
    /// Creates the service.
    pub fn new(store: Arc<dyn BlobStore>, models: ModelService, stats: StatsService) -> Self {
        Self {
            store,
            models,
            stats,
        }
    }

    /// Validates and stores one delta.
    ///
    /// This is the handler of `POST /update`. Checks run in order: payload,
    /// existence of the model, version, then shape of each delta entry that
    /// the model declares. Nothing is written before all checks pass. Once
    /// the delta is stored the update is acknowledged, with `stats` left out
    /// if the counters could not be written.
    pub async fn submit(&self, body: &[u8]) -> Result<UpdateAck, ServiceError> {
        let req: UpdateRequest = serde_json::from_slice(body)
            .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;
        let who = self
            .models
            .roster()
            .parse(&req.who)
            .map_err(|_| ServiceError::BadRequest("invalid payload".into()))?;
        if req.count <= 0 || req.base_version < 0 {
            return Err(ServiceError::BadRequest("invalid payload".into()));
        }

        let model = self
            .models
            .read(&who)
            .await?
            .ok_or_else(|| ServiceError::BadRequest("model missing".into()))?;
        if req.base_version as u64 != model.version {
            return Err(ServiceError::Stale {
                current: model.version,
                base: req.base_version,
            });
        }

        let delta = Delta {
            base_version: model.version,
            count: req.count as u64,
            delta: req.delta,
        };
        delta
            .validate(&model.spec)
            .map_err(|e| ServiceError::BadRequest(format!("invalid delta: {}", e)))?;

        let key = keys::update(&who, &Uuid::new_v4());
        self.store.set(&key, serde_json::to_string(&delta)?).await?;
        debug!("Stored {} (count {})", key, delta.count);

        // The delta is pending from here on, so the request has succeeded.
        let stats = match self.stats.record(&who).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Accepted {} but failed to update training stats: {}", key, e);
                None
            }
        };
        Ok(UpdateAck { ok: true, stats })
    }
}
