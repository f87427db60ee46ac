use crate::{keys, store::BlobStore, ModelInitConfig, ServiceError};
use fedkick_core::{Identity, Model, Roster};
use log::{info, warn};
use std::sync::Arc;

/// Reads and writes the canonical models.
#[derive(Clone)]
pub struct ModelService {
    store: Arc<dyn BlobStore>,
    roster: Roster,
    init: ModelInitConfig,
}

impl ModelService {
    /// Creates the service.
    pub fn new(store: Arc<dyn BlobStore>, roster: Roster, init: ModelInitConfig) -> Self {
        Self {
            store,
            roster,
            init,
        }
    }

    /// The participants served.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Returns the model of `who`, creating it at version 0 if absent.
    ///
    /// This is the handler of `GET /model?who=<id>`. A stored model that
    /// cannot be read or parsed is served as a fresh version 0 model; the
    /// stored value is left untouched.
    pub async fn get_or_create(&self, who: &str) -> Result<Model, ServiceError> {
        let who = self
            .roster
            .parse(who)
            .map_err(|_| ServiceError::BadRequest("invalid who".into()))?;
        match self.read(&who).await {
            Ok(Some(model)) => return Ok(model),
            Ok(None) => {}
            Err(e) => {
                warn!("Serving initial model of {}: {}", who, e);
                return Ok(self.init.init_model());
            }
        }

        let model = self.init.init_model();
        self.write(&who, &model).await?;
        info!("Created model of {} with {} tensors", who, model.spec.len());
        Ok(model)
    }

    /// Reads the stored model of `who`.
    pub async fn read(&self, who: &Identity) -> Result<Option<Model>, ServiceError> {
        let key = keys::model(who);
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| ServiceError::Corrupt {
                    key,
                    reason: e.to_string(),
                }),
        }
    }

    /// Replaces the stored model of `who`.
    pub async fn write(&self, who: &Identity, model: &Model) -> Result<(), ServiceError> {
        let text = serde_json::to_string(model)?;
        self.store.set(&keys::model(who), text).await?;
        Ok(())
    }
}
