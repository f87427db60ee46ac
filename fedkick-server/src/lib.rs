//! Aggregation server of fedkick.
//!
//! The server owns the canonical [`Model`](fedkick_core::Model) of each
//! participant. Clients read models, upload deltas tagged with the version they
//! were computed against, and an [`Aggregator`] periodically folds the pending
//! deltas into the model by a count-weighted mean.
//!
//! Updates use optimistic concurrency control: a delta whose base version is
//! not the current version is rejected with `409 Conflict`.
mod aggregator;
mod config;
mod error;
mod http;
pub mod keys;
mod model_service;
mod stats_service;
pub mod store;
mod update_service;
pub use aggregator::{AggregateOutcome, Aggregator};
pub use config::{AggregatorConfig, ModelInitConfig, ServerConfig, StoreConfig};
pub use error::ServiceError;
pub use http::{bind, App};
pub use model_service::ModelService;
pub use stats_service::StatsService;
pub use update_service::UpdateService;
