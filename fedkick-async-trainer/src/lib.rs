//! Asynchronous client-side trainer.
//!
//! # Tasks
//! * Training task: plays episodes, trains the local learners and pushes
//!   deltas into the [`OutboundQueue`].
//! * Flush task: uploads the queued deltas with [`ModelClient::upload_delta`].
//! * Refresh task: fetches server models and sends
//!   [`TrainerMessage::ModelParams`] to the training task.
//!
//! The tasks only share the outbound queue and one channel; see [`AsyncTrainer`].
mod client;
mod match_runner;
mod messages;
mod queue;
mod registry;
mod sampling;
mod schedule;
mod trainer;
pub use client::{ClientError, HttpModelClient, HttpModelClientConfig, ModelClient, RetryPolicy};
pub use match_runner::{run_episode, EpisodeResult, Pairing, RewardConfig};
pub use messages::TrainerMessage;
pub use queue::OutboundQueue;
pub use registry::AgentRegistry;
pub use sampling::{PairingConfig, PairingSampler};
pub use schedule::EpsilonSchedule;
pub use trainer::{
    flush_once, refresh_once, AsyncTrainStat, AsyncTrainer, AsyncTrainerConfig, FlushOutcome,
    StopHandle,
};
