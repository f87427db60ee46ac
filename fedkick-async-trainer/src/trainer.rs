//! Asynchronous trainer.
mod base;
mod config;
mod stat;
pub use base::{flush_once, refresh_once, AsyncTrainer, FlushOutcome, StopHandle};
pub use config::AsyncTrainerConfig;
pub use stat::AsyncTrainStat;
