#![warn(missing_docs)]
//! Core components of fedkick.
//!
//! This crate holds everything shared by the client-side learner and the
//! aggregation server: the two-player soccer environment, the replay buffer,
//! the model/delta/stats types exchanged over HTTP, participant identities and
//! the record types used for training logs.
pub mod dummy;
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod soccer;

mod base;
pub use base::{ExperienceBufferBase, Learner, Policy, ReplayBufferBase};

mod identity;
pub use identity::{Identity, Roster};

mod model;
pub use model::{NamedParam, Model, ParamSpec, ParamTable};

mod update;
pub use update::{Delta, Stats, UpdateAck, UpdateRequest};
