//! Core functionalities.
mod learner;
mod policy;
mod replay_buffer;
pub use learner::Learner;
pub use policy::Policy;
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
