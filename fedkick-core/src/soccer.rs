//! Two-player soccer environment.
//!
//! A deterministic approximation of a small-sided match on a rectangular
//! field: the ball, two players and four cones are circular rigid bodies.
//! Player 1 attacks the right goal, player 2 the left one.
mod action;
mod base;
mod body;
mod config;
pub use action::Action;
pub use base::{SoccerEnv, StepResult, Winner};
pub use body::{Ball, Cone, Player};
pub use config::SoccerConfig;
