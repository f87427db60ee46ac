use serde::{Deserialize, Serialize};

/// One simulation step's experience for one participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Observation before the step.
    pub state: Vec<f32>,

    /// Index of the action taken.
    pub action: usize,

    /// Observation after the step.
    pub next_state: Vec<f32>,

    /// Reward of the step.
    pub reward: f32,

    /// `true` on the last step of an episode.
    pub done: bool,
}
